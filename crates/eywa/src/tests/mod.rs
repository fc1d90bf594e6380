//! Scenario tests for the eywa SDK
//!
//! Each test drives an [`Eywa`](crate::Eywa) against an in-process mock host
//! and, for transfers, a mock object-storage server. Covered:
//! - Task notifications and `task.get`
//! - GraphQL calls and error passthrough
//! - Upload and download flows, including failure at each step
//! - File and folder management queries
//! - Configuration loading and defaults

// Test payloads are built from small loop counters
#![allow(clippy::cast_possible_truncation)]

mod download_tests;
mod graphql_tests;

//! Client SDK for scripts that run as EYWA tasks.
//!
//! The host starts a task process and talks to it over stdin/stdout using
//! line-delimited JSON-RPC. [`Eywa`] wraps that connection with the task API
//! (logging, reports, status), GraphQL access to datasets, and the file
//! service: uploads and downloads go straight to object storage over HTTP,
//! bracketed by GraphQL calls that hand out and confirm presigned URLs.
//!
//! ```no_run
//! use eywa::{Config, Eywa, FileInput, TaskStatus};
//!
//! # async fn example() -> eywa::Result<()> {
//! let eywa = Eywa::open_pipe(Config::load_default()?)?;
//! eywa.info("Starting", None).await?;
//!
//! let response = eywa.graphql("{ searchUser { name } }", None).await?;
//! eywa.upload_content("hello", FileInput::named("hello.txt"), None).await?;
//!
//! eywa.close_task(if response.is_ok() { TaskStatus::Success } else { TaskStatus::Error }).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod files;
mod error;
mod graphql;
mod task;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{Error, Result};
pub use eywa_rpc::{Connection, ConnectionBuilder, RemoteError, RpcError};
pub use eywa_types::*;
pub use files::{
    Content, DownloadError, DownloadStream, FileError, ProgressFn, StorageClient, UploadError,
    calculate_file_hash, detect_mime_type,
};

/// A task's handle on its host.
///
/// Cheap to clone; clones share the connection and HTTP client.
#[derive(Debug, Clone)]
pub struct Eywa {
    connection: Connection,
    storage: StorageClient,
    config: Config,
}

impl Eywa {
    /// Connect over the process's stdin and stdout.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn open_pipe(config: Config) -> Result<Self> {
        Self::open_pipe_with(Connection::builder(), config)
    }

    /// Like [`Eywa::open_pipe`], keeping the handlers already registered on
    /// `builder`. Connection settings come from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn open_pipe_with(builder: ConnectionBuilder, config: Config) -> Result<Self> {
        let storage = StorageClient::new(&config.storage)?;
        let connection = builder.config(config.rpc.connection_config()).open_stdio();
        Ok(Self {
            connection,
            storage,
            config,
        })
    }

    /// Wrap an already open connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_connection(connection: Connection, config: Config) -> Result<Self> {
        let storage = StorageClient::new(&config.storage)?;
        Ok(Self {
            connection,
            storage,
            config,
        })
    }

    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    #[must_use]
    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the connection without reporting a task outcome.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

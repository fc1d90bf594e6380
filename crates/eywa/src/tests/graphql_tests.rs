//! Tests for the GraphQL convenience call

use serde_json::{Value, json};

use super::fixtures::connect;
use crate::Error;

#[tokio::test]
async fn test_graphql_sends_query_and_variables() {
    let (eywa, mut host) = connect();

    let task = tokio::spawn(async move {
        eywa.graphql("query Q($n: Int) { x(n: $n) }", Some(json!({"n": 3})))
            .await
    });

    let call = host.answer_graphql(json!({"data": {"x": 9}})).await;
    assert_eq!(call.query, "query Q($n: Int) { x(n: $n) }");
    assert_eq!(call.variables, json!({"n": 3}));

    let response = task.await.unwrap().unwrap();
    assert!(response.is_ok());
    assert_eq!(response.field("x"), Some(&json!(9)));
}

#[tokio::test]
async fn test_graphql_without_variables_sends_null() {
    let (eywa, mut host) = connect();

    let task = tokio::spawn(async move { eywa.graphql("{ me { name } }", None).await });
    let call = host.answer_graphql(json!({"data": {"me": null}})).await;

    assert_eq!(call.variables, Value::Null);
    let response = task.await.unwrap().unwrap();
    assert!(response.field("me").is_none());
}

#[tokio::test]
async fn test_graphql_errors_are_not_unwrapped() {
    let (eywa, mut host) = connect();

    let task = tokio::spawn(async move { eywa.graphql("{ nope }", None).await });
    host.answer_graphql(json!({
        "data": null,
        "errors": [
            {"message": "Cannot query field \"nope\""},
            {"message": "second"}
        ]
    }))
    .await;

    let response = task.await.unwrap().unwrap();
    assert!(!response.is_ok());
    assert_eq!(
        response.error_summary().as_deref(),
        Some("Cannot query field \"nope\"; second")
    );
}

#[tokio::test]
async fn test_graphql_data_fails_on_errors() {
    let (eywa, mut host) = connect();

    let task = tokio::spawn(async move { eywa.graphql_data("{ nope }", None).await });
    host.answer_graphql(json!({"errors": [{"message": "denied"}]}))
        .await;

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Graphql(ref msg) if msg == "denied"));
}

#[tokio::test]
async fn test_graphql_rpc_error_propagates() {
    let (eywa, mut host) = connect();

    let task = tokio::spawn(async move { eywa.graphql("{ x }", None).await });
    let call = host.expect_graphql().await;
    host.reply_error(&call.id, -32000, "Dataset service unavailable")
        .await;

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.remote().map(|r| r.code), Some(-32000));
}

#[tokio::test]
async fn test_graphql_reply_of_wrong_shape_is_json_error() {
    let (eywa, mut host) = connect();

    let task = tokio::spawn(async move { eywa.graphql("{ x }", None).await });
    host.answer_graphql(json!("not an object")).await;

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Rpc(eywa_rpc::Error::Json(_))));
}

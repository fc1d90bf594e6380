use serde_json::{Map, Value};
use tracing::debug;

use crate::{Eywa, GraphqlResponse, Result};

const GRAPHQL_METHOD: &str = "eywa.datasets.graphql";

impl Eywa {
    /// Run a GraphQL query or mutation against the dataset API.
    ///
    /// The response comes back as sent: `errors` is not turned into a Rust
    /// error. Use [`GraphqlResponse::into_result`] or [`Eywa::graphql_data`]
    /// for that.
    ///
    /// # Errors
    ///
    /// Returns an error if the call itself fails or the reply is not a
    /// GraphQL response object.
    pub async fn graphql(&self, query: &str, variables: Option<Value>) -> Result<GraphqlResponse> {
        let mut params = Map::new();
        params.insert("query".to_string(), Value::String(query.to_string()));
        params.insert("variables".to_string(), variables.unwrap_or(Value::Null));

        debug!(len = query.len(), "GraphQL call");
        let response = self
            .connection
            .call_as::<GraphqlResponse>(GRAPHQL_METHOD, Some(Value::Object(params)))
            .await?;
        Ok(response)
    }

    /// Run a query and return its `data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Graphql`] with the joined messages when the
    /// response carries errors.
    pub async fn graphql_data(&self, query: &str, variables: Option<Value>) -> Result<Value> {
        let response = self.graphql(query, variables).await?;
        if let Some(summary) = response.error_summary() {
            return Err(crate::Error::Graphql(summary));
        }
        Ok(response.data.unwrap_or(Value::Null))
    }
}

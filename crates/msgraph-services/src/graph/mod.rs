//! Microsoft Graph transport.

mod client;
mod request;

pub use client::{AccessTokenSource, GRAPH_BASE_URL, GraphClient, GraphTransport, StaticToken};
pub use request::{GraphRequest, Method};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GraphError, GraphResult};

/// The `{"value": [...]}` envelope of Graph collections.
#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct GraphCollection<T> {
    #[serde(default)]
    pub value: Vec<T>,
}

/// Deserializes a response body, failing on an empty body.
pub(crate) fn decode<T: DeserializeOwned>(body: Option<Value>, what: &str) -> GraphResult<T> {
    let body = body.ok_or_else(|| GraphError::invalid_response(format!("empty {} response", what)))?;
    serde_json::from_value(body).map_err(|e| {
        GraphError::invalid_response(format!("invalid {} response: {}", what, e)).with_source(e)
    })
}

//! HTTP transport for Microsoft Graph.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::request::{GraphRequest, Method};
use crate::error::{ErrorKind, GraphError, GraphResult};
use crate::identity::{BoxFuture, IdentityClient};

/// Graph v1.0 endpoint.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes Graph requests.
///
/// Returns the parsed JSON body, or `None` for empty responses such as the
/// `202 Accepted` of `sendMail`.
pub trait GraphTransport: Send + Sync {
    fn send(&self, request: GraphRequest) -> BoxFuture<'_, GraphResult<Option<Value>>>;
}

/// Supplies bearer tokens.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> BoxFuture<'_, GraphResult<String>>;
}

impl AccessTokenSource for IdentityClient {
    fn access_token(&self) -> BoxFuture<'_, GraphResult<String>> {
        Box::pin(async move { Ok(self.acquire_token_silent().await?.access_token) })
    }
}

/// A fixed token, for app-only automation and tests.
#[derive(Clone)]
pub struct StaticToken(pub String);

impl AccessTokenSource for StaticToken {
    fn access_token(&self) -> BoxFuture<'_, GraphResult<String>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

/// Graph client over reqwest.
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Creates a client against [`GRAPH_BASE_URL`].
    pub fn new(tokens: Arc<dyn AccessTokenSource>) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| {
                GraphError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: GRAPH_BASE_URL.to_string(),
            tokens,
        })
    }

    /// Overrides the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute(&self, request: GraphRequest) -> GraphResult<Option<Value>> {
        let token = self.tokens.access_token().await?;
        let url = request.url(&self.base_url);
        debug!("{} {}", request.method().as_str(), url);

        let mut builder = match request.method() {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Patch => self.http_client.patch(&url),
        };
        builder = builder.bearer_auth(token);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            GraphError::network(format!("Graph request failed: {}", e)).with_source(e)
        })?;

        let status = response.status();
        trace!(status = %status, "received response");
        let text = response.text().await.map_err(|e| {
            GraphError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            warn!(status = %status, "Graph request failed");
            return Err(api_error(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text).map(Some).map_err(|e| {
            GraphError::invalid_response(format!("invalid Graph response: {}", e)).with_source(e)
        })
    }
}

impl GraphTransport for GraphClient {
    fn send(&self, request: GraphRequest) -> BoxFuture<'_, GraphResult<Option<Value>>> {
        Box::pin(self.execute(request))
    }
}

/// Maps a failed response to an error, keeping the Graph error code and the
/// parsed body when the body has the `{"error": {"code", "message"}}` shape.
pub(crate) fn api_error(status: u16, body: &str) -> GraphError {
    let Ok(details) = serde_json::from_str::<Value>(body) else {
        return GraphError::new(
            ErrorKind::Api,
            format!("Graph request failed with status {}", status),
        )
        .with_status(status);
    };

    let error = &details["error"];
    let message = error["message"]
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Graph request failed with status {}", status));

    let err = match error["code"].as_str() {
        Some(code) => GraphError::api(code, message),
        None => GraphError::new(ErrorKind::Api, message),
    };
    err.with_status(status).with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> GraphClient {
        GraphClient::new(Arc::new(StaticToken("test-token".into())))
            .unwrap()
            .with_base_url(server.url())
    }

    mod api_errors {
        use super::*;

        #[test]
        fn graph_error_body() {
            let body = json!({"error": {"code": "ErrorItemNotFound", "message": "Not found in store."}});
            let err = api_error(404, &body.to_string());
            assert_eq!(err.kind(), ErrorKind::Api);
            assert_eq!(err.code(), "ErrorItemNotFound");
            assert_eq!(err.status(), Some(404));
            assert_eq!(err.message(), "Not found in store.");
            assert_eq!(err.details(), Some(&body));
            assert_eq!(err.user_message(), "The specified item was not found.");
        }

        #[test]
        fn body_without_code() {
            let err = api_error(500, r#"{"error": {}}"#);
            assert_eq!(err.code(), "UnknownGraphError");
            assert_eq!(err.message(), "Graph request failed with status 500");
        }

        #[test]
        fn non_json_body() {
            let err = api_error(502, "<html>Bad gateway</html>");
            assert_eq!(err.status(), Some(502));
            assert!(err.details().is_none());
        }
    }

    mod transport {
        use super::*;

        #[tokio::test]
        async fn get_sends_bearer_query_and_headers() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/me/calendarView")
                .match_header("authorization", "Bearer test-token")
                .match_header("prefer", "outlook.timezone=\"Asia/Tokyo\"")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("startDateTime".into(), "2025-06-15T00:00:00.000Z".into()),
                    Matcher::UrlEncoded("$orderby".into(), "start/dateTime".into()),
                ]))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"value": [{"id": "e1"}]}"#)
                .create_async()
                .await;

            let request = GraphRequest::get("/me/calendarView")
                .query("startDateTime", "2025-06-15T00:00:00.000Z")
                .query("$orderby", "start/dateTime")
                .header("Prefer", "outlook.timezone=\"Asia/Tokyo\"");
            let value = client(&server).send(request).await.unwrap().unwrap();

            mock.assert_async().await;
            assert_eq!(value["value"][0]["id"], "e1");
        }

        #[tokio::test]
        async fn post_with_empty_response_is_none() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("POST", "/me/sendMail")
                .match_body(Matcher::Json(json!({"message": {"subject": "Hi"}})))
                .with_status(202)
                .create_async()
                .await;

            let result = client(&server)
                .send(GraphRequest::post("/me/sendMail", json!({"message": {"subject": "Hi"}})))
                .await
                .unwrap();

            mock.assert_async().await;
            assert!(result.is_none());
        }

        #[tokio::test]
        async fn error_response_maps_to_api_error() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("PATCH", "/me/events/abc")
                .with_status(403)
                .with_body(r#"{"error": {"code": "ErrorAccessDenied", "message": "Access is denied."}}"#)
                .create_async()
                .await;

            let err = client(&server)
                .send(GraphRequest::patch("/me/events/abc", json!({"subject": "x"})))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "ErrorAccessDenied");
            assert_eq!(err.status(), Some(403));
            assert_eq!(err.user_message(), "Access denied. Check your permissions.");
        }

        #[tokio::test]
        async fn garbage_success_body_is_invalid_response() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/me")
                .with_status(200)
                .with_body("not json")
                .create_async()
                .await;

            let err = client(&server).send(GraphRequest::get("/me")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        }
    }
}

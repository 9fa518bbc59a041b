//! Mail operations on the signed-in user's mailbox.

use msgraph_core::{BodyType, MailMessage, TimeRange, parse_time_spec};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ErrorKind, GraphError, GraphResult};
use crate::graph::{GraphCollection, GraphRequest, GraphTransport, decode};

/// Page size used when `--top` is not given.
pub const DEFAULT_TOP: u32 = 25;

const MESSAGE_SELECT: &str =
    "id,subject,from,toRecipients,receivedDateTime,isRead,hasAttachments,bodyPreview";

/// Options of [`MailService::list_messages`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMessagesOptions {
    /// Page size; [`DEFAULT_TOP`] when `None`.
    pub top: Option<u32>,
    /// A time spec such as `last2hours`, `yesterday` or an ISO date.
    pub since: Option<String>,
    /// Raw OData filter, combined with the `since` range.
    pub filter: Option<String>,
    /// Free-text search.
    pub search: Option<String>,
    /// Folder id or well-known name such as `inbox`.
    pub folder: Option<String>,
}

/// Mail service over a [`GraphTransport`].
pub struct MailService<'a> {
    transport: &'a dyn GraphTransport,
}

impl<'a> MailService<'a> {
    pub fn new(transport: &'a dyn GraphTransport) -> Self {
        Self { transport }
    }

    /// Lists messages, newest first unless searching.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeSpec` before any request if `since` does not parse.
    pub async fn list_messages(&self, options: &ListMessagesOptions) -> GraphResult<Vec<MailMessage>> {
        let range = options
            .since
            .as_deref()
            .map(parse_time_spec)
            .transpose()?;
        let request = list_messages_request(options, range.as_ref());
        let body = self.transport.send(request).await?;
        let page: GraphCollection<MailMessage> = decode(body, "message list")?;
        debug!("fetched {} messages", page.value.len());
        Ok(page.value)
    }

    /// Fetches one message with its body.
    pub async fn read_message(&self, message_id: &str) -> GraphResult<MailMessage> {
        let message_id = message_id.trim();
        if message_id.is_empty() {
            return Err(GraphError::new(
                ErrorKind::InvalidMessageId,
                "Message ID cannot be empty.",
            ));
        }
        let path = format!("/me/messages/{}", urlencoding::encode(message_id));
        let body = self.transport.send(GraphRequest::get(path)).await?;
        decode(body, "message")
    }

    /// Sends a message from the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecipient` before any request if the list is empty or
    /// an address has no `@`.
    pub async fn send_message(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
        content_type: BodyType,
    ) -> GraphResult<()> {
        let payload = send_mail_payload(to, subject, body, content_type)?;
        self.transport
            .send(GraphRequest::post("/me/sendMail", payload))
            .await?;
        debug!("sent message to {} recipient(s)", to.len());
        Ok(())
    }
}

/// Builds the `$filter` for a received-time range.
pub fn received_filter(range: &TimeRange) -> String {
    let mut filter = format!("receivedDateTime ge {}", range.start_iso());
    if let Some(end) = range.end_iso() {
        filter.push_str(&format!(" and receivedDateTime le {}", end));
    }
    filter
}

fn quote_search(term: &str) -> String {
    let term = term.trim().trim_matches('"');
    format!("\"{}\"", term.replace('"', "\\\""))
}

pub(crate) fn list_messages_request(
    options: &ListMessagesOptions,
    range: Option<&TimeRange>,
) -> GraphRequest {
    let path = match options.folder.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(folder) => format!("/me/mailFolders/{}/messages", urlencoding::encode(folder)),
        None => "/me/messages".to_string(),
    };

    let raw_filter = options.filter.as_deref().map(str::trim).filter(|f| !f.is_empty());
    let filter = match (range.map(received_filter), raw_filter) {
        (Some(since), Some(raw)) => Some(format!("{} and {}", since, raw)),
        (Some(since), None) => Some(since),
        (None, Some(raw)) => Some(raw.to_string()),
        (None, None) => None,
    };
    let search = options
        .search
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(quote_search);

    let mut request = GraphRequest::get(path)
        .query("$top", options.top.unwrap_or(DEFAULT_TOP).to_string());
    // Graph rejects $orderby together with $search.
    if search.is_none() {
        request = request.query("$orderby", "receivedDateTime desc");
    }
    request
        .query("$select", MESSAGE_SELECT)
        .query_opt("$filter", filter)
        .query_opt("$search", search)
}

fn validate_recipients(to: &[String]) -> GraphResult<Vec<String>> {
    if to.is_empty() {
        return Err(invalid_recipient(""));
    }
    to.iter()
        .map(|address| {
            let address = address.trim();
            if address.contains('@') {
                Ok(address.to_string())
            } else {
                Err(invalid_recipient(address))
            }
        })
        .collect()
}

fn invalid_recipient(address: &str) -> GraphError {
    GraphError::new(
        ErrorKind::InvalidRecipient,
        format!("Invalid email address: \"{}\"", address),
    )
}

pub(crate) fn send_mail_payload(
    to: &[String],
    subject: &str,
    body: &str,
    content_type: BodyType,
) -> GraphResult<Value> {
    let recipients: Vec<Value> = validate_recipients(to)?
        .into_iter()
        .map(|address| json!({"emailAddress": {"address": address}}))
        .collect();

    Ok(json!({
        "message": {
            "subject": subject,
            "body": {
                "contentType": content_type.as_graph_str(),
                "content": body,
            },
            "toRecipients": recipients,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Method;
    use crate::graph::testing::RecordingTransport;
    use chrono::{TimeZone, Utc};

    fn range() -> TimeRange {
        TimeRange::between(
            Utc.with_ymd_and_hms(2025, 6, 14, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 14, 23, 59, 59).unwrap(),
        )
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    mod list_request {
        use super::*;

        #[test]
        fn defaults() {
            let request = list_messages_request(&ListMessagesOptions::default(), None);
            assert_eq!(request.path(), "/me/messages");
            assert_eq!(request.query_value("$top"), Some("25"));
            assert_eq!(request.query_value("$orderby"), Some("receivedDateTime desc"));
            assert_eq!(request.query_value("$select"), Some(MESSAGE_SELECT));
            assert_eq!(request.query_value("$filter"), None);
            assert_eq!(request.query_value("$search"), None);
        }

        #[test]
        fn since_and_raw_filter_are_joined() {
            let options = ListMessagesOptions {
                top: Some(5),
                filter: Some("isRead eq false".into()),
                ..Default::default()
            };
            let request = list_messages_request(&options, Some(&range()));
            assert_eq!(request.query_value("$top"), Some("5"));
            assert_eq!(
                request.query_value("$filter"),
                Some(
                    "receivedDateTime ge 2025-06-14T00:00:00.000Z and receivedDateTime le \
                     2025-06-14T23:59:59.000Z and isRead eq false"
                )
            );
        }

        #[test]
        fn open_range_has_no_upper_bound() {
            let since = TimeRange::since(Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap());
            let request = list_messages_request(&ListMessagesOptions::default(), Some(&since));
            assert_eq!(
                request.query_value("$filter"),
                Some("receivedDateTime ge 2025-06-15T09:00:00.000Z")
            );
        }

        #[test]
        fn raw_filter_alone() {
            let options = ListMessagesOptions {
                filter: Some("hasAttachments eq true".into()),
                ..Default::default()
            };
            let request = list_messages_request(&options, None);
            assert_eq!(request.query_value("$filter"), Some("hasAttachments eq true"));
        }

        #[test]
        fn search_is_quoted_and_drops_orderby() {
            let options = ListMessagesOptions {
                search: Some("quarterly report".into()),
                ..Default::default()
            };
            let request = list_messages_request(&options, None);
            assert_eq!(request.query_value("$search"), Some("\"quarterly report\""));
            assert_eq!(request.query_value("$orderby"), None);
        }

        #[test]
        fn folder_path() {
            let options = ListMessagesOptions {
                folder: Some("Sent Items".into()),
                ..Default::default()
            };
            let request = list_messages_request(&options, None);
            assert_eq!(request.path(), "/me/mailFolders/Sent%20Items/messages");
        }
    }

    mod send_payload {
        use super::*;

        #[test]
        fn text_body() {
            let payload = send_mail_payload(
                &strings(&["adele@contoso.com", " megan@contoso.com "]),
                "Lunch",
                "Noon?",
                BodyType::Text,
            )
            .unwrap();
            assert_eq!(
                payload,
                json!({
                    "message": {
                        "subject": "Lunch",
                        "body": {"contentType": "Text", "content": "Noon?"},
                        "toRecipients": [
                            {"emailAddress": {"address": "adele@contoso.com"}},
                            {"emailAddress": {"address": "megan@contoso.com"}}
                        ]
                    }
                })
            );
        }

        #[test]
        fn html_body() {
            let payload =
                send_mail_payload(&strings(&["a@b.c"]), "s", "<b>hi</b>", BodyType::Html).unwrap();
            assert_eq!(payload["message"]["body"]["contentType"], "HTML");
        }

        #[test]
        fn invalid_address_is_echoed() {
            let err = send_mail_payload(&strings(&["a@b.c", "nobody"]), "s", "b", BodyType::Text)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRecipient);
            assert_eq!(err.message(), "Invalid email address: \"nobody\"");
        }

        #[test]
        fn empty_list_is_rejected() {
            let err = send_mail_payload(&[], "s", "b", BodyType::Text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRecipient);
        }
    }

    mod service {
        use super::*;

        #[tokio::test]
        async fn list_decodes_collection() {
            let transport = RecordingTransport::replying(vec![Ok(Some(json!({
                "value": [
                    {"id": "m1", "subject": "Hello", "isRead": false},
                    {"id": "m2", "subject": "World", "isRead": true}
                ]
            })))]);
            let messages = MailService::new(&transport)
                .list_messages(&ListMessagesOptions::default())
                .await
                .unwrap();
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0].subject.as_deref(), Some("Hello"));
            assert_eq!(transport.requests()[0].method(), Method::Get);
        }

        #[tokio::test]
        async fn bad_since_fails_before_request() {
            let transport = RecordingTransport::default();
            let options = ListMessagesOptions {
                since: Some("last week".into()),
                ..Default::default()
            };
            let err = MailService::new(&transport)
                .list_messages(&options)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTimeSpec);
            assert!(transport.requests().is_empty());
        }

        #[tokio::test]
        async fn read_rejects_blank_id() {
            let transport = RecordingTransport::default();
            let err = MailService::new(&transport).read_message("   ").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidMessageId);
            assert_eq!(err.message(), "Message ID cannot be empty.");
            assert!(transport.requests().is_empty());
        }

        #[tokio::test]
        async fn read_encodes_id() {
            let transport = RecordingTransport::replying(vec![Ok(Some(json!({"id": "AA/kk="})))]);
            let message = MailService::new(&transport).read_message("AA/kk=").await.unwrap();
            assert_eq!(message.id, "AA/kk=");
            assert_eq!(transport.requests()[0].path(), "/me/messages/AA%2Fkk%3D");
        }

        #[tokio::test]
        async fn send_posts_and_accepts_empty_response() {
            let transport = RecordingTransport::replying(vec![Ok(None)]);
            MailService::new(&transport)
                .send_message(&strings(&["adele@contoso.com"]), "Hi", "Body", BodyType::Text)
                .await
                .unwrap();
            let requests = transport.requests();
            assert_eq!(requests[0].path(), "/me/sendMail");
            assert_eq!(requests[0].method(), Method::Post);
        }

        #[tokio::test]
        async fn send_with_invalid_recipient_makes_no_request() {
            let transport = RecordingTransport::default();
            let err = MailService::new(&transport)
                .send_message(&strings(&["bad"]), "Hi", "Body", BodyType::Text)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRecipient);
            assert!(transport.requests().is_empty());
        }
    }
}

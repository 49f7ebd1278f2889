//! HTTP delivery to the collection endpoint.

use crate::record::CheckInRecord;
use crate::{OutboxError, OutboxResult};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Request body for `POST <endpoint>/append`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendRequest<'a> {
    file_path: &'a str,
    row: &'a CheckInRecord,
}

/// Build the append URL, dropping one trailing slash from the base.
pub fn append_url(base_url: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    format!("{}/append", base)
}

/// Posts single check-ins to the collection endpoint.
///
/// One request per call and no internal retry: a failed record stays queued
/// and the next flush pass tries again.
#[derive(Clone)]
pub struct EndpointSender {
    client: Client,
}

impl EndpointSender {
    /// Create a sender whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> OutboxResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Post `record` to `<base_url>/append`.
    ///
    /// Any 2xx status whose body can be read is success.
    pub async fn send(
        &self,
        base_url: &str,
        file_path: &str,
        api_key: Option<&str>,
        record: &CheckInRecord,
    ) -> OutboxResult<()> {
        let url = append_url(base_url);
        let body = AppendRequest {
            file_path,
            row: record,
        };

        debug!(url = %url, has_key = api_key.is_some(), "Posting check-in");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(OutboxError::Send(format!("HTTP {}: {}", status, text)));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::serve_once;
    use super::*;

    fn sender() -> EndpointSender {
        EndpointSender::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_append_url_strips_one_trailing_slash() {
        assert_eq!(append_url("http://h:8080"), "http://h:8080/append");
        assert_eq!(append_url("http://h:8080/"), "http://h:8080/append");
        assert_eq!(append_url("http://h/api//"), "http://h/api//append");
    }

    #[tokio::test]
    async fn test_send_posts_file_path_and_row() {
        let (base, captured) = serve_once(200, "ok").await;
        let record = CheckInRecord::new("Ana")
            .with_calle_numero("Mayor 3")
            .with_motivo("spa");

        sender()
            .send(&format!("{}/", base), "reports/guests.xlsx", Some("s3cret"), &record)
            .await
            .unwrap();

        let request = captured.await.unwrap();
        assert_eq!(request.request_line(), "POST /append HTTP/1.1");
        assert_eq!(request.header("x-api-key").as_deref(), Some("s3cret"));
        assert_eq!(
            request.header("content-type").as_deref(),
            Some("application/json")
        );

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["filePath"], "reports/guests.xlsx");
        assert_eq!(body["row"]["nombre"], "Ana");
        assert_eq!(body["row"]["calleNumero"], "Mayor 3");
        assert_eq!(body["row"]["motivo"], "spa");
    }

    #[tokio::test]
    async fn test_send_omits_key_header_when_unset() {
        let (base, captured) = serve_once(201, "").await;
        sender()
            .send(&base, "", None, &CheckInRecord::new("Ana"))
            .await
            .unwrap();

        let request = captured.await.unwrap();
        assert_eq!(request.header("x-api-key"), None);

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["row"]["motivo"], "");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (base, _captured) = serve_once(500, "boom").await;
        let err = sender()
            .send(&base, "", None, &CheckInRecord::new("Ana"))
            .await
            .unwrap_err();

        match err {
            OutboxError::Send(msg) => assert!(msg.contains("500") && msg.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = sender()
            .send(&format!("http://{}", addr), "", None, &CheckInRecord::new("Ana"))
            .await;
        assert!(matches!(result, Err(OutboxError::Http(_))));
    }
}

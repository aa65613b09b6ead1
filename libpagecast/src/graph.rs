//! Low-level Graph API client
//!
//! Thin request/response wrapper over the two content-publishing surfaces
//! (Page photo/video endpoints and Business Account media containers) plus
//! the OAuth token endpoints. Parameter names follow the wire format
//! exactly; error bodies are normalized into [`GraphError`].

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::types::MediaType;

/// `error_subcode` the platform reports for video files it cannot ingest
pub const UNSUPPORTED_VIDEO_SUBCODE: i64 = 2207026;

type GraphResult<T> = std::result::Result<T, GraphError>;

/// Processing state of a media container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Finished,
    InProgress,
    Error,
}

/// Result of token introspection; `debug_token` never fails, it degrades
/// to `is_valid: false` with the reason attached.
#[derive(Debug, Clone)]
pub struct TokenHealth {
    pub is_valid: bool,
    pub error: Option<String>,
}

/// One entry from the user's page listing
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub id: String,
    pub name: String,
    pub access_token: Option<String>,
    pub instagram_business_account: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BasicProfile {
    pub id: String,
    pub name: String,
}

#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    endpoint: String,
}

impl GraphClient {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            http: Client::new(),
            endpoint: config.endpoint(),
        }
    }

    /// Client pointed at an explicit endpoint root (tests use this)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    // ------------------------------------------------------------------
    // Page publishing (direct)
    // ------------------------------------------------------------------

    /// `POST /{page_id}/photos` with `url` + `access_token` (+ `caption`).
    ///
    /// An empty or omitted caption never produces a caption parameter.
    pub async fn create_photo_post(
        &self,
        page_id: &str,
        media_url: &str,
        caption: Option<&str>,
        page_token: &str,
    ) -> GraphResult<String> {
        let mut params = vec![
            ("url".to_string(), media_url.to_string()),
            ("access_token".to_string(), page_token.to_string()),
        ];
        push_caption(&mut params, "caption", caption);

        let body = self
            .post_form(&format!("{}/photos", page_id), &params)
            .await?;

        extract_post_id(&body)
            .ok_or_else(|| GraphError::api("No post ID in photo publish response"))
    }

    /// `POST /{page_id}/videos` with `file_url`; caption travels as
    /// `description`. A publish time switches the post to
    /// `published=false` + `scheduled_publish_time`.
    pub async fn create_video_post(
        &self,
        page_id: &str,
        media_url: &str,
        caption: Option<&str>,
        publish_time: Option<i64>,
        page_token: &str,
    ) -> GraphResult<String> {
        let mut params = vec![
            ("file_url".to_string(), media_url.to_string()),
            ("access_token".to_string(), page_token.to_string()),
        ];
        push_caption(&mut params, "description", caption);

        if let Some(ts) = publish_time {
            params.push(("published".to_string(), "false".to_string()));
            params.push(("scheduled_publish_time".to_string(), ts.to_string()));
        }

        let body = self
            .post_form(&format!("{}/videos", page_id), &params)
            .await?;

        extract_post_id(&body)
            .ok_or_else(|| GraphError::api("No post ID in video publish response"))
    }

    // ------------------------------------------------------------------
    // Business account publishing (container based)
    // ------------------------------------------------------------------

    /// `POST /{target_id}/media`. Image containers embed the caption at
    /// creation; video containers never do (the platform only accepts a
    /// video caption at publish time). `scheduled` selects the container
    /// media type for deferred video posts.
    pub async fn create_media_container(
        &self,
        target_id: &str,
        media_url: &str,
        media_type: MediaType,
        caption: Option<&str>,
        scheduled: bool,
        page_token: &str,
    ) -> GraphResult<String> {
        let mut params = vec![("access_token".to_string(), page_token.to_string())];

        match media_type {
            MediaType::Image => {
                params.push(("image_url".to_string(), media_url.to_string()));
                push_caption(&mut params, "caption", caption);
            }
            MediaType::Video => {
                params.push(("video_url".to_string(), media_url.to_string()));
                let container_type = if scheduled { "VIDEO" } else { "REELS" };
                params.push(("media_type".to_string(), container_type.to_string()));
            }
        }

        let body = self
            .post_form(&format!("{}/media", target_id), &params)
            .await?;

        body["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| GraphError::api("No creation ID in container response"))
    }

    /// `GET /{container_id}?fields=status_code`
    pub async fn container_status(
        &self,
        container_id: &str,
        page_token: &str,
    ) -> GraphResult<ContainerStatus> {
        let url = format!(
            "{}/{}?fields=status_code&access_token={}",
            self.endpoint,
            container_id,
            urlencoding::encode(page_token)
        );

        let body = self.get_json(&url).await?;

        match body["status_code"].as_str() {
            Some("FINISHED") => Ok(ContainerStatus::Finished),
            Some("ERROR") => Ok(ContainerStatus::Error),
            _ => Ok(ContainerStatus::InProgress),
        }
    }

    /// `POST /{target_id}/media_publish` with `creation_id`
    pub async fn publish_container(
        &self,
        target_id: &str,
        container_id: &str,
        caption: Option<&str>,
        publish_time: Option<i64>,
        page_token: &str,
    ) -> GraphResult<String> {
        let mut params = vec![
            ("creation_id".to_string(), container_id.to_string()),
            ("access_token".to_string(), page_token.to_string()),
        ];
        push_caption(&mut params, "caption", caption);

        if let Some(ts) = publish_time {
            params.push(("scheduled_publish_time".to_string(), ts.to_string()));
        }

        let body = self
            .post_form(&format!("{}/media_publish", target_id), &params)
            .await?;

        body["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| GraphError::api("No post ID in container publish response"))
    }

    // ------------------------------------------------------------------
    // Token endpoints
    // ------------------------------------------------------------------

    /// `POST /oauth/access_token` — authorization code for a short-lived token
    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> GraphResult<String> {
        let params = vec![
            ("client_id".to_string(), client_id.to_string()),
            ("client_secret".to_string(), client_secret.to_string()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("code".to_string(), code.to_string()),
        ];

        let body = self.post_form("oauth/access_token", &params).await?;

        body["access_token"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| GraphError::api("No access token in exchange response"))
    }

    /// `GET /oauth/access_token?grant_type=fb_exchange_token` — short-lived
    /// token for a long-lived one
    pub async fn exchange_for_long_lived_token(
        &self,
        short_lived_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> GraphResult<String> {
        let url = format!(
            "{}/oauth/access_token?grant_type=fb_exchange_token&client_id={}&client_secret={}&fb_exchange_token={}",
            self.endpoint,
            urlencoding::encode(client_id),
            urlencoding::encode(client_secret),
            urlencoding::encode(short_lived_token)
        );

        let body = self.get_json(&url).await?;

        body["access_token"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| GraphError::api("No access token in exchange response"))
    }

    /// `GET /debug_token` — token introspection, fails closed.
    ///
    /// Callers check token health speculatively, so any transport or parse
    /// failure reports an invalid token instead of propagating.
    pub async fn debug_token(&self, input_token: &str, access_token: &str) -> TokenHealth {
        let url = format!(
            "{}/debug_token?input_token={}&access_token={}",
            self.endpoint,
            urlencoding::encode(input_token),
            urlencoding::encode(access_token)
        );

        let body = match self.get_json(&url).await {
            Ok(body) => body,
            Err(e) => {
                return TokenHealth {
                    is_valid: false,
                    error: Some(e.to_string()),
                }
            }
        };

        let data = &body["data"];
        TokenHealth {
            is_valid: data["is_valid"].as_bool().unwrap_or(false),
            error: data["error"]["message"].as_str().map(|s| s.to_string()),
        }
    }

    /// `GET /me/accounts` — the user's pages with their page tokens and
    /// linked business accounts
    pub async fn list_pages(&self, user_token: &str) -> GraphResult<Vec<PageInfo>> {
        let url = format!(
            "{}/me/accounts?fields=id,name,access_token,instagram_business_account&access_token={}",
            self.endpoint,
            urlencoding::encode(user_token)
        );

        let body = self.get_json(&url).await?;

        let pages = body["data"]
            .as_array()
            .ok_or_else(|| GraphError::api("No page list in response"))?
            .iter()
            .filter_map(|page| {
                Some(PageInfo {
                    id: page["id"].as_str()?.to_string(),
                    name: page["name"].as_str().unwrap_or_default().to_string(),
                    access_token: page["access_token"].as_str().map(|s| s.to_string()),
                    instagram_business_account: page["instagram_business_account"]["id"]
                        .as_str()
                        .map(|s| s.to_string()),
                })
            })
            .collect();

        Ok(pages)
    }

    /// `GET /me?fields=id,name` — basic profile fallback when no page has
    /// a linked business account
    pub async fn basic_profile(&self, user_token: &str) -> GraphResult<BasicProfile> {
        let url = format!(
            "{}/me?fields=id,name&access_token={}",
            self.endpoint,
            urlencoding::encode(user_token)
        );

        let body = self.get_json(&url).await?;

        match (body["id"].as_str(), body["name"].as_str()) {
            (Some(id), Some(name)) => Ok(BasicProfile {
                id: id.to_string(),
                name: name.to_string(),
            }),
            _ => Err(GraphError::api("No profile in response")),
        }
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn post_form(&self, path: &str, params: &[(String, String)]) -> GraphResult<Value> {
        let url = format!("{}/{}", self.endpoint, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(|e| GraphError::Transport(e.to_string()))?;

        decode_response(response).await
    }

    async fn get_json(&self, url: &str) -> GraphResult<Value> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GraphError::Transport(e.to_string()))?;

        decode_response(response).await
    }
}

async fn decode_response(response: reqwest::Response) -> GraphResult<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GraphError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(error_from_body(&text));
    }

    serde_json::from_str(&text).map_err(|_| GraphError::api("Unknown error"))
}

/// Decode the platform's `{"error": {"message", "error_subcode"}}` shape;
/// anything else becomes the generic message.
fn error_from_body(body: &str) -> GraphError {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return GraphError::api("Unknown error"),
    };

    let message = parsed["error"]["message"]
        .as_str()
        .unwrap_or("Unknown error")
        .to_string();
    let subcode = parsed["error"]["error_subcode"].as_i64();

    GraphError::Api { message, subcode }
}

/// Publish responses carry `post_id` (photos) or `id` (everything else)
fn extract_post_id(body: &Value) -> Option<String> {
    body["post_id"]
        .as_str()
        .or_else(|| body["id"].as_str())
        .map(|s| s.to_string())
}

fn push_caption(params: &mut Vec<(String, String)>, key: &str, caption: Option<&str>) {
    if let Some(caption) = caption {
        if !caption.is_empty() {
            params.push((key.to_string(), caption.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_body_platform_message() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190,"error_subcode":463}}"#;
        match error_from_body(body) {
            GraphError::Api { message, subcode } => {
                assert_eq!(message, "Invalid OAuth access token.");
                assert_eq!(subcode, Some(463));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_body_not_json() {
        match error_from_body("<html>Bad Gateway</html>") {
            GraphError::Api { message, subcode } => {
                assert_eq!(message, "Unknown error");
                assert_eq!(subcode, None);
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_body_missing_message() {
        match error_from_body(r#"{"error":{"code":100}}"#) {
            GraphError::Api { message, .. } => assert_eq!(message, "Unknown error"),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_post_id_prefers_post_id() {
        let body: Value =
            serde_json::from_str(r#"{"id":"photo-9","post_id":"1234_5678"}"#).unwrap();
        assert_eq!(extract_post_id(&body), Some("1234_5678".to_string()));
    }

    #[test]
    fn test_extract_post_id_falls_back_to_id() {
        let body: Value = serde_json::from_str(r#"{"id":"9876"}"#).unwrap();
        assert_eq!(extract_post_id(&body), Some("9876".to_string()));
    }

    #[test]
    fn test_extract_post_id_absent() {
        let body: Value = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(extract_post_id(&body), None);
    }

    #[test]
    fn test_push_caption_skips_empty() {
        let mut params = Vec::new();
        push_caption(&mut params, "caption", None);
        push_caption(&mut params, "caption", Some(""));
        assert!(params.is_empty());

        push_caption(&mut params, "caption", Some("hello"));
        assert_eq!(params, vec![("caption".to_string(), "hello".to_string())]);
    }

    #[tokio::test]
    async fn test_create_photo_post_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/page-1/photos")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("url".into(), "https://cdn.example.com/a.jpg".into()),
                mockito::Matcher::UrlEncoded("access_token".into(), "EAAB".into()),
                mockito::Matcher::UrlEncoded("caption".into(), "hi".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"900","post_id":"1_2"}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let post_id = client
            .create_photo_post("page-1", "https://cdn.example.com/a.jpg", Some("hi"), "EAAB")
            .await
            .unwrap();

        assert_eq!(post_id, "1_2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_photo_post_without_caption_omits_parameter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/page-1/photos")
            // Exact body: no caption parameter at all
            .match_body(mockito::Matcher::Exact(
                "url=https%3A%2F%2Fcdn.example.com%2Fa.jpg&access_token=EAAB".to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"post_id":"1_2"}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        client
            .create_photo_post("page-1", "https://cdn.example.com/a.jpg", Some(""), "EAAB")
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_photo_post_error_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/page-1/photos")
            .with_status(400)
            .with_body(r#"{"error":{"message":"(#200) Permissions error"}}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let err = client
            .create_photo_post("page-1", "https://cdn.example.com/a.jpg", None, "EAAB")
            .await
            .unwrap_err();

        match err {
            GraphError::Api { message, .. } => assert_eq!(message, "(#200) Permissions error"),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_photo_post_2xx_without_id_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/page-1/photos")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let err = client
            .create_photo_post("page-1", "https://cdn.example.com/a.jpg", None, "EAAB")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("No post ID"));
    }

    #[tokio::test]
    async fn test_create_video_post_scheduled_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/page-1/videos")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("file_url".into(), "https://cdn.example.com/v.mp4".into()),
                mockito::Matcher::UrlEncoded("description".into(), "cap".into()),
                mockito::Matcher::UrlEncoded("published".into(), "false".into()),
                mockito::Matcher::UrlEncoded("scheduled_publish_time".into(), "1900000000".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id":"777"}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let post_id = client
            .create_video_post(
                "page-1",
                "https://cdn.example.com/v.mp4",
                Some("cap"),
                Some(1_900_000_000),
                "EAAB",
            )
            .await
            .unwrap();

        assert_eq!(post_id, "777");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_media_container_video_has_no_caption() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ig-1/media")
            // Exact body: the caption must not travel on a video container
            .match_body(mockito::Matcher::Exact(
                "access_token=EAAB&video_url=https%3A%2F%2Fcdn.example.com%2Fv.mp4&media_type=REELS"
                    .to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"id":"container-5"}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let id = client
            .create_media_container(
                "ig-1",
                "https://cdn.example.com/v.mp4",
                MediaType::Video,
                Some("caption that must not be sent"),
                false,
                "EAAB",
            )
            .await
            .unwrap();

        assert_eq!(id, "container-5");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_media_container_scheduled_video_uses_video_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/ig-1/media")
            .match_body(mockito::Matcher::UrlEncoded("media_type".into(), "VIDEO".into()))
            .with_status(200)
            .with_body(r#"{"id":"container-6"}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        client
            .create_media_container(
                "ig-1",
                "https://cdn.example.com/v.mp4",
                MediaType::Video,
                None,
                true,
                "EAAB",
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_container_status_values() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("/container-1".into()))
            .with_status(200)
            .with_body(r#"{"status_code":"FINISHED","id":"container-1"}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let status = client.container_status("container-1", "EAAB").await.unwrap();
        assert_eq!(status, ContainerStatus::Finished);
    }

    #[tokio::test]
    async fn test_exchange_code_for_token_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/access_token")
            .with_status(400)
            .with_body(r#"{"error":{"message":"This authorization code has expired."}}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let err = client
            .exchange_code_for_token("code", "app", "secret", "https://cb")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "This authorization code has expired.");
    }

    #[tokio::test]
    async fn test_exchange_code_for_token_non_json_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/access_token")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let err = client
            .exchange_code_for_token("code", "app", "secret", "https://cb")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unknown error");
    }

    #[tokio::test]
    async fn test_exchange_for_long_lived_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex("grant_type=fb_exchange_token".into()),
            )
            .with_status(200)
            .with_body(r#"{"access_token":"long-lived","expires_in":5184000}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let token = client
            .exchange_for_long_lived_token("short", "app", "secret")
            .await
            .unwrap();

        assert_eq!(token, "long-lived");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_debug_token_invalid_token_never_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("/debug_token".into()))
            .with_status(200)
            .with_body(r#"{"data":{"is_valid":false,"error":{"message":"Session has expired"}}}"#)
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let health = client.debug_token("stale", "app-token").await;

        assert!(!health.is_valid);
        assert_eq!(health.error, Some("Session has expired".to_string()));
    }

    #[tokio::test]
    async fn test_debug_token_transport_failure_fails_closed() {
        // Nothing is listening on this port
        let client = GraphClient::with_endpoint("http://127.0.0.1:1");
        let health = client.debug_token("token", "app-token").await;

        assert!(!health.is_valid);
        assert!(health.error.is_some());
    }

    #[tokio::test]
    async fn test_list_pages_with_business_account() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("/me/accounts".into()))
            .with_status(200)
            .with_body(
                r#"{"data":[
                    {"id":"p1","name":"First Page","access_token":"tok-1"},
                    {"id":"p2","name":"Brand Page","access_token":"tok-2",
                     "instagram_business_account":{"id":"ig-9"}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = GraphClient::with_endpoint(server.url());
        let pages = client.list_pages("user-token").await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].instagram_business_account, None);
        assert_eq!(
            pages[1].instagram_business_account,
            Some("ig-9".to_string())
        );
        assert_eq!(pages[1].access_token, Some("tok-2".to_string()));
    }
}

//! Channel metadata

use anyhow::Result;

use super::client::YouTubeClient;
use crate::models::{Channel, ListResponse};

impl YouTubeClient {
    /// Fetch a channel by ID. `None` when the API returns no items.
    pub async fn channel(&self, channel_id: &str) -> Result<Option<Channel>> {
        let resp: ListResponse<Channel> = self
            .list(
                "channels",
                &[
                    ("part", "snippet,statistics".to_string()),
                    ("id", channel_id.to_string()),
                ],
            )
            .await?;
        Ok(resp.items.into_iter().next())
    }
}

/// Fetch and display a channel (prints to stdout).
pub async fn show_channel(client: &YouTubeClient, channel_id: &str) -> Result<()> {
    let Some(channel) = client.channel(channel_id).await? else {
        tracing::warn!("No channel information found for ID: {}", channel_id);
        println!("Channel not found: {}", channel_id);
        return Ok(());
    };

    println!();
    if let Some(snippet) = &channel.snippet {
        println!("Title:       {}", snippet.title);
        if let Some(handle) = &snippet.custom_url {
            println!("Handle:      {}", handle);
        }
    }
    if let Some(stats) = &channel.statistics {
        println!(
            "Subscribers: {}",
            stats.subscriber_count.as_deref().unwrap_or("(hidden)")
        );
        println!("Videos:      {}", stats.video_count.as_deref().unwrap_or("?"));
        println!("Views:       {}", stats.view_count.as_deref().unwrap_or("?"));
    }
    println!("ID:          {}", channel.id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{client_with_credential, client_without_credential};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_channel_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "UC123"))
            .and(header("authorization", "Bearer A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "UC123",
                    "snippet": {"title": "Some Channel", "customUrl": "@some"},
                    "statistics": {"viewCount": "10", "subscriberCount": "2", "videoCount": "1"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, client) = client_with_credential(&server, None);
        let channel = client.channel("UC123").await.unwrap().unwrap();
        assert_eq!(channel.snippet.unwrap().title, "Some Channel");
        assert_eq!(channel.statistics.unwrap().subscriber_count.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_channel_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})),
            )
            .mount(&server)
            .await;

        let (_dir, client) = client_with_credential(&server, None);
        assert!(client.channel("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_api_key_without_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("key", "public-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, client) = client_without_credential(&server, Some("public-key"));
        assert!(client.channel("UC123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_credential_no_key_requires_login() {
        let server = MockServer::start().await;
        let (_dir, client) = client_without_credential(&server, None);
        let err = client.channel("UC123").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::auth::AuthError>(),
            Some(crate::auth::AuthError::ReauthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
            .mount(&server)
            .await;

        let (_dir, client) = client_with_credential(&server, None);
        let err = client.channel("UC123").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 403"));
    }

    #[tokio::test]
    async fn test_revoked_token_requires_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (_dir, client) = client_with_credential(&server, None);
        let err = client.channel("UC123").await.unwrap_err();
        assert!(err.to_string().contains("tubekey login"));
        assert!(matches!(
            err.downcast_ref::<crate::auth::AuthError>(),
            Some(crate::auth::AuthError::ReauthenticationRequired)
        ));
    }
}

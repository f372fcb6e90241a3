//! Playlist metadata and playlist contents

use anyhow::Result;

use super::client::YouTubeClient;
use crate::models::{ListResponse, Playlist, PlaylistItem};

/// Page size used when the caller does not ask for one
pub const DEFAULT_MAX_RESULTS: u32 = 10;

impl YouTubeClient {
    /// Fetch a playlist by ID. `None` when the API returns no items.
    pub async fn playlist(&self, playlist_id: &str) -> Result<Option<Playlist>> {
        let resp: ListResponse<Playlist> = self
            .list(
                "playlists",
                &[
                    ("part", "snippet,contentDetails".to_string()),
                    ("id", playlist_id.to_string()),
                ],
            )
            .await?;
        Ok(resp.items.into_iter().next())
    }

    /// First page of a playlist's entries (API caps `maxResults` at 50).
    pub async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> Result<ListResponse<PlaylistItem>> {
        self.list(
            "playlistItems",
            &[
                ("part", "snippet,contentDetails".to_string()),
                ("playlistId", playlist_id.to_string()),
                ("maxResults", max_results.clamp(1, 50).to_string()),
            ],
        )
        .await
    }
}

/// Fetch and display a playlist (prints to stdout).
pub async fn show_playlist(client: &YouTubeClient, playlist_id: &str) -> Result<()> {
    let Some(playlist) = client.playlist(playlist_id).await? else {
        tracing::warn!("No playlist information found for ID: {}", playlist_id);
        println!("Playlist not found: {}", playlist_id);
        return Ok(());
    };

    println!();
    if let Some(snippet) = &playlist.snippet {
        println!("Title:   {}", snippet.title);
        println!(
            "Channel: {}",
            snippet.channel_title.as_deref().unwrap_or("(unknown)")
        );
    }
    if let Some(count) = playlist.content_details.as_ref().and_then(|d| d.item_count) {
        println!("Videos:  {}", count);
    }
    println!("ID:      {}", playlist.id);

    Ok(())
}

/// List the videos of a playlist (prints to stdout).
pub async fn list_playlist_videos(
    client: &YouTubeClient,
    playlist_id: &str,
    limit: u32,
) -> Result<()> {
    let items = client.playlist_items(playlist_id, limit).await?.items;

    println!("\nPlaylist {}:", playlist_id);
    println!("{:-<60}", "");

    if items.is_empty() {
        println!("  (no videos found)");
        return Ok(());
    }

    for item in &items {
        let title = item.snippet.as_ref().map(|s| s.title.as_str()).unwrap_or("");
        println!("  {:<14} {}", item.video_id().unwrap_or("?"), title);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client_with_credential;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_playlist_items_clamps_page_size() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "PL1"))
            .and(query_param("maxResults", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "i1", "contentDetails": {"videoId": "v1"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, client) = client_with_credential(&server, None);
        let items = client.playlist_items("PL1", 500).await.unwrap().items;
        assert_eq!(items[0].video_id(), Some("v1"));
    }

    #[tokio::test]
    async fn test_playlist_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(query_param("id", "PL1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{
                    "id": "PL1",
                    "snippet": {"title": "Mix", "channelTitle": "Someone"},
                    "contentDetails": {"itemCount": 12}
                }]
            })))
            .mount(&server)
            .await;

        let (_dir, client) = client_with_credential(&server, None);
        let playlist = client.playlist("PL1").await.unwrap().unwrap();
        assert_eq!(playlist.content_details.unwrap().item_count, Some(12));
    }
}

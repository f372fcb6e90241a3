//! Video metadata

use anyhow::Result;

use super::client::YouTubeClient;
use crate::models::{ListResponse, Video};

impl YouTubeClient {
    /// Fetch a video by ID. `None` when the API returns no items.
    pub async fn video(&self, video_id: &str) -> Result<Option<Video>> {
        let resp: ListResponse<Video> = self
            .list(
                "videos",
                &[
                    ("part", "snippet,contentDetails,statistics".to_string()),
                    ("id", video_id.to_string()),
                ],
            )
            .await?;
        Ok(resp.items.into_iter().next())
    }
}

/// Fetch and display a video (prints to stdout).
pub async fn show_video(client: &YouTubeClient, video_id: &str) -> Result<()> {
    let Some(video) = client.video(video_id).await? else {
        println!("Video not found: {}", video_id);
        return Ok(());
    };

    println!();
    if let Some(snippet) = &video.snippet {
        println!("Title:    {}", snippet.title);
        println!(
            "Channel:  {}",
            snippet.channel_title.as_deref().unwrap_or("(unknown)")
        );
        println!(
            "Uploaded: {}",
            snippet.published_at.as_deref().unwrap_or("?")
        );
    }
    if let Some(duration) = video.content_details.as_ref().and_then(|d| d.duration.as_deref()) {
        println!("Duration: {}", duration);
    }
    if let Some(views) = video.statistics.as_ref().and_then(|s| s.view_count.as_deref()) {
        println!("Views:    {}", views);
    }
    println!("ID:       {}", video.id);

    Ok(())
}

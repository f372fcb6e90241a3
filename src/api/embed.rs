//! Embed snippets and timed playback links for playlists

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;

use super::client::YouTubeClient;

/// `<iframe>` markup embedding the whole playlist.
pub fn embed_code(playlist_id: &str) -> String {
    format!(
        "<iframe width=\"560\" height=\"315\" \
         src=\"https://www.youtube.com/embed/videoseries?list={playlist_id}\" \
         frameborder=\"0\" allow=\"accelerometer; autoplay; clipboard-write; \
         encrypted-media; gyroscope; picture-in-picture\" allowfullscreen></iframe>"
    )
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

pub fn watch_url(video_id: &str, offset_secs: i64) -> String {
    format!("https://www.youtube.com/watch?v={video_id}&t={offset_secs}s")
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_start_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("Invalid time format {:?}. Use HH:MM.", raw))
}

/// Seconds from `now` until the next occurrence of `at`, rolling over to
/// tomorrow when `at` has already passed today.
pub fn seconds_until(now: NaiveDateTime, at: NaiveTime) -> i64 {
    let mut target = now.date().and_time(at);
    if target < now {
        target += Duration::days(1);
    }
    (target - now).num_seconds()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackLinks {
    pub playlist_url: String,
    pub video_url: String,
    pub offset_secs: i64,
}

impl YouTubeClient {
    /// Links to the playlist and to its first video, offset by the time left
    /// until `at`. `None` for an empty playlist.
    pub async fn playback_links(
        &self,
        playlist_id: &str,
        at: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<Option<PlaybackLinks>> {
        let items = self.playlist_items(playlist_id, 1).await?.items;
        let Some(first_video) = items.iter().find_map(|item| item.video_id()) else {
            tracing::warn!("No videos found for playlist ID: {}", playlist_id);
            return Ok(None);
        };

        let offset_secs = seconds_until(now, at);
        Ok(Some(PlaybackLinks {
            playlist_url: playlist_url(playlist_id),
            video_url: watch_url(first_video, offset_secs),
            offset_secs,
        }))
    }
}

/// Open a playlist and its first video in the default browser.
pub async fn play_playlist(client: &YouTubeClient, playlist_id: &str, at: &str) -> Result<()> {
    let at = parse_start_time(at)?;
    let now = chrono::Local::now().naive_local();
    let Some(links) = client.playback_links(playlist_id, at, now).await? else {
        println!("No videos found in playlist {}", playlist_id);
        return Ok(());
    };

    webbrowser::open(&links.playlist_url).context("Failed to open browser")?;
    webbrowser::open(&links.video_url).context("Failed to open browser")?;
    println!(
        "Opening playlist and the first video at {} in your default browser.",
        at.format("%H:%M")
    );
    Ok(())
}

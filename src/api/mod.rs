//! API client module for YouTube Data API v3

pub mod channels;
pub mod client;
pub mod embed;
pub mod playlists;
pub mod videos;

pub use client::YouTubeClient;

//! Data models for YouTube Data API v3 resources

mod channel;
mod playlist;
mod video;

pub use channel::*;
pub use playlist::*;
pub use video::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope returned by every `list` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
    pub page_info: Option<PageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_results: Option<u64>,
    pub results_per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Thumbnails keyed by size name (`default`, `medium`, `high`, ...)
pub type Thumbnails = HashMap<String, Thumbnail>;

//! HTTP routes
//!
//! Thin handlers over the lifecycle manager and the YouTube client. Auth
//! failures map to 401 so the caller knows to visit `/login`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::embed::{self, PlaybackLinks};
use crate::api::playlists::DEFAULT_MAX_RESULTS;
use crate::api::YouTubeClient;
use crate::auth::{AuthError, CredentialStatus, OAuthClient, TokenLifecycleManager, TokenStore};
use crate::config::Config;
use crate::models::{Channel, ListResponse, Playlist, PlaylistItem, Video};

/// Shared services, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TokenLifecycleManager>,
    pub oauth: Arc<OAuthClient>,
    pub youtube: YouTubeClient,
    /// CSRF state of the consent URL most recently handed out
    pending_state: Arc<Mutex<Option<String>>>,
}

impl AppState {
    pub fn new(
        manager: Arc<TokenLifecycleManager>,
        oauth: Arc<OAuthClient>,
        youtube: YouTubeClient,
    ) -> Self {
        Self {
            manager,
            oauth,
            youtube,
            pending_state: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(TokenStore::new(config.token_path()?));
        let oauth = Arc::new(OAuthClient::new(config.auth_config()));
        let manager = Arc::new(
            TokenLifecycleManager::new(store, oauth.clone())
                .with_refresh_timeout(config.refresh_timeout()),
        );
        let youtube = YouTubeClient::new(manager.clone(), &config.api_base, config.api_key.clone());
        Ok(Self::new(manager, oauth, youtube))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/status", get(status))
        .route("/get-channel/{channel_id}", get(get_channel))
        .route("/get-playlist/{playlist_id}", get(get_playlist))
        .route("/get-playlist-videos", get(get_playlist_videos))
        .route("/get-video/{video_id}", get(get_video))
        .route("/embed-playlist/{playlist_id}", get(embed_playlist))
        .route("/play-playlist/{playlist_id}", get(play_playlist))
        .with_state(state)
}

pub async fn serve(state: AppState, config: &Config) -> Result<()> {
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", err);
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<AuthError>() {
            Some(auth) if auth.requires_login() => {
                tracing::warn!("{}", auth);
                Self {
                    status: StatusCode::UNAUTHORIZED,
                    message: "Authentication required".to_string(),
                }
            }
            _ => {
                tracing::error!("{:#}", err);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".to_string(),
                }
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        anyhow::Error::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

async fn login(State(state): State<AppState>) -> ApiResult<Redirect> {
    let (url, csrf) = state.oauth.authorize_url()?;
    *state.pending_state.lock() = Some(csrf.secret().clone());
    Ok(Redirect::temporary(url.as_str()))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(error) = params.error {
        tracing::warn!("Authorization denied: {}", error);
        return Err(ApiError::bad_request(format!("Authorization failed: {error}")));
    }
    let Some(code) = params.code else {
        tracing::error!("No code parameter found in request");
        return Err(ApiError::bad_request("Missing code parameter."));
    };
    {
        // Each issued state is accepted once; codes without one only go
        // through `tubekey login --code`.
        let mut pending = state.pending_state.lock();
        match params.state.as_deref() {
            Some(got) if pending.as_deref() == Some(got) => {
                pending.take();
            }
            _ => {
                tracing::warn!("Callback state does not match an issued consent URL");
                return Err(ApiError::bad_request("State mismatch."));
            }
        }
    }

    let credential = state.oauth.exchange_code(&code).await?;
    state.manager.store_exchanged(&credential).await?;
    tracing::info!("Authentication successful and token info saved");
    Ok(Json(MessageResponse {
        message: "Authentication successful".to_string(),
    }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refreshable: Option<bool>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let response = match state.manager.status() {
        CredentialStatus::Absent => StatusResponse {
            status: "absent",
            expires_at: None,
            refreshable: None,
        },
        CredentialStatus::Valid { expires_at } => StatusResponse {
            status: "valid",
            expires_at: Some(expires_at),
            refreshable: None,
        },
        CredentialStatus::Expired { refreshable } => StatusResponse {
            status: "expired",
            expires_at: None,
            refreshable: Some(refreshable),
        },
    };
    Json(response)
}

async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> ApiResult<Json<Channel>> {
    match state.youtube.channel(&channel_id).await? {
        Some(channel) => Ok(Json(channel)),
        None => {
            tracing::warn!("No channel information found for ID: {}", channel_id);
            Err(ApiError::not_found("Channel not found"))
        }
    }
}

async fn get_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
) -> ApiResult<Json<Playlist>> {
    match state.youtube.playlist(&playlist_id).await? {
        Some(playlist) => Ok(Json(playlist)),
        None => {
            tracing::warn!("No playlist information found for ID: {}", playlist_id);
            Err(ApiError::not_found("Playlist not found"))
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistVideosParams {
    playlist_id: String,
    max_results: Option<u32>,
}

async fn get_playlist_videos(
    State(state): State<AppState>,
    Query(params): Query<PlaylistVideosParams>,
) -> ApiResult<Json<ListResponse<PlaylistItem>>> {
    let items = state
        .youtube
        .playlist_items(
            &params.playlist_id,
            params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        )
        .await?;
    tracing::info!("Retrieved playlist videos successfully");
    Ok(Json(items))
}

async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<Video>> {
    match state.youtube.video(&video_id).await? {
        Some(video) => Ok(Json(video)),
        None => Err(ApiError::not_found("Video not found")),
    }
}

#[derive(Debug, Serialize)]
struct EmbedCodeResponse {
    embed_code: String,
}

async fn embed_playlist(Path(playlist_id): Path<String>) -> ApiResult<Json<EmbedCodeResponse>> {
    if playlist_id.trim().is_empty() {
        return Err(ApiError::bad_request("Playlist ID is required."));
    }
    Ok(Json(EmbedCodeResponse {
        embed_code: embed::embed_code(&playlist_id),
    }))
}

#[derive(Debug, Deserialize)]
struct PlayParams {
    start_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlayResponse {
    message: String,
    #[serde(flatten)]
    links: PlaybackLinks,
}

async fn play_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<String>,
    Query(params): Query<PlayParams>,
) -> ApiResult<Json<PlayResponse>> {
    let start_time = params.start_time.unwrap_or_else(|| "00:00".to_string());
    let at = embed::parse_start_time(&start_time)
        .map_err(|_| ApiError::bad_request("Invalid time format. Use HH:MM."))?;
    let now = chrono::Local::now().naive_local();

    match state.youtube.playback_links(&playlist_id, at, now).await? {
        Some(links) => Ok(Json(PlayResponse {
            message: format!("Playlist and first video ready to start at {start_time}."),
            links,
        })),
        None => Err(ApiError::not_found("No videos found in the playlist.")),
    }
}

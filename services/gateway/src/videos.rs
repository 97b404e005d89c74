//! Video list and per-video playback progress.
//!
//! The list lives under a single key, newest first, and is rewritten whole on
//! every mutation. Progress records live under `video:{id}:progress` and are
//! removed together with their video.

use crate::error::{GatewayError, Result, StoreError};
use crate::ids::{new_record_id, now};
use crate::kv_store::{get_json, put_json, KeyValueStore};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

/// Store key holding the video list
pub const VIDEOS_KEY: &str = "videos";

/// Fields the server owns; client-supplied values for these are dropped
const RESERVED_FIELDS: [&str; 3] = ["id", "addedAt", "progress"];

/// A stored video record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub added_at: DateTime<Utc>,
    /// Only populated on the listing response, never persisted in the list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    /// Arbitrary client-supplied fields (title, url, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Playback position for one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_time: f64,
    pub duration: f64,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /api/videos/progress`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub video_id: String,
    pub current_time: f64,
    pub duration: f64,
}

pub fn progress_key(video_id: &str) -> String {
    format!("video:{}:progress", video_id)
}

/// Interpret a parsed request body as the fields of a new video
pub fn video_fields(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(GatewayError::Validation(
            "Video must be a JSON object".to_string(),
        )),
    }
}

async fn load_videos(store: &dyn KeyValueStore) -> Result<Vec<Video>> {
    Ok(get_json(store, VIDEOS_KEY).await?.unwrap_or_default())
}

/// List all videos with their progress attached.
///
/// Progress lookups are issued concurrently; the result keeps list order.
#[instrument(skip(store))]
pub async fn list_videos(store: &dyn KeyValueStore) -> Result<Vec<Video>> {
    let videos = load_videos(store).await?;

    let lookups = videos.into_iter().map(|mut video| async move {
        let key = progress_key(&video.id);
        if let Some(progress) = get_json::<Progress>(store, &key).await? {
            video.progress = Some(progress);
        }
        Ok::<_, StoreError>(video)
    });

    let videos = try_join_all(lookups).await?;
    debug!(count = videos.len(), "Listed videos");
    Ok(videos)
}

/// Create a video from client fields and push it onto the head of the list
#[instrument(skip(store, fields))]
pub async fn add_video(
    store: &dyn KeyValueStore,
    mut fields: Map<String, Value>,
    max_videos: usize,
) -> Result<Video> {
    for reserved in RESERVED_FIELDS {
        fields.remove(reserved);
    }

    let video = Video {
        id: new_record_id(),
        added_at: now(),
        progress: None,
        fields,
    };

    let mut videos = load_videos(store).await?;
    videos.insert(0, video.clone());
    videos.truncate(max_videos);
    put_json(store, VIDEOS_KEY, &videos).await?;

    metrics::counter!("gateway_videos_added_total").increment(1);
    info!(video_id = %video.id, count = videos.len(), "Added video");

    Ok(video)
}

/// Create or overwrite the progress record for a video.
///
/// The video is not required to exist.
#[instrument(skip(store, update), fields(video_id = %update.video_id))]
pub async fn update_progress(store: &dyn KeyValueStore, update: ProgressUpdate) -> Result<Progress> {
    let progress = Progress {
        current_time: update.current_time,
        duration: update.duration,
        updated_at: now(),
    };

    put_json(store, &progress_key(&update.video_id), &progress).await?;

    metrics::counter!("gateway_progress_updates_total").increment(1);
    debug!(current_time = progress.current_time, "Updated progress");

    Ok(progress)
}

/// Remove a video and its progress record. Returns whether the video was listed.
#[instrument(skip(store))]
pub async fn delete_video(store: &dyn KeyValueStore, video_id: &str) -> Result<bool> {
    let mut videos = load_videos(store).await?;
    let before = videos.len();
    videos.retain(|video| video.id != video_id);
    let removed = videos.len() != before;

    // Written back even when nothing matched
    put_json(store, VIDEOS_KEY, &videos).await?;
    store.delete(&progress_key(video_id)).await?;

    metrics::counter!("gateway_videos_deleted_total").increment(1);
    info!(video_id = %video_id, removed, "Deleted video");

    Ok(removed)
}

/// Remove every video, every listed video's progress, and the list key itself.
/// Returns the number of videos that were listed.
#[instrument(skip(store))]
pub async fn clear_videos(store: &dyn KeyValueStore) -> Result<usize> {
    let videos = load_videos(store).await?;

    for video in &videos {
        store.delete(&progress_key(&video.id)).await?;
    }
    store.delete(VIDEOS_KEY).await?;

    metrics::counter!("gateway_videos_cleared_total").increment(1);
    info!(count = videos.len(), "Cleared videos");

    Ok(videos.len())
}

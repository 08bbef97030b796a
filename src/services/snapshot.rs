//! Persisted playlist artifacts and change detection
//!
//! The M3U on disk is the baseline for the next run: it is hashed fresh each
//! time, no separate fingerprint file is kept.

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Playlist, PlaylistSummary};
use crate::services::m3u_parser::M3U_HEADER;

/// Serialize the playlist as M3U: header, then EXTINF/URL line pairs
pub fn serialize_m3u(playlist: &Playlist) -> String {
    let mut content = String::with_capacity(16 + playlist.len() * 160);
    content.push_str(M3U_HEADER);
    content.push('\n');

    for entry in playlist.entries() {
        content.push_str(&entry.metadata_line);
        content.push('\n');
        content.push_str(&entry.stream_url);
        content.push('\n');
    }

    content
}

/// SHA1 hex digest of serialized content
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Writes the M3U and JSON summary
pub struct SnapshotWriter {
    playlist_path: PathBuf,
    summary_path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(playlist_path: impl Into<PathBuf>, summary_path: impl Into<PathBuf>) -> Self {
        Self {
            playlist_path: playlist_path.into(),
            summary_path: summary_path.into(),
        }
    }

    pub fn playlist_path(&self) -> &Path {
        &self.playlist_path
    }

    pub async fn commit(&self, playlist: &Playlist) -> PipelineResult<bool> {
        self.commit_at(playlist, Utc::now()).await
    }

    /// Persist the playlist and report whether the M3U content changed
    ///
    /// The M3U is only rewritten when its fingerprint differs from the file
    /// on disk. The summary is rewritten every time so its timestamp stays
    /// current.
    pub async fn commit_at(&self, playlist: &Playlist, now: DateTime<Utc>) -> PipelineResult<bool> {
        let content = serialize_m3u(playlist);
        let new_hash = fingerprint(content.as_bytes());
        let old_hash = self.previous_fingerprint().await;

        let changed = old_hash.as_deref() != Some(new_hash.as_str());
        if changed {
            write_atomic(&self.playlist_path, content.as_bytes()).await?;
            tracing::info!(
                path = %self.playlist_path.display(),
                fingerprint = %new_hash,
                "Playlist updated"
            );
        } else {
            tracing::info!("No changes detected");
        }

        let summary = PlaylistSummary::from_playlist(playlist, now);
        let json = serde_json::to_string_pretty(&summary)?;
        write_atomic(&self.summary_path, json.as_bytes()).await?;

        Ok(changed)
    }

    /// Fingerprint of the M3U from the previous run, if readable
    async fn previous_fingerprint(&self) -> Option<String> {
        match fs::read(&self.playlist_path).await {
            Ok(bytes) => Some(fingerprint(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(
                    "Failed to read previous playlist {}: {}",
                    self.playlist_path.display(),
                    e
                );
                None
            }
        }
    }
}

/// Write to a sibling temp file, sync, then rename over the target
async fn write_atomic(path: &Path, content: &[u8]) -> PipelineResult<()> {
    let persist = |e| PipelineError::persistence(path, e);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(persist)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path).await.map_err(persist)?;
    file.write_all(content).await.map_err(persist)?;
    file.sync_all().await.map_err(persist)?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(persist(e));
    }

    Ok(())
}

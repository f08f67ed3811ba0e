//! Media catalog client: list, download, and delete files on the camera.
//!
//! The camera serves a nested directory/file index; entries are flattened
//! into [`MediaEntry`] values with direct download URLs synthesized from the
//! session address. Downloads stream chunk by chunk to the local download
//! directory with optional percent-complete progress reporting.

use crate::connection::ConnectionSession;
use crate::errors::CameraError;
use crate::types::MediaEntry;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const MEDIA_LIST_ENDPOINT: &str = "/gopro/media/list";
const DELETE_FILE_ENDPOINT: &str = "/gopro/media/delete/file";
const DELETE_ALL_ENDPOINT: &str = "/gopro/media/delete/all";

/// Progress callback, invoked with percent complete (0.0 to 100.0) when the
/// transfer length is known.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(f64) + Send);

#[derive(Debug, Default, Deserialize)]
struct RawIndex {
    #[serde(default)]
    media: Vec<RawDirectory>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDirectory {
    #[serde(default)]
    d: String,
    #[serde(default)]
    fs: Vec<RawFile>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    n: String,
    #[serde(default)]
    s: Value,
    #[serde(default)]
    cre: Value,
    #[serde(default, rename = "mod")]
    modified: Value,
}

/// Media management against the camera's flat index.
pub struct MediaStore {
    session: ConnectionSession,
    download_dir: PathBuf,
    // Separate client: downloads run far longer than command requests, so
    // only the connect phase is bounded.
    download_client: reqwest::Client,
}

impl MediaStore {
    pub fn new(session: ConnectionSession, download_dir: &str) -> Result<Self, CameraError> {
        let download_dir = PathBuf::from(download_dir);
        std::fs::create_dir_all(&download_dir)?;

        let download_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CameraError::Config(format!("failed to build download client: {}", e)))?;

        Ok(Self {
            session,
            download_dir,
            download_client,
        })
    }

    pub fn download_dir(&self) -> &PathBuf {
        &self.download_dir
    }

    /// List all media files on the camera, flattened. A failed listing or an
    /// empty index both yield an empty vec.
    pub async fn list(&self) -> Vec<MediaEntry> {
        let Some(body) = self.session.request(MEDIA_LIST_ENDPOINT, &[]).await else {
            return Vec::new();
        };
        let Some(address) = self.session.address().await else {
            return Vec::new();
        };
        parse_index(&address, self.session.port(), body)
    }

    /// The most recent entry in the index, if any.
    pub async fn latest(&self) -> Option<MediaEntry> {
        self.list().await.pop()
    }

    /// Download one file from the camera, streaming it to the download
    /// directory. Returns the local path on success; on any transport or
    /// write error the partial file is left in place and `None` is returned.
    pub async fn download(
        &self,
        directory: &str,
        filename: &str,
        mut on_progress: Option<ProgressFn<'_>>,
    ) -> Option<PathBuf> {
        let address = match self.session.address().await {
            Some(address) => address,
            None => {
                if !self.session.connect().await {
                    return None;
                }
                self.session.address().await?
            }
        };

        let url = download_url(&address, self.session.port(), directory, filename);
        let local_path = self.download_dir.join(filename);

        let mut resp = match self.download_client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                log::warn!("Download error for {}: {}", filename, e);
                return None;
            }
        };
        if !resp.status().is_success() {
            log::warn!("Failed to download {}: HTTP {}", filename, resp.status());
            return None;
        }

        let total = resp.content_length();
        let mut file = match tokio::fs::File::create(&local_path).await {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Cannot create {}: {}", local_path.display(), e);
                return None;
            }
        };

        let mut downloaded: u64 = 0;
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = file.write_all(&chunk).await {
                        log::warn!("Write error for {}: {}", local_path.display(), e);
                        return None;
                    }
                    downloaded += chunk.len() as u64;
                    if let (Some(cb), Some(total)) = (on_progress.as_deref_mut(), total) {
                        if total > 0 {
                            cb(downloaded as f64 / total as f64 * 100.0);
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Download stream error for {}: {}", filename, e);
                    return None;
                }
            }
        }

        if let Err(e) = file.flush().await {
            log::warn!("Flush error for {}: {}", local_path.display(), e);
            return None;
        }

        log::info!(
            "Downloaded {} ({} bytes) to {}",
            filename,
            downloaded,
            local_path.display()
        );
        Some(local_path)
    }

    /// Download the most recent media file.
    pub async fn download_latest(&self, on_progress: Option<ProgressFn<'_>>) -> Option<PathBuf> {
        let latest = self.latest().await?;
        self.download(&latest.directory, &latest.filename, on_progress)
            .await
    }

    /// Delete one file from the camera.
    pub async fn delete_file(&self, directory: &str, filename: &str) -> bool {
        let path = format!("{}/{}", directory, filename);
        self.session
            .request(DELETE_FILE_ENDPOINT, &[("path", path)])
            .await
            .is_some()
    }

    /// Delete all media from the camera.
    pub async fn delete_all(&self) -> bool {
        self.session.request(DELETE_ALL_ENDPOINT, &[]).await.is_some()
    }

    pub async fn thumbnail_url(&self, directory: &str, filename: &str) -> Option<String> {
        let address = self.session.address().await?;
        Some(format!(
            "http://{}:{}/gopro/media/thumbnail?path={}/{}",
            address,
            self.session.port(),
            directory,
            filename
        ))
    }

    pub async fn screennail_url(&self, directory: &str, filename: &str) -> Option<String> {
        let address = self.session.address().await?;
        Some(format!(
            "http://{}:{}/gopro/media/screennail?path={}/{}",
            address,
            self.session.port(),
            directory,
            filename
        ))
    }

    /// Names of already-downloaded files, sorted.
    pub fn local_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.download_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

/// Direct download URL for a file in the camera's DCIM tree.
pub fn download_url(address: &str, port: u16, directory: &str, filename: &str) -> String {
    format!(
        "http://{}:{}/videos/DCIM/{}/{}",
        address, port, directory, filename
    )
}

/// Flatten the camera's nested index body into entries. Malformed size or
/// timestamp fields degrade to zero/`None` rather than failing the listing.
pub fn parse_index(address: &str, port: u16, body: Value) -> Vec<MediaEntry> {
    let index: RawIndex = match serde_json::from_value(body) {
        Ok(index) => index,
        Err(e) => {
            log::warn!("Unparseable media index: {}", e);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for dir in index.media {
        for file in dir.fs {
            if file.n.is_empty() {
                continue;
            }
            entries.push(MediaEntry {
                url: download_url(address, port, &dir.d, &file.n),
                directory: dir.d.clone(),
                filename: file.n,
                size: lenient_u64(&file.s).unwrap_or(0),
                created: lenient_epoch(&file.cre),
                modified: lenient_epoch(&file.modified),
            });
        }
    }
    entries
}

// The camera reports sizes and epoch timestamps as decimal strings, but
// firmware revisions have used bare numbers too.
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn lenient_epoch(value: &Value) -> Option<DateTime<Utc>> {
    let secs = lenient_u64(value)?;
    DateTime::<Utc>::from_timestamp(secs as i64, 0)
}

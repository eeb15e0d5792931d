//! Media referenced from blocks.
//!
//! Externally linked media is used where it lives. Files hosted by the
//! content source sit behind expiring URLs, so they are staged for download
//! during rendering and fetched in one go by [`StagingMediaResolver::commit`].

use std::path::{Path, PathBuf};

use dashmap::{DashMap, DashSet};
use motionlink_common::model::{FileObject, FileSource};
use motionlink_common::{MotionlinkError, RemoteError};
use tracing::{debug, info};
use url::Url;

use crate::fs::FilePersistence;
use crate::paths::relative_link;
use crate::rich_text::render_all;

/// A resolved media reference, ready to drop into markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub src: String,
    pub caption_markdown: String,
}

pub trait MediaResolver: Send + Sync {
    /// Claim a destination for a hosted file and return the link to it from
    /// files in `out_dir`.
    fn stage(&self, url: &str, out_dir: &Path) -> String;

    fn resolve(&self, file: &FileObject, out_dir: &Path) -> MediaRef {
        let src = match &file.source {
            FileSource::External { external } => external.url.clone(),
            FileSource::File { file } => self.stage(&file.url, out_dir),
        };
        MediaRef {
            src,
            caption_markdown: render_all(&file.caption),
        }
    }
}

/// Leaves hosted URLs as they are. Output will link to expiring URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughMedia;

impl MediaResolver for PassthroughMedia {
    fn stage(&self, url: &str, _out_dir: &Path) -> String {
        url.to_string()
    }
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "tif", "tiff", "ico", "heic", "avif",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "avi", "mkv", "m4v", "ogv", "wmv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "oga", "m4a", "flac", "aac", "opus"];

/// Folder a file lands in, by extension.
pub fn media_folder(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let extension = extension.as_str();

    if IMAGE_EXTENSIONS.contains(&extension) {
        "images"
    } else if VIDEO_EXTENSIONS.contains(&extension) {
        "videos"
    } else if AUDIO_EXTENSIONS.contains(&extension) {
        "audio"
    } else if extension == "pdf" {
        "pdfs"
    } else {
        "other_media"
    }
}

/// Decoded last path segment of `url`, ignoring its query string.
///
/// Separators that only appear after decoding are treated as path breaks, so
/// the result is always a single plain file name.
fn file_name(url: &str) -> String {
    let raw = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .unwrap_or_default();
    let decoded = urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw);
    decoded
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("media")
        .to_string()
}

/// Stages hosted files under `<out_dir>/<folder>/<file name>`.
///
/// Each URL is staged once per run; later references link to the first
/// destination. Distinct URLs that share a file name get a numeric suffix.
#[derive(Debug, Default)]
pub struct StagingMediaResolver {
    staged: DashMap<String, PathBuf>,
    claimed: DashSet<PathBuf>,
}

impl StagingMediaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Destination already staged for `url`.
    pub fn destination(&self, url: &str) -> Option<PathBuf> {
        self.staged.get(url).map(|p| p.clone())
    }

    fn claim(&self, url: &str, out_dir: &Path) -> PathBuf {
        let name = file_name(url);
        let folder = out_dir.join(media_folder(&name));

        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let extension = Path::new(&name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = folder.join(&name);
        let mut n = 1;
        while !self.claimed.insert(candidate.clone()) {
            candidate = folder.join(format!("{stem}-{n}{extension}"));
            n += 1;
        }
        candidate
    }

    /// Download every staged file and write it through `fs`.
    ///
    /// All downloads are attempted; the first failure is returned.
    pub async fn commit(
        &self,
        client: &reqwest::Client,
        fs: &impl FilePersistence,
    ) -> Result<usize, MotionlinkError> {
        let staged: Vec<(String, PathBuf)> = self
            .staged
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        info!(count = staged.len(), "downloading staged media");

        let downloads = staged.iter().map(|(url, destination)| async move {
            debug!(url = %url, path = %destination.display(), "downloading media");
            let bytes = client
                .get(url.as_str())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(RemoteError::from)?
                .bytes()
                .await
                .map_err(RemoteError::from)?;
            fs.write_bytes(destination, &bytes).await
        });

        let mut first_error = None;
        let mut written = 0;
        for result in n0_future::join_all(downloads).await {
            match result {
                Ok(()) => written += 1,
                Err(err) => {
                    tracing::error!(error = %err, "media download failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }
}

impl MediaResolver for StagingMediaResolver {
    fn stage(&self, url: &str, out_dir: &Path) -> String {
        let destination = self
            .staged
            .entry(url.to_string())
            .or_insert_with(|| self.claim(url, out_dir))
            .clone();
        // links are computed from a file inside out_dir
        relative_link(&out_dir.join("index"), &destination)
    }
}

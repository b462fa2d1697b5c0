//! Input resolution: turn user-supplied paths and URLs into raw file blobs.
//!
//! Three kinds of input are accepted:
//!
//! - a **file**: one blob, folder label = the configured root label
//! - a **folder**: every image/PDF beneath it (recursively, sorted by path),
//!   folder label = the folder's own name
//! - an **HTTP(S) URL**: downloaded into memory, MIME type from the
//!   `Content-Type` header, folder label = the root label
//!
//! Local files are not read here; [`RawFile::read`] loads the bytes when the
//! pipeline reaches the file, so a file that vanishes mid-batch fails only
//! its own record.

use crate::config::StudioConfig;
use crate::error::{FileError, StudioError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a raw file's bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// One selected file, before processing.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub folder: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl RawFile {
    /// Describe a local file. Size and MIME type come from metadata and the
    /// extension; the contents are read later.
    pub fn from_path(path: impl Into<PathBuf>, folder: impl Into<String>) -> Result<Self, StudioError> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|e| io_to_studio(e, &path))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            mime_type: guess_mime_type(&name).to_string(),
            name,
            folder: folder.into(),
            size: meta.len(),
            source: FileSource::Path(path),
        })
    }

    /// Wrap bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        folder: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// Load the file contents.
    pub async fn read(&self) -> Result<Vec<u8>, FileError> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|e| FileError::ReadFailed {
                        name: self.name.clone(),
                        detail: e.to_string(),
                    })
            }
        }
    }
}

/// MIME type from a file name's extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Types the extraction pipeline accepts from folder walks.
pub fn is_supported_mime(mime: &str) -> bool {
    mime.starts_with("image/") || mime == "application/pdf"
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve every input, in order, into raw files.
pub async fn resolve_inputs(
    inputs: &[String],
    config: &StudioConfig,
) -> Result<Vec<RawFile>, StudioError> {
    let mut files = Vec::new();
    for input in inputs {
        if is_url(input) {
            files.push(download_url(input, config).await?);
            continue;
        }

        let path = PathBuf::from(input);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_to_studio(e, &path))?;

        if meta.is_dir() {
            let found = walk_folder(&path).await?;
            info!("Folder {}: {} supported files", path.display(), found.len());
            files.extend(found);
        } else if meta.is_file() {
            files.push(RawFile::from_path(&path, config.root_folder_label.clone())?);
        } else {
            return Err(StudioError::InvalidInput {
                input: input.clone(),
            });
        }
    }
    Ok(files)
}

/// Collect supported files beneath `root`, sorted by path.
async fn walk_folder(root: &Path) -> Result<Vec<RawFile>, StudioError> {
    let label = folder_label(root);
    let mut paths = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_to_studio(e, &dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_to_studio(e, &dir))?
        {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden {
                continue;
            }
            let file_type = entry.file_type().await.map_err(|e| io_to_studio(e, &path))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if is_supported_mime(guess_mime_type(&entry.file_name().to_string_lossy())) {
                paths.push(path);
            } else {
                debug!("Skipping unsupported file {}", path.display());
            }
        }
    }

    paths.sort();
    paths
        .into_iter()
        .map(|p| RawFile::from_path(p, label.clone()))
        .collect()
}

/// The folder's own name, as a browser reports the first path segment of a
/// folder upload.
fn folder_label(root: &Path) -> String {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

fn io_to_studio(e: std::io::Error, path: &Path) -> StudioError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => StudioError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => StudioError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, config: &StudioConfig) -> Result<RawFile, StudioError> {
    info!("Downloading from: {}", url);
    let timeout_secs = config.download_timeout_secs;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StudioError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            StudioError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            StudioError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(StudioError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "application/octet-stream")
        .unwrap_or_else(|| guess_mime_type(&filename).to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| StudioError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes, {})", filename, bytes.len(), mime_type);

    Ok(RawFile::from_bytes(
        filename,
        config.root_folder_label.clone(),
        mime_type,
        bytes.to_vec(),
    ))
}

/// Last path segment of the URL, or `downloaded-file`.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-file".to_string()
}

//! Model and training-data download helpers shared by the engines

use crate::error::OcrError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_NAMESPACE: &str = "docextract";

/// Cache directory for downloaded assets, created if missing
pub fn cache_dir(subdir: Option<&str>) -> Result<PathBuf, OcrError> {
    let mut dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_NAMESPACE);
    if let Some(sub) = subdir {
        dir = dir.join(sub);
    }

    std::fs::create_dir_all(&dir).map_err(|e| {
        OcrError::InitializationError(format!(
            "Failed to create cache directory {:?}: {}",
            dir, e
        ))
    })?;

    Ok(dir)
}

/// Ensure `filename` exists in `dir`, downloading it from `url` if needed
pub fn ensure_downloaded(url: &str, dir: &Path, filename: &str) -> Result<PathBuf, OcrError> {
    let path = dir.join(filename);

    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, path);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);

    Ok(path)
}

/// Download a file from URL to path using ureq
///
/// Writes to a sibling `.part` file first so an interrupted download never
/// leaves a truncated asset at `path`.
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url).call().map_err(|e| {
        OcrError::InitializationError(format!("Failed to download {}: {}", url, e))
    })?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    let partial = path.with_extension("part");
    let mut file = File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create {:?}: {}", partial, e))
    })?;
    file.write_all(&buffer)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write {:?}: {}", partial, e)))?;
    drop(file);

    std::fs::rename(&partial, path)?;
    Ok(())
}

use anyhow::{Context, Result, bail};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::uri::SourceUri;
use crate::config::FETCH_PROGRAM;

/// Bring the source to `dest`, overwriting any previous copy
///
/// Remote URLs are retrieved with the external fetch program in a single
/// attempt. Local sources are copied so later stages always read `dest`.
pub async fn fetch(source: &SourceUri, dest: &Path) -> Result<()> {
    match source {
        SourceUri::Remote(url) => download(url.as_str(), dest).await,
        SourceUri::Local(path) => copy_local(path, dest).await,
    }
}

async fn download(url: &str, dest: &Path) -> Result<()> {
    info!("Downloading {} to {}", url, dest.display());

    let output = Command::new(FETCH_PROGRAM)
        .arg(url)
        .arg("-O")
        .arg(dest)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", FETCH_PROGRAM))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        bail!(
            "{} exited {} fetching {}: {}",
            FETCH_PROGRAM,
            output.status,
            url,
            tail.into_iter().rev().collect::<Vec<_>>().join("\n")
        );
    }

    let size = tokio::fs::metadata(dest)
        .await
        .with_context(|| format!("Downloaded file missing: {}", dest.display()))?
        .len();
    debug!("Downloaded {} bytes", size);

    Ok(())
}

async fn copy_local(path: &Path, dest: &Path) -> Result<()> {
    let source = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("Source file not found: {}", path.display()))?;

    if tokio::fs::canonicalize(dest).await.ok().as_ref() == Some(&source) {
        debug!("Source already at {}", dest.display());
        return Ok(());
    }

    info!("Copying {} to {}", source.display(), dest.display());
    tokio::fs::copy(&source, dest)
        .await
        .with_context(|| format!("Failed to copy {} to {}", source.display(), dest.display()))?;

    Ok(())
}

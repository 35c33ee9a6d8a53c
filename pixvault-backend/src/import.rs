//! Bulk import from a directory of image files.
//!

use std::path::{Path, PathBuf};

use pixvault_shared::asset::AssetMetadata;
use pixvault_shared::error::VaultError;
use tracing::{error, info, warn};

use crate::ingest::ingest;
use crate::store::Store;

pub const IMPORT_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
}

fn is_importable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMPORT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `sunset_over-the_bay.jpg` becomes "sunset over the bay".
pub fn description_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let description = stem
        .split(['_', '-'])
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    match description.is_empty() {
        true => None,
        false => Some(description),
    }
}

async fn list_images(dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .inspect_err(|err| error!(dir = %dir.display(), error = ?err, "Failed to read import directory"))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_importable(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Ingests every image file directly inside `dir`, one at a time. A file
/// that fails is logged and counted, it doesn't stop the import.
pub async fn import_dir(
    store: &Store,
    dir: &Path,
    status: Option<String>,
) -> Result<ImportSummary, VaultError> {
    let paths = list_images(dir).await?;
    info!(dir = %dir.display(), files = paths.len(), "Starting import");

    let mut summary = ImportSummary::default();
    for path in paths {
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = ?err, "Failed to read file");
                summary.failed += 1;
                continue;
            }
        };

        let metadata = AssetMetadata {
            description: description_from_path(&path),
            status: status.clone(),
            ..Default::default()
        };

        match ingest(store, raw, metadata).await {
            Ok(outcome) => {
                info!(path = %path.display(), asset_id = outcome.id, "imported");
                summary.imported += 1;
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "Failed to import file");
                summary.failed += 1;
            }
        }
    }

    info!(
        imported = summary.imported,
        failed = summary.failed,
        "Import finished"
    );
    Ok(summary)
}

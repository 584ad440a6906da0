//! Maps batch results onto concrete media files in the render tree.
//!
//! Every requested slot resolves: a generated clip when one exists and can be
//! copied, a placeholder otherwise.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use metrics::counter;
use quiz_models::{BatchResult, ClipReference};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::MediaResult;
use crate::fs_utils::{copy_file, remove_dir_if_exists};

/// Metric name for placeholder substitutions.
pub const PLACEHOLDERS_TOTAL: &str = "quiz_placeholders_total";

/// Sub-directory of the render tree holding per-slot clips.
pub const VIDEOS_DIR: &str = "videos";

/// Where a resolved asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetOrigin {
    Generated,
    Placeholder,
}

/// The media file chosen for one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub slot: u32,
    pub origin: AssetOrigin,
    /// Location inside the render tree
    pub clip: ClipReference,
}

impl ResolvedAsset {
    pub fn is_placeholder(&self) -> bool {
        self.origin == AssetOrigin::Placeholder
    }

    /// Path relative to the render tree root, e.g. `videos/choice_1.mp4`.
    pub fn relative_path(&self) -> String {
        let file_name = self
            .clip
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        format!("{}/{}", VIDEOS_DIR, file_name)
    }
}

/// Resolved assets for a batch, keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    assets: BTreeMap<u32, ResolvedAsset>,
}

impl ResolvedAssets {
    pub fn get(&self, slot: u32) -> Option<&ResolvedAsset> {
        self.assets.get(&slot)
    }

    /// Assets in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedAsset> {
        self.assets.values()
    }

    pub fn slots(&self) -> Vec<u32> {
        self.assets.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.iter().filter(|a| a.is_placeholder()).count()
    }

    pub fn generated_count(&self) -> usize {
        self.len() - self.placeholder_count()
    }

    fn insert(&mut self, asset: ResolvedAsset) {
        self.assets.insert(asset.slot, asset);
    }
}

impl FromIterator<ResolvedAsset> for ResolvedAssets {
    fn from_iter<I: IntoIterator<Item = ResolvedAsset>>(iter: I) -> Self {
        let mut assets = ResolvedAssets::default();
        for asset in iter {
            assets.insert(asset);
        }
        assets
    }
}

/// Copies clips into the render tree and substitutes placeholders.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    /// Root of the render tree (clips land in `<root>/videos/`)
    render_root: PathBuf,
    /// Directory holding `placeholder_{slot}.mp4` sources
    placeholder_dir: PathBuf,
}

impl AssetResolver {
    pub fn new(render_root: impl Into<PathBuf>, placeholder_dir: impl Into<PathBuf>) -> Self {
        Self {
            render_root: render_root.into(),
            placeholder_dir: placeholder_dir.into(),
        }
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.render_root.join(VIDEOS_DIR)
    }

    /// Resolve every slot in `slots` against a batch result.
    pub async fn resolve(
        &self,
        batch: &BatchResult,
        slots: impl IntoIterator<Item = u32>,
    ) -> ResolvedAssets {
        let mut resolved = ResolvedAssets::default();

        for slot in slots {
            let asset = match batch.clip(slot) {
                Some(clip) => match self.install_generated(slot, clip).await {
                    Ok(asset) => asset,
                    Err(e) => {
                        warn!(slot, error = %e, "Generated clip unusable, using placeholder");
                        self.install_placeholder(slot).await
                    }
                },
                None => {
                    debug!(slot, "No generated clip, using placeholder");
                    self.install_placeholder(slot).await
                }
            };
            resolved.insert(asset);
        }

        info!(
            generated = resolved.generated_count(),
            placeholders = resolved.placeholder_count(),
            "Assets resolved"
        );
        resolved
    }

    /// Resolve every slot to a placeholder, for runs that skip generation.
    pub async fn placeholders(&self, slots: impl IntoIterator<Item = u32>) -> ResolvedAssets {
        let mut resolved = ResolvedAssets::default();
        for slot in slots {
            resolved.insert(self.install_placeholder(slot).await);
        }
        resolved
    }

    /// Remove the temporary download directory.
    pub async fn clear_staging(&self, staging_dir: impl AsRef<Path>) -> MediaResult<bool> {
        let staging_dir = staging_dir.as_ref();
        let removed = remove_dir_if_exists(staging_dir).await?;
        if removed {
            debug!(dir = %staging_dir.display(), "Staging directory removed");
        }
        Ok(removed)
    }

    async fn install_generated(&self, slot: u32, clip: &ClipReference) -> MediaResult<ResolvedAsset> {
        let dest = self
            .videos_dir()
            .join(format!("choice_{}.{}", slot, clip.extension()));
        copy_file(&clip.source_path, &dest).await?;

        Ok(ResolvedAsset {
            slot,
            origin: AssetOrigin::Generated,
            clip: ClipReference::new(dest, slot),
        })
    }

    /// Never fails: when no placeholder source can be copied the asset still
    /// points at its render-tree location and the assembler degrades it.
    async fn install_placeholder(&self, slot: u32) -> ResolvedAsset {
        counter!(PLACEHOLDERS_TOTAL).increment(1);

        let source = self.placeholder_source(slot);
        let extension = source
            .as_ref()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();
        let dest = self
            .videos_dir()
            .join(format!("placeholder_{}.{}", slot, extension));

        match source {
            Some(source) if source == dest => {}
            Some(source) => {
                if let Err(e) = copy_file(&source, &dest).await {
                    warn!(slot, source = %source.display(), error = %e, "Failed to copy placeholder");
                }
            }
            None => warn!(
                slot,
                dir = %self.placeholder_dir.display(),
                "No placeholder clip available"
            ),
        }

        ResolvedAsset {
            slot,
            origin: AssetOrigin::Placeholder,
            clip: ClipReference::new(dest, slot),
        }
    }

    /// `placeholder_{slot}.mp4`, falling back to a shared `placeholder.mp4`.
    fn placeholder_source(&self, slot: u32) -> Option<PathBuf> {
        [
            self.placeholder_dir.join(format!("placeholder_{}.mp4", slot)),
            self.placeholder_dir.join("placeholder.mp4"),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }
}

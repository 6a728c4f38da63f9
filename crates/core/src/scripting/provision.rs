//! Script resource provisioning.
//!
//! At startup every registered script is copied out of the
//! [`ResourceBundle`] into `<scratch>/python-scripts/`, and every auxiliary
//! data asset into `<scratch>/data/` with its relative path preserved. The
//! result is an immutable [`ScriptPaths`] map handed to the engine.
//!
//! Provisioning must finish before any script is executed. Two processes
//! provisioning the same fixed scratch directory at once is not supported.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use super::bundle::ResourceBundle;
use super::registry::{script_file_name, SCRIPT_REGISTRY};

/// Subdirectory holding provisioned scripts.
pub const SCRIPTS_SUBDIR: &str = "python-scripts";

/// Subdirectory holding provisioned auxiliary data.
pub const DATA_SUBDIR: &str = "data";

/// Prefix of temporary scratch directories.
const SCRATCH_PREFIX: &str = "tradesignal-scripts-";

/// Errors raised while provisioning scripts and assets.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("failed to prepare scratch directory {path}: {source}")]
    ScratchDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read bundled resource '{name}': {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("asset path '{0}' escapes the data directory")]
    UnsafeAssetPath(String),
}

/// A script extracted to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedScript {
    pub script_id: String,
    /// Absolute path inside the scratch directory.
    pub path: PathBuf,
}

/// Immutable map from script id to its provisioned location.
///
/// Built once at startup and shared read-only (behind an `Arc`) by every
/// concurrent invocation.
#[derive(Debug, Clone, Default)]
pub struct ScriptPaths {
    root: PathBuf,
    scripts: BTreeMap<String, ProvisionedScript>,
}

impl ScriptPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scripts: BTreeMap::new(),
        }
    }

    /// Register `path` for `script_id`, replacing any previous entry.
    pub fn insert(&mut self, script_id: &str, path: impl Into<PathBuf>) {
        self.scripts.insert(
            script_id.to_string(),
            ProvisionedScript {
                script_id: script_id.to_string(),
                path: path.into(),
            },
        );
    }

    pub fn resolve(&self, script_id: &str) -> Option<&ProvisionedScript> {
        self.scripts.get(script_id)
    }

    pub fn contains(&self, script_id: &str) -> bool {
        self.scripts.contains_key(script_id)
    }

    pub fn script_ids(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Scratch root; also the working directory of every script.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(SCRIPTS_SUBDIR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_SUBDIR)
    }
}

/// Scratch directory owned by the provisioner's caller.
#[derive(Debug)]
pub enum ScratchDir {
    /// Fresh directory removed (best effort) when dropped.
    Temporary(TempDir),
    /// Configured directory that outlives the process.
    Fixed(PathBuf),
}

impl ScratchDir {
    pub fn temporary() -> Result<Self, ProvisionError> {
        tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map(Self::Temporary)
            .map_err(|source| ProvisionError::ScratchDir {
                path: std::env::temp_dir(),
                source,
            })
    }

    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self::Fixed(path.into())
    }

    /// Temporary directory unless `path` is configured.
    pub fn from_settings(path: Option<&Path>) -> Result<Self, ProvisionError> {
        match path {
            Some(path) => Ok(Self::fixed(path)),
            None => Self::temporary(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

/// Outcome of a provisioning pass.
#[derive(Debug)]
pub struct Provisioned {
    /// Keeps a temporary scratch directory alive; drop it on shutdown.
    pub scratch: ScratchDir,
    pub paths: ScriptPaths,
    /// Script ids that could not be provisioned, with the reason.
    pub disabled: Vec<(String, ProvisionError)>,
    pub assets_copied: usize,
    pub assets_skipped: usize,
}

/// Copies bundled scripts and assets into a scratch directory.
pub struct Provisioner<B> {
    bundle: B,
    script_ids: Vec<&'static str>,
}

impl<B: ResourceBundle> Provisioner<B> {
    /// Provisioner for every script in the registry.
    pub fn new(bundle: B) -> Self {
        Self {
            bundle,
            script_ids: SCRIPT_REGISTRY.iter().map(|d| d.script_id).collect(),
        }
    }

    /// Provisioner for an explicit set of script ids.
    pub fn with_scripts(bundle: B, script_ids: Vec<&'static str>) -> Self {
        Self { bundle, script_ids }
    }

    /// Extract every script and asset into `scratch`.
    ///
    /// Only failing to create the scratch layout is fatal. A script that
    /// cannot be extracted is left out of the returned paths (its operation
    /// is disabled); an asset that cannot be extracted is skipped.
    pub async fn provision(&self, scratch: ScratchDir) -> Result<Provisioned, ProvisionError> {
        let root = absolute(scratch.path())?;
        let scripts_dir = root.join(SCRIPTS_SUBDIR);
        let data_dir = root.join(DATA_SUBDIR);

        for dir in [&scripts_dir, &data_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ProvisionError::ScratchDir {
                    path: dir.clone(),
                    source,
                })?;
        }

        tracing::info!(scratch = %root.display(), "Provisioning analysis scripts");

        let mut paths = ScriptPaths::new(&root);
        let mut disabled = Vec::new();

        for &script_id in &self.script_ids {
            let target = scripts_dir.join(script_file_name(script_id));
            match self.provision_script(script_id, &target).await {
                Ok(()) => {
                    tracing::debug!(script = script_id, path = %target.display(), "Script provisioned");
                    paths.insert(script_id, target);
                }
                Err(e) => {
                    tracing::error!(script = script_id, error = %e, "Script unavailable, disabling its operation");
                    // Never leave a stale copy from an earlier pass behind.
                    let _ = tokio::fs::remove_file(&target).await;
                    disabled.push((script_id.to_string(), e));
                }
            }
        }

        let (assets_copied, assets_skipped) = self.provision_assets(&data_dir).await;

        tracing::info!(
            scripts = paths.len(),
            disabled = disabled.len(),
            assets_copied,
            assets_skipped,
            "Provisioning complete",
        );

        Ok(Provisioned {
            scratch,
            paths,
            disabled,
            assets_copied,
            assets_skipped,
        })
    }

    async fn provision_script(&self, script_id: &str, target: &Path) -> Result<(), ProvisionError> {
        let contents = self
            .bundle
            .read_script(script_id)
            .await
            .map_err(|source| ProvisionError::Read {
                name: script_file_name(script_id),
                source,
            })?;
        write_replacing(target, &contents, true).await
    }

    /// Returns `(copied, skipped)`.
    async fn provision_assets(&self, data_dir: &Path) -> (usize, usize) {
        let assets = match self.bundle.list_assets().await {
            Ok(assets) => assets,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list auxiliary data; scripts will use fallback data");
                return (0, 0);
            }
        };

        let mut copied = 0;
        let mut skipped = 0;
        for asset in assets {
            match self.provision_asset(&asset, data_dir).await {
                Ok(()) => copied += 1,
                Err(e) => {
                    tracing::warn!(asset = %asset, error = %e, "Skipping auxiliary data file");
                    skipped += 1;
                }
            }
        }
        (copied, skipped)
    }

    async fn provision_asset(&self, asset: &str, data_dir: &Path) -> Result<(), ProvisionError> {
        let relative = safe_relative_path(asset)?;
        let contents = self
            .bundle
            .read_asset(asset)
            .await
            .map_err(|source| ProvisionError::Read {
                name: asset.to_string(),
                source,
            })?;
        let target = data_dir.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ProvisionError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        write_replacing(&target, &contents, false).await
    }
}

/// Reject absolute paths and `..` so assets stay inside the data directory.
fn safe_relative_path(asset: &str) -> Result<PathBuf, ProvisionError> {
    let path = Path::new(asset);
    let safe = !asset.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(path.to_path_buf())
    } else {
        Err(ProvisionError::UnsafeAssetPath(asset.to_string()))
    }
}

fn absolute(path: &Path) -> Result<PathBuf, ProvisionError> {
    std::path::absolute(path).map_err(|source| ProvisionError::ScratchDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `contents` to `target` through a sibling staging file and rename,
/// so a reader never sees a partial file and re-provisioning overwrites in
/// place.
async fn write_replacing(target: &Path, contents: &[u8], executable: bool) -> Result<(), ProvisionError> {
    let write_err = |source: io::Error| ProvisionError::Write {
        path: target.to_path_buf(),
        source,
    };

    let mut staging_name = target.file_name().unwrap_or_default().to_os_string();
    staging_name.push(".partial");
    let staging = target.with_file_name(staging_name);

    tokio::fs::write(&staging, contents).await.map_err(write_err)?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&staging, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    if let Err(e) = tokio::fs::rename(&staging, target).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(write_err(e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

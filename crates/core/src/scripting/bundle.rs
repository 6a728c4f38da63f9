//! Bundled script resources.
//!
//! A [`ResourceBundle`] is wherever scripts live before provisioning: compiled
//! into the binary ([`EmbeddedBundle`]) or an on-disk registry directory
//! ([`DirectoryBundle`]). Both expose scripts by id and auxiliary data assets
//! by relative path.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use super::provision::{DATA_SUBDIR, SCRIPTS_SUBDIR};
use super::registry::script_file_name;

/// Source of scripts and auxiliary data files.
pub trait ResourceBundle: Send + Sync {
    /// Contents of the script `script_id`.
    fn read_script(&self, script_id: &str)
        -> impl Future<Output = io::Result<Vec<u8>>> + Send;

    /// Relative paths (using `/`) of every auxiliary data asset.
    fn list_assets(&self) -> impl Future<Output = io::Result<Vec<String>>> + Send;

    /// Contents of the asset at `relative_path`.
    fn read_asset(&self, relative_path: &str)
        -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

// ---------------------------------------------------------------------------
// Embedded bundle
// ---------------------------------------------------------------------------

const EMBEDDED_SCRIPTS: &[(&str, &[u8])] = &[
    (
        "technical_analyzer",
        include_bytes!("../../resources/python-scripts/technical_analyzer.py"),
    ),
    (
        "fundamental_analyzer",
        include_bytes!("../../resources/python-scripts/fundamental_analyzer.py"),
    ),
    (
        "sentiment_analyzer",
        include_bytes!("../../resources/python-scripts/sentiment_analyzer.py"),
    ),
    (
        "signal_generator",
        include_bytes!("../../resources/python-scripts/signal_generator.py"),
    ),
    (
        "stock_overview",
        include_bytes!("../../resources/python-scripts/stock_overview.py"),
    ),
];

const EMBEDDED_ASSETS: &[(&str, &[u8])] = &[
    (
        "FundamentalData/company_overview_IBM.json",
        include_bytes!("../../resources/data/FundamentalData/company_overview_IBM.json"),
    ),
    (
        "TechnicalAnalysis/daily_adjusted_IBM.json",
        include_bytes!("../../resources/data/TechnicalAnalysis/daily_adjusted_IBM.json"),
    ),
    (
        "SentimentData/news_sentiment_IBM.json",
        include_bytes!("../../resources/data/SentimentData/news_sentiment_IBM.json"),
    ),
];

/// Scripts and data compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBundle;

fn lookup(table: &[(&str, &'static [u8])], key: &str, what: &str) -> io::Result<Vec<u8>> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, bytes)| bytes.to_vec())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{what} '{key}' is not embedded"),
            )
        })
}

impl ResourceBundle for EmbeddedBundle {
    async fn read_script(&self, script_id: &str) -> io::Result<Vec<u8>> {
        lookup(EMBEDDED_SCRIPTS, script_id, "script")
    }

    async fn list_assets(&self) -> io::Result<Vec<String>> {
        Ok(EMBEDDED_ASSETS
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect())
    }

    async fn read_asset(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        lookup(EMBEDDED_ASSETS, relative_path, "asset")
    }
}

// ---------------------------------------------------------------------------
// Directory bundle
// ---------------------------------------------------------------------------

/// Scripts read from `<base>/python-scripts`, assets from `<base>/data`.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    base: PathBuf,
}

impl DirectoryBundle {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl ResourceBundle for DirectoryBundle {
    async fn read_script(&self, script_id: &str) -> io::Result<Vec<u8>> {
        let path = self
            .base
            .join(SCRIPTS_SUBDIR)
            .join(script_file_name(script_id));
        tokio::fs::read(path).await
    }

    async fn list_assets(&self) -> io::Result<Vec<String>> {
        let root = self.base.join(DATA_SUBDIR);
        if !tokio::fs::try_exists(&root).await? {
            return Ok(Vec::new());
        }

        let mut assets = Vec::new();
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(&root) {
                        assets.push(to_slash_path(relative));
                    }
                }
            }
        }
        assets.sort();
        Ok(assets)
    }

    async fn read_asset(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.base.join(DATA_SUBDIR).join(relative_path)).await
    }
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Runtime selection
// ---------------------------------------------------------------------------

/// Bundle chosen from configuration at startup.
#[derive(Debug, Clone)]
pub enum BundleSource {
    Embedded(EmbeddedBundle),
    Directory(DirectoryBundle),
}

impl BundleSource {
    /// Directory bundle when a registry path is configured, embedded otherwise.
    pub fn from_settings(scripts_path: Option<&Path>) -> Self {
        match scripts_path {
            Some(path) => Self::Directory(DirectoryBundle::new(path)),
            None => Self::Embedded(EmbeddedBundle),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Embedded(_) => "embedded".to_string(),
            Self::Directory(dir) => dir.base().display().to_string(),
        }
    }
}

impl ResourceBundle for BundleSource {
    async fn read_script(&self, script_id: &str) -> io::Result<Vec<u8>> {
        match self {
            Self::Embedded(b) => b.read_script(script_id).await,
            Self::Directory(b) => b.read_script(script_id).await,
        }
    }

    async fn list_assets(&self) -> io::Result<Vec<String>> {
        match self {
            Self::Embedded(b) => b.list_assets().await,
            Self::Directory(b) => b.list_assets().await,
        }
    }

    async fn read_asset(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        match self {
            Self::Embedded(b) => b.read_asset(relative_path).await,
            Self::Directory(b) => b.read_asset(relative_path).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::registry::SCRIPT_REGISTRY;

    #[tokio::test]
    async fn embedded_bundle_contains_every_registered_script() {
        for descriptor in SCRIPT_REGISTRY {
            let bytes = EmbeddedBundle
                .read_script(descriptor.script_id)
                .await
                .expect("embedded script");
            assert!(!bytes.is_empty(), "{} is empty", descriptor.script_id);
        }
    }

    #[tokio::test]
    async fn embedded_assets_are_valid_json() {
        let assets = EmbeddedBundle.list_assets().await.expect("list");
        assert!(!assets.is_empty());
        for asset in assets {
            let bytes = EmbeddedBundle.read_asset(&asset).await.expect("read");
            serde_json::from_slice::<serde_json::Value>(&bytes)
                .unwrap_or_else(|e| panic!("{asset} is not JSON: {e}"));
        }
    }

    #[tokio::test]
    async fn embedded_unknown_script_is_not_found() {
        let err = EmbeddedBundle.read_script("nope").await.expect_err("missing");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn directory_bundle_lists_nested_assets() {
        let dir = tempfile::tempdir().expect("temp dir");
        let data = dir.path().join(DATA_SUBDIR);
        std::fs::create_dir_all(data.join("FundamentalData")).unwrap();
        std::fs::write(data.join("FundamentalData/overview.json"), b"{}").unwrap();
        std::fs::write(data.join("readme.txt"), b"hi").unwrap();

        let bundle = DirectoryBundle::new(dir.path());
        let assets = bundle.list_assets().await.expect("list");
        assert_eq!(assets, vec!["FundamentalData/overview.json", "readme.txt"]);
        assert_eq!(bundle.read_asset("readme.txt").await.unwrap(), b"hi");
    }

    #[tokio::test]
    async fn directory_bundle_without_data_dir_has_no_assets() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bundle = DirectoryBundle::new(dir.path());
        assert!(bundle.list_assets().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn directory_bundle_reads_scripts_by_id() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(SCRIPTS_SUBDIR)).unwrap();
        std::fs::write(
            dir.path().join(SCRIPTS_SUBDIR).join("technical_analyzer.py"),
            b"print('{}')",
        )
        .unwrap();
        let bundle = BundleSource::from_settings(Some(dir.path()));
        assert_eq!(
            bundle.read_script("technical_analyzer").await.unwrap(),
            b"print('{}')"
        );
    }
}

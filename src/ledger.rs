//! Record of installed packages.
//!
//! The ledger is a single JSON document mapping a package key to the files
//! that were installed for it. Every operation loads the document, applies
//! one change and writes the whole thing back.

use crate::config::get_ledger_path;
use crate::types::PackageRecord;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub type Packages = BTreeMap<String, PackageRecord>;

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Use the ledger document at `path`. Nothing is read or created yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::open(get_ledger_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Packages> {
        if !self.path.exists() {
            return Ok(Packages::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read ledger at {}", self.path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Could not parse ledger {} as JSON", self.path.display()))
    }

    fn store(&self, packages: &Packages) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid ledger path {}", self.path.display()))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create ledger directory {}", dir.display()))?;

        let content = serde_json::to_string_pretty(packages)?;

        // Write next to the ledger, then swap it in.
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("Could not create temporary file in {}", dir.display()))?;
        staged.write_all(content.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.as_file().sync_all()?;
        staged
            .persist(&self.path)
            .with_context(|| format!("Could not write ledger {}", self.path.display()))?;

        tracing::debug!("Saved {} package(s) to {}", packages.len(), self.path.display());
        Ok(())
    }

    /// Insert or wholesale replace the record for `key`.
    pub fn upsert(&self, key: &str, record: PackageRecord) -> Result<()> {
        let mut packages = self.load()?;
        if packages.insert(key.to_string(), record).is_some() {
            tracing::debug!("Replaced existing ledger entry for {}", key);
        }
        self.store(&packages)
    }

    pub fn lookup(&self, key: &str) -> Result<Option<PackageRecord>> {
        Ok(self.load()?.remove(key))
    }

    pub fn list_all(&self) -> Result<Packages> {
        self.load()
    }

    /// Forget `key`. The recorded files must already have been removed.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut packages = self.load()?;
        if packages.remove(key).is_none() {
            tracing::debug!("No ledger entry for {}, nothing to delete", key);
            return Ok(());
        }
        self.store(&packages)
    }
}

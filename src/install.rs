use crate::config::{contract_path, get_cache_dir};
use crate::download::{download_file, extract_archive, package_root};
use crate::github::get_release;
use crate::ledger::Ledger;
use crate::package_id::{candidate_keys, local_package_key, RepoSlug};
use crate::select::select_asset;
use crate::stow::stow;
use crate::types::*;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub package: String,
    pub prefix: PathBuf,
    pub release: String,
    pub local: bool,
    pub dry_run: bool,
}

/// What an install did, or would have done in a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub key: String,
    pub files: Vec<PathBuf>,
}

fn stow_into_prefix(src: &Path, prefix: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    stow(src, prefix, dry_run).map_err(|e| {
        tracing::debug!("Stow failed at {}", e.path().display());
        if !e.relocated().is_empty() {
            tracing::warn!(
                "Install stopped after moving {} file(s) into {}; they are not recorded:",
                e.relocated().len(),
                prefix.display()
            );
            for file in e.relocated() {
                tracing::warn!("  {}", file.display());
            }
        }
        anyhow!(e).context(format!(
            "Could not stow {} into {}",
            src.display(),
            prefix.display()
        ))
    })
}

fn report(outcome: &InstallOutcome, prefix: &Path, dry_run: bool) {
    for file in &outcome.files {
        if dry_run {
            println!("would install: {}", file.display());
        } else {
            tracing::info!("installed: {}", file.display());
        }
    }
    println!(
        "tuck {} {} files from '{}' into '{}'",
        if dry_run { "would install" } else { "installed" },
        outcome.files.len(),
        contract_path(Path::new(&outcome.key)),
        contract_path(prefix)
    );
}

pub async fn install_package(
    ledger: &Ledger,
    config: &TuckConfig,
    options: &InstallOptions,
) -> Result<InstallOutcome> {
    tracing::debug!("install: {:?}", options);

    let outcome = if options.local {
        install_local(ledger, options)?
    } else {
        install_remote(ledger, config, options).await?
    };

    report(&outcome, &options.prefix, options.dry_run);
    Ok(outcome)
}

/// Stow a directory on this machine. The directory is consumed.
pub fn install_local(ledger: &Ledger, options: &InstallOptions) -> Result<InstallOutcome> {
    let path = local_package_key(Path::new(&options.package))?;
    if !path.is_dir() {
        bail!("Local package is not a directory: {}", path.display());
    }
    let key = path.to_string_lossy().to_string();

    if ledger.lookup(&key)?.is_some() {
        bail!("Package already installed: '{}'", key);
    }

    let files = stow_into_prefix(&path, &options.prefix, options.dry_run)?;

    if !options.dry_run {
        ledger.upsert(
            &key,
            PackageRecord {
                prefix: options.prefix.clone(),
                release: String::new(),
                origin: Origin::Local,
                files: files.clone(),
            },
        )?;
    }

    Ok(InstallOutcome { key, files })
}

/// Download, unpack and stow a GitHub release asset.
pub async fn install_remote(
    ledger: &Ledger,
    config: &TuckConfig,
    options: &InstallOptions,
) -> Result<InstallOutcome> {
    let slug = RepoSlug::parse(&options.package)?;
    let key = slug.to_string();

    let release = get_release(&slug, &options.release).await?;
    let asset = select_asset(&release.assets, &config.filters)
        .with_context(|| format!("Could not pick an asset from {} {}", key, release.tag_name))?;

    // Scratch space for this install only; removed when dropped.
    let staging = TempDir::new_in(get_cache_dir()?)?;
    let asset_file_name = Path::new(&asset.name)
        .file_name()
        .ok_or_else(|| anyhow!("Invalid asset name '{}'", asset.name))?;
    let archive_path = staging.path().join(asset_file_name);
    let extract_dir = staging.path().join("extract");
    fs::create_dir_all(&extract_dir)?;

    download_file(&asset.download_url, &archive_path).await?;
    extract_archive(&archive_path, &extract_dir)?;
    fs::remove_file(&archive_path)?;

    let root = package_root(&extract_dir)?;
    let files = stow_into_prefix(&root, &options.prefix, options.dry_run)?;

    if !options.dry_run {
        if let Some(previous) = ledger.lookup(&key)? {
            tracing::warn!(
                "Replacing existing record for {} (release {}, {} file(s))",
                key,
                previous.release,
                previous.files.len()
            );
        }
        ledger.upsert(
            &key,
            PackageRecord {
                prefix: options.prefix.clone(),
                release: release.tag_name.clone(),
                origin: Origin::Remote,
                files: files.clone(),
            },
        )?;
    }

    Ok(InstallOutcome { key, files })
}

/// Delete every file recorded for `package` and forget it.
pub fn remove_package(ledger: &Ledger, package: &str) -> Result<PackageRecord> {
    tracing::info!("remove: {}", package);

    let mut found = None;
    for key in candidate_keys(package) {
        if let Some(record) = ledger.lookup(&key)? {
            found = Some((key, record));
            break;
        }
    }
    let Some((key, record)) = found else {
        bail!("Package not installed: '{}'", package);
    };

    for file in &record.files {
        match fs::remove_file(file) {
            Ok(()) => tracing::info!("removed: {}", file.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("Already gone: {}", file.display())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not remove {}", file.display()))
            }
        }
    }
    ledger.delete(&key)?;

    println!(
        "tuck removed {} files from '{}' out of '{}'",
        record.files.len(),
        contract_path(Path::new(&key)),
        contract_path(&record.prefix)
    );
    Ok(record)
}

/// Print the ledger. `show_files` adds every recorded file under its package.
pub fn list_installed_packages(ledger: &Ledger, quiet: bool, show_files: bool) -> Result<()> {
    let packages = ledger.list_all()?;

    if !quiet {
        println!("{} packages are installed", packages.len());
    }
    for (key, record) in &packages {
        if quiet {
            println!("{}", key);
        } else {
            let release = match record.origin {
                Origin::Local => "local",
                Origin::Remote if record.release.is_empty() => "latest",
                Origin::Remote => record.release.as_str(),
            };
            println!(
                "  - {} ({}) {} file(s) in {}",
                contract_path(Path::new(key)),
                release,
                record.files.len(),
                contract_path(&record.prefix)
            );
        }
        if show_files {
            for file in &record.files {
                println!("      {}", file.display());
            }
        }
    }
    Ok(())
}

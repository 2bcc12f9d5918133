use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::Archive;

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn download_file(url: &str, local_path: &Path) -> Result<()> {
    let filename = file_label(local_path);
    tracing::info!("Downloading {}...", filename);

    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "Error downloading '{}': {}",
            url,
            response.status()
        ));
    }
    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut file = fs::File::create(local_path)
        .with_context(|| format!("Could not create {}", local_path.display()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    pb.finish_with_message("Download complete");
    tracing::debug!("{} bytes written to {}", downloaded, local_path.display());
    Ok(())
}

/// Unpack `archive_path` into `extract_dir`.
pub fn extract_archive(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    tracing::info!("Extracting {}...", file_label(archive_path));

    let name = archive_path.to_string_lossy().to_lowercase();
    let result = if name.ends_with(".zip") {
        extract_zip(archive_path, extract_dir)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let file = fs::File::open(archive_path)?;
        unpack_tar(Archive::new(GzDecoder::new(file)), extract_dir)
    } else if name.ends_with(".tar.xz") {
        let file = fs::File::open(archive_path)?;
        unpack_tar(Archive::new(xz2::read::XzDecoder::new(file)), extract_dir)
    } else if name.ends_with(".tar.bz2") {
        extract_with_tar_command("xjf", archive_path, extract_dir)
    } else {
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path.display()
        ))
    };
    result.with_context(|| format!("Extracting '{}' failed", archive_path.display()))
}

fn unpack_tar<R: io::Read>(mut archive: Archive<R>, extract_dir: &Path) -> Result<()> {
    archive.unpack(extract_dir)?;
    Ok(())
}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name().map(Path::to_path_buf) else {
            tracing::warn!("Skipping malicious path in zip: {}", file.name());
            continue;
        };
        let outpath = extract_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut file, &mut outfile)?;

        // Keep the executable bits; stow relies on them.
        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o777))?;
        }
    }

    Ok(())
}

// bzip2 is rare enough that shelling out beats another native dependency.
fn extract_with_tar_command(flags: &str, archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let output = Command::new("tar")
        .arg(flags)
        .arg(archive_path)
        .arg("-C")
        .arg(extract_dir)
        .output()
        .context("Could not run tar")?;

    if !output.status.success() {
        return Err(anyhow!(
            "tar exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

/// The directory to stow from an extracted archive.
///
/// Most release archives wrap everything in a single top-level directory
/// (`tool-1.0-x86_64/...`); others are flat.
pub fn package_root(extract_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(extract_dir)
        .with_context(|| format!("Could not read {}", extract_dir.display()))?
        .collect::<io::Result<Vec<_>>>()?;

    if let [only] = entries.as_slice() {
        if only.file_type()?.is_dir() {
            tracing::debug!("Archive has a single root directory {}", only.path().display());
            return Ok(only.path());
        }
    }
    Ok(extract_dir.to_path_buf())
}

use crate::types::FilterSet;
use anyhow::{anyhow, Result};

const ARCHIVE_PATTERN: &str = r"(\.tar\.(gz|bz2|xz)|\.zip)$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
}

pub fn get_system_info() -> PlatformInfo {
    PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    }
}

/// The spellings release authors use for an architecture.
pub fn arch_filter(arch: &str) -> Result<String> {
    match arch {
        "x86_64" | "amd64" => Ok("(amd64|x86-64|x86_64)".to_string()),
        "aarch64" | "arm64" => Ok("(arm64|aarch64)".to_string()),
        _ => Err(anyhow!("Unsupported architecture: {}", arch)),
    }
}

/// Asset filters for the given platform.
///
/// OS and archive type are required. The architecture is only preferred,
/// since many projects ship a single universal or arch-less archive.
pub fn filters_for(platform: &PlatformInfo) -> Result<FilterSet> {
    let arch = arch_filter(&platform.arch)?;
    let (required, optional) = match platform.os.as_str() {
        "linux" => (
            vec!["linux".to_string(), ARCHIVE_PATTERN.to_string()],
            vec![arch, "musl".to_string()],
        ),
        "macos" => (
            vec!["(mac|macos|darwin)".to_string(), ARCHIVE_PATTERN.to_string()],
            vec![arch],
        ),
        "windows" => (
            vec!["(windows|win64|win32)".to_string(), r"\.zip$".to_string()],
            vec![arch],
        ),
        os => return Err(anyhow!("Unsupported operating system: {}", os)),
    };
    Ok(FilterSet { required, optional })
}

pub fn default_filters() -> Result<FilterSet> {
    let platform = get_system_info();
    tracing::debug!("Detected platform {}/{}", platform.os, platform.arch);
    filters_for(&platform)
}

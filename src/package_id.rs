use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageIdError {
    #[error("Package identifier cannot be empty")]
    Empty,
    #[error("Invalid package identifier '{0}'. It looks like a CLI flag.")]
    LooksLikeFlag(String),
    #[error("Invalid repository '{0}', expected 'owner/repo' or a GitHub URL")]
    InvalidRepo(String),
    #[error("Local package does not exist: {}", .0.display())]
    MissingLocal(PathBuf),
    #[error("Could not resolve local package path {}: {reason}", .path.display())]
    UnresolvableLocal { path: PathBuf, reason: String },
}

/// A GitHub repository slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse from one of:
    /// - "owner/repo"
    /// - "github.com/owner/repo"
    /// - "https://github.com/owner/repo" (any trailing path, `.git` suffix)
    pub fn parse(package: &str) -> Result<Self, PackageIdError> {
        let package = package.trim();
        if package.is_empty() {
            return Err(PackageIdError::Empty);
        }
        if package.starts_with('-') {
            return Err(PackageIdError::LooksLikeFlag(package.to_string()));
        }

        let without_scheme = package
            .strip_prefix("https://")
            .or_else(|| package.strip_prefix("http://"))
            .unwrap_or(package);
        let is_url = without_scheme.len() != package.len();

        let path = match without_scheme.strip_prefix("github.com/") {
            Some(rest) => rest,
            None if is_url => return Err(PackageIdError::InvalidRepo(package.to_string())),
            None => without_scheme,
        };

        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let (owner, repo) = match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) => (owner, repo.trim_end_matches(".git")),
            _ => return Err(PackageIdError::InvalidRepo(package.to_string())),
        };

        // A bare slug must be exactly two segments; URLs may carry more.
        if parts.next().is_some() && path.len() == without_scheme.len() {
            return Err(PackageIdError::InvalidRepo(package.to_string()));
        }
        if repo.is_empty() {
            return Err(PackageIdError::InvalidRepo(package.to_string()));
        }

        Ok(RepoSlug {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Canonical absolute path of a local package directory.
pub fn local_package_key(package: &Path) -> Result<PathBuf, PackageIdError> {
    if package.as_os_str().is_empty() {
        return Err(PackageIdError::Empty);
    }
    if !package.exists() {
        return Err(PackageIdError::MissingLocal(package.to_path_buf()));
    }
    package
        .canonicalize()
        .map_err(|e| PackageIdError::UnresolvableLocal {
            path: package.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Ledger keys a user might mean by `package`, most specific first.
pub fn candidate_keys(package: &str) -> Vec<String> {
    let mut keys = vec![package.to_string()];
    let mut push = |key: String| {
        if !keys.contains(&key) {
            keys.push(key);
        }
    };

    if let Ok(slug) = RepoSlug::parse(package) {
        push(slug.to_string());
    }
    let path = Path::new(package);
    if let Ok(canonical) = path.canonicalize() {
        push(canonical.to_string_lossy().to_string());
    }
    if let Ok(absolute) = std::path::absolute(path) {
        push(absolute.to_string_lossy().to_string());
    }
    keys
}

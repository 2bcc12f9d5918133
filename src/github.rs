//! GitHub release lookup.

use crate::package_id::RepoSlug;
use crate::types::{GitHubRelease, Release};
use anyhow::Result;
use reqwest::StatusCode;
use thiserror::Error;

const API_ROOT: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum GitHubReleaseError {
    #[error("Release tag '{version}' not found in {repo}")]
    TagNotFound { repo: String, version: String },
    #[error("No releases found for {repo}")]
    LatestNotFound { repo: String },
    #[error("Failed to get release info for {repo}: {status}")]
    RequestFailed { repo: String, status: StatusCode },
}

/// Build the API URL for a release.
///
/// `release` is "latest" (or empty) for the most recent release, otherwise a
/// tag name.
pub fn build_release_url(api_root: &str, repo: &RepoSlug, release: &str) -> String {
    if release.is_empty() || release == "latest" {
        format!("{}/repos/{}/releases/latest", api_root, repo)
    } else {
        format!("{}/repos/{}/releases/tags/{}", api_root, repo, release)
    }
}

fn api_token() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|token| !token.is_empty()))
}

pub async fn get_release(repo: &RepoSlug, release: &str) -> Result<Release> {
    let api_root = std::env::var("TUCK_GITHUB_API").unwrap_or_else(|_| API_ROOT.to_string());
    let url = build_release_url(api_root.trim_end_matches('/'), repo, release);
    tracing::debug!("Fetching GitHub release info from: {}", url);

    let client = reqwest::Client::new();
    let mut request = client
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", concat!("tuck/", env!("CARGO_PKG_VERSION")));

    if let Some(token) = api_token() {
        request = request.bearer_auth(token);
        tracing::debug!("Using GitHub token from environment");
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let repo = repo.to_string();
        return Err(match status {
            StatusCode::NOT_FOUND if release.is_empty() || release == "latest" => {
                GitHubReleaseError::LatestNotFound { repo }
            }
            StatusCode::NOT_FOUND => GitHubReleaseError::TagNotFound {
                repo,
                version: release.to_string(),
            },
            status => GitHubReleaseError::RequestFailed { repo, status },
        }
        .into());
    }

    let release: GitHubRelease = response.json().await?;
    tracing::info!(
        "Found release {} with {} asset(s)",
        release.tag_name,
        release.assets.len()
    );
    Ok(release.into())
}

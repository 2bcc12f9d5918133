//! Release asset selection.
//!
//! Picks exactly one asset out of a release using the configured filters, or
//! explains why it could not.

use crate::types::{FilterSet, ReleaseAsset};
use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("invalid asset filter '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no assets found matching the required filters {required:?}")]
    NoMatch { required: Vec<String> },

    #[error(
        "multiple assets matched the required filters but none matched the optional filters:{}",
        NameList(.candidates)
    )]
    AmbiguousNoOptionalMatch { candidates: Vec<String> },

    #[error(
        "multiple assets matched both the required and optional filters equally well:{}",
        NameList(.candidates)
    )]
    AmbiguousTie { candidates: Vec<String> },
}

struct NameList<'a>(&'a [String]);

impl fmt::Display for NameList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.0 {
            write!(f, "\n  {}", name)?;
        }
        Ok(())
    }
}

struct CandidateMatch<'a> {
    asset: &'a ReleaseAsset,
    match_count: usize,
    rank: usize,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, SelectError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| SelectError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn sorted_names<'a>(assets: impl IntoIterator<Item = &'a ReleaseAsset>) -> Vec<String> {
    let mut names: Vec<String> = assets.into_iter().map(|asset| asset.name.clone()).collect();
    names.sort();
    names
}

/// Select the single best asset for `filters`.
///
/// Assets must match every required pattern. Among several survivors the one
/// matching the most optional patterns wins, then the one whose first match
/// has the highest priority. Anything left undecided is an error.
pub fn select_asset(
    assets: &[ReleaseAsset],
    filters: &FilterSet,
) -> Result<ReleaseAsset, SelectError> {
    let required = compile(&filters.required)?;
    let optional = compile(&filters.optional)?;

    let candidates: Vec<&ReleaseAsset> = assets
        .iter()
        .filter(|asset| required.iter().all(|re| re.is_match(&asset.name)))
        .collect();

    tracing::info!(
        "Found {} candidate(s) matching required filters",
        candidates.len()
    );
    for candidate in &candidates {
        tracing::debug!("  {}", candidate.name);
    }

    let selected = match candidates.as_slice() {
        [] => {
            return Err(SelectError::NoMatch {
                required: filters.required.clone(),
            })
        }
        [only] => *only,
        _ => break_tie(&candidates, &optional)?,
    };

    tracing::info!("Selected release asset: {}", selected.name);
    Ok(selected.clone())
}

fn break_tie<'a>(
    candidates: &[&'a ReleaseAsset],
    optional: &[Regex],
) -> Result<&'a ReleaseAsset, SelectError> {
    let mut matches: Vec<CandidateMatch<'a>> = candidates
        .iter()
        .filter_map(|&asset| {
            let hits: Vec<usize> = optional
                .iter()
                .enumerate()
                .filter(|(_, re)| re.is_match(&asset.name))
                .map(|(index, _)| index)
                .collect();
            tracing::trace!("Asset '{}': optional hits {:?}", asset.name, hits);
            hits.first().map(|&rank| CandidateMatch {
                asset,
                match_count: hits.len(),
                rank,
            })
        })
        .collect();

    if matches.is_empty() {
        return Err(SelectError::AmbiguousNoOptionalMatch {
            candidates: sorted_names(candidates.iter().copied()),
        });
    }

    let best_count = matches.iter().map(|m| m.match_count).max().unwrap_or(0);
    matches.retain(|m| m.match_count == best_count);

    let best_rank = matches.iter().map(|m| m.rank).min().unwrap_or(0);
    matches.retain(|m| m.rank == best_rank);

    match matches.as_slice() {
        [winner] => Ok(winner.asset),
        tied => Err(SelectError::AmbiguousTie {
            candidates: sorted_names(tied.iter().map(|m| m.asset)),
        }),
    }
}

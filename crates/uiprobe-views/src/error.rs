//! Typed failure reasons for a fetch.
//!
//! The fetcher never signals failure through logs alone: callers branch on
//! the variant. "No UI currently available" is a value here, distinct from a
//! successful fetch that found an empty-but-present tree.

use thiserror::Error;

/// Why a fetch produced no view list.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The platform's window-surface registry could not be read. Carries the
    /// underlying reflective/platform error for diagnostics.
    #[error("window surface registry is unavailable: {0}")]
    Registry(#[source] anyhow::Error),

    /// No activity is currently foregrounded, so the decor-selection
    /// heuristic has nothing to compare surfaces against.
    #[error("no activity is currently foregrounded")]
    NoForegroundActivity,

    /// The platform reports no displayed surfaces at all.
    #[error("no decor view is currently displayed")]
    NoActiveSurface,
}

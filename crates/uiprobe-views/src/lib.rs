//! View-tree introspection for UI test automation.
//!
//! [`ViewFetcher`] resolves the active decorator surface from the platform's
//! window registry, flattens its view hierarchy depth-first, and offers
//! filtered views over the result. It is driven by a single test thread and
//! is best-effort throughout: platform failures become typed errors, never
//! panics — except the one deliberate assertion in [`ViewFetcher::view`].

pub mod error;
pub mod fetcher;

#[cfg(target_os = "android")]
pub mod android;

pub use error::FetchError;
pub use fetcher::{FetcherConfig, ViewFetcher};

pub use uiprobe_core::{
    Activity, ActivityHandle, ActivityLifecycleSource, NodeHandle, UiNode, UiSynchronizer,
    WindowSurfaceRegistry,
};

//! Core node model and collaborator traits for uiprobe.
//!
//! The view tree itself is owned by the host UI platform; this crate only
//! defines the read-side surface the fetcher walks: [`UiNode`] handles with
//! weak parent back-pointers, plus the traits through which the platform's
//! activity state and event-queue idleness are observed.

pub mod activity;
pub mod node;
pub mod registry;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use activity::{Activity, ActivityHandle, ActivityLifecycleSource, UiSynchronizer};
pub use node::{NodeHandle, UiNode};
pub use registry::WindowSurfaceRegistry;

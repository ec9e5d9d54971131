//! Smoother Common Library
//!
//! Shared types and configuration for the velocity smoother workspace.
//!
//! # Module Structure
//!
//! - [`twist`] - Velocity triples and stamped samples
//! - [`smoother`] - Parameter surface, validated snapshots and loop states
//! - [`config`] - Configuration loading traits and error types
//! - [`consts`] - Default parameter values
//! - [`prelude`] - Common re-exports for convenience
//!
//! ```rust
//! use smoother_common::prelude::*;
//!
//! let live = LiveConfig::new(SmootherConfig::default()).unwrap();
//! assert_eq!(live.feedback(), FeedbackMode::OpenLoop);
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod smoother;
pub mod twist;

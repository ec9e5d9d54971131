//! Velocity smoother shared types.
//!
//! Configuration surface, validated live snapshots and loop states used by
//! the `velocity_smoother` crate and by tools that drive it.

pub mod config;
pub mod state;

//! # Velocity Smoother Library
//!
//! Fixed-rate smoothing of mobile-base velocity commands (x, y, angular).
//! Each tick takes the latest requested command and a current-velocity
//! estimate and produces one kinematically feasible output sample.
//!
//! ## Pipeline
//!
//! 1. **ingest** : latest-value-wins command slot, non-finite input dropped
//! 2. **feedback** : open-loop (own last output) or closed-loop (odometry mean)
//! 3. **solver** : cross-axis eta scaling with per-axis accel/decel bounds
//! 4. **cycle** : staleness timeout, stop latch, deadband, tick statistics
//! 5. **runner** : timer thread, thread-safe handle, live reconfiguration
//!
//! ## Allocation
//!
//! The tick path does not allocate: the odometry window is a fixed-capacity
//! `heapless::Deque` and the configuration is an `Arc` snapshot swapped
//! whole on reconfiguration.

pub mod clock;
pub mod config;
pub mod cycle;
pub mod feedback;
pub mod ingest;
pub mod runner;
pub mod solver;

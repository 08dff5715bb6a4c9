//! Deterministic synthetic benchmark for dual-estimator VO fusion.
//!
//! This library exposes the configuration, scene, synthetic estimator,
//! runner, and output modules used by the `dualvo-bench` CLI binary.

pub mod config;
pub mod io;
pub mod runner;
pub mod scene;
pub mod synthetic;

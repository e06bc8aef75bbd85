//! GenSpec Experiment: drives a spawned GenSpec network with generated input.
//!
//! This crate:
//! - Generates seeded random input grids with a chosen density
//! - Presents them to a network one at a time, waiting for quiescence
//! - Collects generalization factors, win counts and accumulator tallies

pub mod experiment;
pub mod generator;
pub mod results;

//! dyps benchmarking suite
//!
//! This crate contains benchmarks for end-to-end resolution of synthetic
//! repository graphs and for the constraint algebra underneath it.

pub mod common;

pub use common::*;

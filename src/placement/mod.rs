// src/placement/mod.rs

//! Placement test engine: sampling, grading, scoring and level assignment.
//! Everything except `service` is pure and storage-agnostic.

pub mod aggregator;
pub mod bank;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod level;
pub mod service;
pub mod session;
pub mod statistics;

#[cfg(test)]
pub(crate) mod testutil;

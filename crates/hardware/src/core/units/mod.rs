//! Functional components shared by the pipelines.
//!
//! This module contains the cache layer that decorates main memory. Execution units of
//! the multi-unit pipeline are modelled as pipeline slots in `pipeline::backend`.

/// Set-associative cache layer with replacement policies.
pub mod cache;

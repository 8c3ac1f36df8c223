//! # tosca_cli
//!
//! Command-line surface for tosca2hot: file loading, pipeline wiring, and
//! output serialization. The semantic work all happens in `tosca_types`,
//! `tosca_model`, and `tosca_hot`; this crate is the thin I/O wrapper
//! around them.

pub mod pipeline;

pub use pipeline::{PipelineOptions, TranslationRun};

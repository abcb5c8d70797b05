//! Install module - fetch, unpack and locate an archive.
//!
//! [`pipeline::InstallPipeline`] drives a [`Fetcher`](crate::traits::Fetcher)
//! and an [`Extractor`](crate::traits::Extractor) in sequence and hands back
//! the extracted directory as an [`InstallOutcome`].

pub mod pipeline;

pub use pipeline::{InstallOutcome, InstallPipeline, PipelineError};

pub mod extract;
pub mod fetch;
pub mod install;
pub mod model;
pub mod traits;

#[cfg(test)]
mod test_fixtures;

// Re-export common types for convenience
pub use extract::{CommandExtractor, ZipExtractor};
pub use fetch::HttpFetcher;
pub use install::{InstallOutcome, InstallPipeline, PipelineError};
pub use model::*;
pub use traits::*;

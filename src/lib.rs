pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod identity;
pub mod pipeline;
pub mod process;
pub mod store;
pub mod upload;

pub use error::{PipelineError, StoreError};
pub use pipeline::{FileEvent, LoadOutcome, Pipeline};

mod cache;
pub(crate) mod forecast;
mod generator;
pub(crate) mod prompt;

pub use cache::SummaryCache;
pub use generator::{GenerateError, RunMode, SummaryGenerator};

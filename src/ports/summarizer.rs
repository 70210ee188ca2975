#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("summarization request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("summarization service returned status {0}")]
    Status(u16),
    #[error("summarization service returned no text")]
    Empty,
}

pub trait Summarizer: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<String, SummarizeError>> + Send + 'a
    where
        Self: 'a;

    fn generate<'a>(&'a self, prompt_parts: &'a [String]) -> Self::Fut<'a>;
}

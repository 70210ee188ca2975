#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("weather provider returned status {0}")]
    Status(u16),
    #[error("no forecast available: {0}")]
    Unavailable(String),
}

pub trait WeatherProvider: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<Vec<u8>, WeatherError>> + Send + 'a
    where
        Self: 'a;

    /// Raw forecast document for the given coordinates.
    fn fetch_forecast<'a>(&'a self, latitude: f64, longitude: f64) -> Self::Fut<'a>;
}

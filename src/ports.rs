pub mod push;
pub mod store;
pub mod summarizer;
pub mod time;
pub mod weather;

use std::pin::Pin;

pub use push::{DeliveryError, PushSender};
pub use store::{StoreError, SubscriptionStore, SummaryStore};
pub use summarizer::{SummarizeError, Summarizer};
pub use time::TimeProvider;
pub use weather::{WeatherError, WeatherProvider};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub trait TimeProvider: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> DateTime<Utc>;
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;
}

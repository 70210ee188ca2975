use crate::types::push::PushCapability;

/// Why a single delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The push service no longer accepts this capability; the browser
    /// unsubscribed or the subscription expired.
    #[error("push capability expired or invalid: {0}")]
    Expired(String),
    /// Network trouble or a 5xx from the push service.
    #[error("transient delivery failure: {0}")]
    Transient(String),
    #[error("malformed push payload: {0}")]
    Malformed(String),
}

impl DeliveryError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Expired(_))
    }
}

pub trait PushSender: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), DeliveryError>> + Send + 'a
    where
        Self: 'a;

    /// Makes exactly one delivery attempt.
    fn send<'a>(&'a self, capability: &'a PushCapability, payload: &'a [u8]) -> Self::Fut<'a>;
}

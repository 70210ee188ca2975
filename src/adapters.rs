use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::ports::{self, BoxFuture, DeliveryError};
use crate::types::push::{PushCapability, VapidConfig};

mod gemini;
mod met;

pub use gemini::GeminiClient;
pub use met::{MetNoClient, PlaceholderWeather};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

#[derive(Clone)]
pub struct WebPushSender {
    vapid: VapidConfig,
    ttl: u32,
    client: Arc<web_push::WebPushClient>,
}

impl WebPushSender {
    pub fn new(vapid: VapidConfig, ttl: u32) -> Result<Self, web_push::WebPushError> {
        let client = web_push::WebPushClient::new()?;
        Ok(Self {
            vapid,
            ttl,
            client: Arc::new(client),
        })
    }

    async fn try_send(
        &self,
        capability: &PushCapability,
        payload: &[u8],
    ) -> Result<(), web_push::WebPushError> {
        let subscription_info = web_push::SubscriptionInfo::new(
            capability.endpoint.clone(),
            capability.keys.p256dh.clone(),
            capability.keys.auth.clone(),
        );
        let mut builder = web_push::WebPushMessageBuilder::new(&subscription_info)?;
        builder.set_payload(web_push::ContentEncoding::Aes128Gcm, payload);
        builder.set_ttl(self.ttl);
        let mut signature_builder = web_push::VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )?;
        signature_builder.add_claim("sub", self.vapid.subject.as_str());
        builder.set_vapid_signature(signature_builder.build()?);
        self.client.send(builder.build()?).await?;
        Ok(())
    }
}

fn classify(err: web_push::WebPushError) -> DeliveryError {
    use web_push::WebPushError as E;
    match err {
        E::EndpointNotValid { .. } | E::EndpointNotFound { .. } | E::Unauthorized { .. } => {
            DeliveryError::Expired(err.to_string())
        }
        E::InvalidCryptoKeys { .. } | E::MissingCryptoKeys { .. } => {
            DeliveryError::Expired(err.to_string())
        }
        E::PayloadTooLarge { .. } => DeliveryError::Malformed(err.to_string()),
        _ => DeliveryError::Transient(err.to_string()),
    }
}

impl ports::PushSender for WebPushSender {
    type Fut<'a>
        = BoxFuture<'a, Result<(), DeliveryError>>
    where
        Self: 'a;

    fn send<'a>(&'a self, capability: &'a PushCapability, payload: &'a [u8]) -> Self::Fut<'a> {
        Box::pin(async move { self.try_send(capability, payload).await.map_err(classify) })
    }
}

mod error;

pub use error::{PushError, PushResult};

use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushMessageBuilder,
};

/// The browser-provided keys identifying one push subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionKeys {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// Web-push sender: encrypts payloads per RFC 8291 and signs requests with
/// VAPID (RFC 8292), both handled by the `web-push` crate.
#[derive(Clone)]
pub struct WebPushSender {
    client: IsahcWebPushClient,
    vapid_private_key: String,
    vapid_subject: String,
    ttl_secs: u32,
}

impl WebPushSender {
    pub fn new(
        vapid_private_key: String,
        vapid_subject: String,
        ttl_secs: u32,
    ) -> PushResult<Self> {
        let client = IsahcWebPushClient::new()
            .map_err(|e| PushError::Config(format!("push client init failed: {e}")))?;
        Ok(Self {
            client,
            vapid_private_key,
            vapid_subject,
            ttl_secs,
        })
    }

    /// Deliver an encrypted payload to a single endpoint.
    pub async fn send(&self, subscription: &SubscriptionKeys, payload: &[u8]) -> PushResult<()> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.p256dh,
            &subscription.auth,
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.vapid_private_key, &info)
                .map_err(|e| PushError::Config(format!("invalid VAPID private key: {e}")))?;
        signature.add_claim("sub", self.vapid_subject.as_str());
        let signature = signature
            .build()
            .map_err(|e| PushError::Config(format!("VAPID signing failed: {e}")))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl_secs);

        let message = builder.build()?;
        self.client.send(message).await?;

        tracing::debug!(endpoint = %subscription.endpoint, "push delivered");
        Ok(())
    }
}

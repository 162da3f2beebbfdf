//! Async helpers for driving stages through the bus

use anyhow::{Context, Result, bail};
use bus::{BusMessage, Message, Subscription};
use std::time::Duration;

/// Default wait for a message that should arrive
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Receive the next payload or fail after `RECV_TIMEOUT`
pub async fn recv_message<T: BusMessage>(subscription: &mut Subscription<T>) -> Result<T> {
    let envelope = tokio::time::timeout(RECV_TIMEOUT, subscription.recv())
        .await
        .with_context(|| format!("nothing received on {}", subscription.address()))??;
    Ok(envelope.message)
}

/// Assert nothing arrives within `wait`
pub async fn expect_silence<T: BusMessage>(subscription: &mut Subscription<T>, wait: Duration) -> Result<()> {
    match tokio::time::timeout(wait, subscription.recv()).await {
        Err(_) => Ok(()),
        Ok(Ok(envelope)) => bail!("unexpected message on {}: {:?}", subscription.address(), envelope.message),
        Ok(Err(e)) => bail!("receive failed on {}: {e}", subscription.address()),
    }
}

/// Render messages as JSON lines, the replay input format
pub fn to_json_lines(messages: &[Message]) -> Result<String> {
    let mut out = String::new();
    for message in messages {
        out.push_str(&serde_json::to_string(message)?);
        out.push('\n');
    }
    Ok(out)
}

use std::future::Future;
use std::time::Duration;

use concierge_core::error::CapabilityError;

/// Await a capability call, converting an elapsed `limit` into
/// [`CapabilityError::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    capability: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout {
            capability,
            elapsed: limit,
        }),
    }
}

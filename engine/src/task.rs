//! Running provider calls on their own tasks

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::provider::ProviderError;

/// Extract the panic message from a join error; None if the task was aborted
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
    if !err.is_panic() {
        return None;
    }
    let payload = err.into_panic();
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    };
    Some(message)
}

/// Map a join error to the provider error clients see
pub fn join_error_to_provider_error(err: JoinError) -> ProviderError {
    match join_error_panic_message(err) {
        Some(message) => ProviderError::Panicked(message),
        None => ProviderError::Cancelled,
    }
}

/// Run `fut` on its own task, bounded by `timeout`
///
/// A panic becomes [`ProviderError::Panicked`]; expiry aborts the task and
/// becomes [`ProviderError::Timeout`].
pub async fn contained<T, F>(timeout: Duration, fut: F) -> Result<T, ProviderError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ProviderError>> + Send + 'static,
{
    let mut handle = tokio::spawn(fut);
    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            let err = join_error_to_provider_error(err);
            warn!(error = %err, "contained: provider task did not complete");
            Err(err)
        }
        Err(_) => {
            debug!(timeout_ms = timeout.as_millis() as u64, "contained: timed out, aborting task");
            handle.abort();
            Err(ProviderError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

// crates/resilience/src/invoke.rs
//! Single-attempt invocation that never lets a fault escape

use futures::FutureExt;
use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

/// Runs one attempt of `operation`, normalizing its error (or panic) to a message
pub(crate) async fn invoke<F, Fut, T, E>(operation: F) -> Result<T, String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let future = match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(future) => future,
        Err(payload) => return Err(panic_message(payload.as_ref())),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("Operation panicked: {}", detail)
}

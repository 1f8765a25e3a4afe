//! Transient-fault retry wrapper for conversational turns

use crate::{Error, Result};

/// Total attempts for one turn, counting the first
pub const MAX_TURN_ATTEMPTS: u32 = 3;

/// Run `operation`, retrying while `is_transient` classifies its failure as
/// a temporary service-unavailability condition, up to `max_attempts` total
/// attempts.
///
/// There is no delay between attempts; the bound is the whole contract. Any
/// non-transient failure, or the last transient one, is re-raised unchanged.
///
/// # Errors
///
/// Returns the operation's original error on exhaustion or non-transient
/// failure
pub async fn with_retry<T, F, Fut>(
    max_attempts: u32,
    is_transient: impl Fn(&Error) -> bool,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                tracing::warn!(error = %e, attempt, max_attempts, "transient failure, retrying turn");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

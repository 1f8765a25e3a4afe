//! Conversation protocol state machine
//!
//! One *turn* is a full request/response exchange over the streaming
//! channel; a *session* links turns through service-signaled follow-on
//! continuation. The executor runs turns, the retry wrapper absorbs
//! transient unavailability, and the session loop decides when to re-arm
//! for a new user trigger.

mod retry;
mod session;
mod turn;

pub use retry::{MAX_TURN_ATTEMPTS, with_retry};
pub use session::{
    RetryingDriver, Session, SessionOptions, SessionState, TriggerSource, TurnDriver,
};
pub use turn::{Query, TurnExecutor, TurnOutcome};

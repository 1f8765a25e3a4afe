//! Session loop: sequences turns and decides when to re-arm for a trigger
//!
//! All session behavior flows through an explicit [`SessionOptions`] value —
//! no process-wide flags — and the turn machinery sits behind the
//! [`TurnDriver`] seam so the loop is testable with a scripted driver.

use async_trait::async_trait;

use super::retry::{MAX_TURN_ATTEMPTS, with_retry};
use super::turn::{Query, TurnExecutor, TurnOutcome};
use crate::protocol::ConversationState;
use crate::transport::AssistTransport;
use crate::{Error, Result};

/// Session loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a user-initiated activation
    AwaitingTrigger,
    /// A turn is executing
    InTurn,
    /// Terminal: no further turns execute
    SessionDone,
}

/// How a session begins and ends
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Terminate after exactly one conversation; also skips the initial
    /// trigger wait
    pub once: bool,

    /// Bounded file-driven run: exactly one turn, no trigger wait
    pub single_turn: bool,
}

impl SessionOptions {
    const fn skip_initial_trigger(self) -> bool {
        self.once || self.single_turn
    }
}

/// External user-activation signal awaited while in `AwaitingTrigger`
#[async_trait]
pub trait TriggerSource: Send {
    /// Block until the user activates the assistant
    ///
    /// # Errors
    ///
    /// Returns error if the trigger source fails (e.g. closed input)
    async fn wait_for_trigger(&mut self) -> Result<()>;
}

/// Runs one conversational turn given the current continuation state
#[async_trait]
pub trait TurnDriver: Send {
    /// Execute a turn, returning its outcome
    ///
    /// # Errors
    ///
    /// Returns the turn's unrecovered failure
    async fn run_turn(&mut self, state: ConversationState) -> Result<TurnOutcome>;
}

/// Production driver: turn executor wrapped in the transient-fault retry
/// policy, each attempt a fresh turn against the same continuation state
pub struct RetryingDriver<T: AssistTransport> {
    executor: TurnExecutor<T>,
}

impl<T: AssistTransport> RetryingDriver<T> {
    /// Wrap a turn executor
    pub const fn new(executor: TurnExecutor<T>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<T: AssistTransport> TurnDriver for RetryingDriver<T> {
    async fn run_turn(&mut self, state: ConversationState) -> Result<TurnOutcome> {
        let executor = &self.executor;
        with_retry(MAX_TURN_ATTEMPTS, Error::is_transient, || {
            executor.run_turn(state.clone(), Query::Audio)
        })
        .await
    }
}

/// Sequences turns into a conversation session.
///
/// Owns the [`ConversationState`] across turns: the driver receives it by
/// value per turn and hands back the updated value; when a turn reports no
/// follow-on, the state is discarded.
pub struct Session<D> {
    driver: D,
    options: SessionOptions,
    state: SessionState,
    conversation_state: ConversationState,
    turns_completed: u64,
}

impl<D: TurnDriver> Session<D> {
    /// Create a session over a turn driver
    pub fn new(driver: D, options: SessionOptions) -> Self {
        let state = if options.skip_initial_trigger() {
            SessionState::InTurn
        } else {
            SessionState::AwaitingTrigger
        };
        Self {
            driver,
            options,
            state,
            conversation_state: ConversationState::default(),
            turns_completed: 0,
        }
    }

    /// Current loop state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Turns completed so far
    #[must_use]
    pub const fn turns_completed(&self) -> u64 {
        self.turns_completed
    }

    /// Run until the session reaches `SessionDone`.
    ///
    /// A turn failure terminates the session abnormally; retries are
    /// exhausted inside the driver, not here.
    ///
    /// # Errors
    ///
    /// Returns the failing turn's or trigger's error
    pub async fn run(&mut self, trigger: &mut dyn TriggerSource) -> Result<()> {
        loop {
            match self.state {
                SessionState::AwaitingTrigger => {
                    tracing::info!("awaiting user trigger");
                    trigger.wait_for_trigger().await?;
                    self.state = SessionState::InTurn;
                }
                SessionState::InTurn => {
                    self.step().await?;
                }
                SessionState::SessionDone => {
                    tracing::info!(turns = self.turns_completed, "session finished");
                    return Ok(());
                }
            }
        }
    }

    /// Execute one turn and apply its continuation decision
    async fn step(&mut self) -> Result<()> {
        let state = std::mem::take(&mut self.conversation_state);
        let outcome = self.driver.run_turn(state).await?;
        self.turns_completed += 1;

        if outcome.continue_conversation {
            // Follow-on expected: next turn starts immediately, no trigger
            self.conversation_state = outcome.conversation_state;
            self.state = SessionState::InTurn;
        } else {
            self.conversation_state = ConversationState::default();
            self.state = if self.options.once || self.options.single_turn {
                SessionState::SessionDone
            } else {
                SessionState::AwaitingTrigger
            };
        }
        Ok(())
    }
}

//! Session loop integration tests
//!
//! Drives the session state machine with scripted turn outcomes

use aria_client::{ConversationState, Error, Session, SessionOptions, SessionState, TurnOutcome};

mod common;
use common::{CountingTrigger, ScriptedDriver};

fn outcome(continue_conversation: bool, state: Vec<u8>) -> TurnOutcome {
    TurnOutcome {
        continue_conversation,
        conversation_state: ConversationState::new(state),
    }
}

#[tokio::test]
async fn once_runs_a_single_conversation_without_trigger() {
    let driver = ScriptedDriver::new(vec![Ok(outcome(false, vec![]))]);
    let mut session = Session::new(
        driver,
        SessionOptions {
            once: true,
            single_turn: false,
        },
    );
    let mut trigger = CountingTrigger::new(0);

    session.run(&mut trigger).await.unwrap();

    assert_eq!(session.state(), SessionState::SessionDone);
    assert_eq!(session.turns_completed(), 1);
    assert_eq!(trigger.granted(), 0);
}

#[tokio::test]
async fn follow_on_chains_turns_without_new_trigger() {
    let driver = ScriptedDriver::new(vec![
        Ok(outcome(true, vec![1, 2])),
        Ok(outcome(false, vec![9])),
    ]);
    let states = driver.states_seen();
    let mut session = Session::new(driver, SessionOptions::default());

    // One activation starts the conversation; the follow-on turn needs none.
    // The exhausted budget ends the test once the loop re-arms.
    let mut trigger = CountingTrigger::new(1);
    let result = session.run(&mut trigger).await;

    assert!(result.is_err());
    assert_eq!(session.state(), SessionState::AwaitingTrigger);
    assert_eq!(session.turns_completed(), 2);
    assert_eq!(trigger.granted(), 1);

    let states = states.lock().unwrap();
    assert_eq!(states.len(), 2);
    assert!(states[0].is_empty());
    assert_eq!(states[1], ConversationState::new(vec![1, 2]));
}

#[tokio::test]
async fn state_is_discarded_when_conversation_ends() {
    let driver = ScriptedDriver::new(vec![
        Ok(outcome(false, vec![5])),
        Ok(outcome(false, vec![6])),
    ]);
    let states = driver.states_seen();
    let mut session = Session::new(driver, SessionOptions::default());

    let mut trigger = CountingTrigger::new(2);
    let result = session.run(&mut trigger).await;

    assert!(result.is_err());
    assert_eq!(session.turns_completed(), 2);

    // The second conversation starts fresh despite the first turn's token
    let states = states.lock().unwrap();
    assert!(states[0].is_empty());
    assert!(states[1].is_empty());
}

#[tokio::test]
async fn single_turn_mode_finishes_after_one_turn() {
    let driver = ScriptedDriver::new(vec![Ok(outcome(false, vec![]))]);
    let mut session = Session::new(
        driver,
        SessionOptions {
            once: false,
            single_turn: true,
        },
    );
    let mut trigger = CountingTrigger::new(0);

    session.run(&mut trigger).await.unwrap();

    assert_eq!(session.state(), SessionState::SessionDone);
    assert_eq!(session.turns_completed(), 1);
}

#[tokio::test]
async fn once_still_follows_on_within_the_conversation() {
    let driver = ScriptedDriver::new(vec![
        Ok(outcome(true, vec![3])),
        Ok(outcome(false, vec![])),
    ]);
    let mut session = Session::new(
        driver,
        SessionOptions {
            once: true,
            single_turn: false,
        },
    );
    let mut trigger = CountingTrigger::new(0);

    session.run(&mut trigger).await.unwrap();

    assert_eq!(session.state(), SessionState::SessionDone);
    assert_eq!(session.turns_completed(), 2);
}

#[tokio::test]
async fn turn_failure_terminates_the_session() {
    let driver = ScriptedDriver::new(vec![Err(Error::Transport("link dropped".to_string()))]);
    let mut session = Session::new(
        driver,
        SessionOptions {
            once: true,
            single_turn: false,
        },
    );
    let mut trigger = CountingTrigger::new(0);

    let result = session.run(&mut trigger).await;

    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(session.turns_completed(), 0);
}

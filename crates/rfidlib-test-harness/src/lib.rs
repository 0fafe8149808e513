//! rfidlib-test-harness: deterministic test doubles for rfidlib.
//!
//! Provides [`MockTransport`], a scripted [`Transport`](rfidlib_core::Transport)
//! for exercising protocol engines without hardware, and its
//! [`MockScript`] handle for driving expectations and streamed frames
//! from the test side.

mod mock;

pub use mock::{MockScript, MockTransport};

//! Test support utilities for session and listener tests
//!
//! Provides an in-memory stream that replays a fixed sequence of reads, an
//! interpreter that records what it was asked to parse, and storage backends
//! with observable behaviour.
#![allow(dead_code)]

pub mod fakes;
pub mod stream;

pub use fakes::{FailingStorage, RecordingInterpreter, RecordingStorage};
pub use stream::{Record, ScriptedStream};

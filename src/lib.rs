#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod error;
pub mod listener;
pub mod logging;
pub mod message;
pub mod notify;
pub mod smtp;
pub mod storage;
pub mod traits;

pub use tracing;

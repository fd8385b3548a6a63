#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Alarm clock scheduling and playback built on local notifications.
//!
//! An alarm is set as a burst of notifications one second apart, the first
//! of which starts a looping tone. The tone stops on its own after a while,
//! or when the user answers the stop prompt of a delivered notification.

pub mod alarm;
/// sound loading and the tone preview
pub mod audio;
pub mod center;
pub mod communication;
pub mod config;
pub mod daemon;
pub mod error;
pub mod notification;
pub mod permission;
pub mod player;
pub mod prompt;
pub mod scheduler;

pub use error::{Error, Result};

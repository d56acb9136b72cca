//! Speak-gym Core Library
//!
//! Client side of a spoken-English tutor: microphone capture per drill slot,
//! sequential clip playback, supersession of in-flight feedback requests and
//! a typed client for the tutor bridge.
//!
//! # Example
//!
//! ```no_run
//! use speak_gym_core::{
//!     AudioCoordinator, CoreResult, DailyStore, DrillRunner, HttpTutorApi, MemoryStore,
//!     SessionContext, Slot,
//!     api::DEFAULT_TIMEOUT,
//!     audio::{AudioInput, AudioOutput},
//! };
//!
//! use std::{sync::Arc, time::Duration};
//!
//! async fn practice(input: Arc<dyn AudioInput>, output: Arc<dyn AudioOutput>) -> CoreResult<()> {
//!     let audio = Arc::new(AudioCoordinator::new(input, output));
//!     let api = Arc::new(HttpTutorApi::new("http://127.0.0.1:8000", DEFAULT_TIMEOUT)?);
//!     let store = DailyStore::new(Arc::new(MemoryStore::new()));
//!     let runner = DrillRunner::new(audio, api, store);
//!
//!     let ctx = SessionContext::default();
//!     let seed = runner.start_drill(&ctx, Slot::Shadow).await?;
//!     println!("Repeat: {}", seed.display_line());
//!
//!     runner.begin_attempt(Slot::Shadow).await?;
//!     tokio::time::sleep(Duration::from_secs(3)).await;
//!     let outcome = runner.finish_attempt(&ctx, Slot::Shadow).await?;
//!
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audio;
pub mod context;
pub mod drill;
pub mod request;

mod error;
mod slot;

pub use {
    api::{HttpTutorApi, TutorApi},
    audio::{AudioCoordinator, Clip},
    context::{DailyStore, JsonFileStore, KeyValueStore, MemoryStore, SessionContext},
    drill::{AttemptOutcome, DrillRunner, DrillSeed},
    error::{CoreError, Result as CoreResult},
    request::FeedbackState,
    slot::Slot,
};

#[cfg(test)]
mod tests;

mod client;
mod types;

pub use {
    client::{DEFAULT_TIMEOUT, HttpTutorApi, TutorApi},
    types::*,
};

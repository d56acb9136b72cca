mod session_context;
mod store;

pub use {
    session_context::{Difficulty, Language, SessionContext},
    store::{DailyStore, JsonFileStore, KeyValueStore, MemoryStore},
};

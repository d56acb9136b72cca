mod audio_config;
mod backend_config;
#[allow(clippy::module_inception)]
mod config;
mod practice_config;
mod storage_config;

pub(crate) use {
    audio_config::AudioConfig, backend_config::BackendConfig, config::Config,
    practice_config::PracticeConfig, storage_config::StorageConfig,
};

pub(crate) const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub(crate) const DEFAULT_PHRASE_COUNT: u8 = 5;
pub(crate) const BACKEND_URL_ENV: &str = "SPEAK_GYM_BACKEND_URL";

pub(crate) fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

pub(crate) fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

pub(crate) fn default_phrase_count() -> u8 {
    DEFAULT_PHRASE_COUNT
}

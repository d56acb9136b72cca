//! Speak-gym: spoken-English drills against a tutor bridge, from the terminal.

mod app;
mod app_command;
mod command_reader;
mod config;
mod error;
mod headless;
mod recording_state;
mod status;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    command_reader::CommandReader,
    error::{AppError, Result as AppResult},
    recording_state::{RecordingAck, RecordingState},
    status::StatusReporter,
};

use crate::config::Config;

use speak_gym_core::{
    AudioCoordinator, DailyStore, DrillRunner, HttpTutorApi, JsonFileStore, SessionContext,
    TutorApi,
    audio::{AudioInput, AudioOutput},
};

use std::{
    io::{self, BufRead},
    sync::Arc,
};

use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "speak_gym=debug,speak_gym_core=debug";

/// Application entry point.
#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout belongs to the learner.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(io::stderr)
        .init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    let (command_tx, command_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (ack_tx, ack_rx) = watch::channel(None);

    let app = match build_app(config, command_rx, shutdown_tx, ack_tx) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {:?}", e);
            std::process::exit(1);
        }
    };
    let command_reader = CommandReader::new(command_tx, ack_rx);

    // Terminal reads block, so they live on a plain thread that the process
    // abandons on exit. Closing the channel reads as end of input.
    let (line_tx, line_rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = ?e, "Failed to read terminal input");
                    break;
                }
            }
        }
        debug!("Terminal reader stopped");
    });

    tokio::join!(
        async {
            if let Err(e) = command_reader.run(line_rx, shutdown_rx).await {
                error!(error = ?e, "Command reader error");
            }
        },
        async {
            if let Err(e) = app.run().await {
                error!(error = ?e, "App error");
            }
        }
    );
}

/// Wire the audio backends, bridge client and day store into an [`App`].
fn build_app(
    config: Config,
    command_rx: mpsc::Receiver<AppCommand>,
    shutdown_tx: watch::Sender<bool>,
    ack_tx: watch::Sender<Option<RecordingAck>>,
) -> AppResult<App> {
    let (input, output) = audio_backends(&config)?;
    let audio = Arc::new(AudioCoordinator::new(input, output));

    let api: Arc<dyn TutorApi> = Arc::new(HttpTutorApi::new(
        &config.backend.base_url,
        config.backend.timeout(),
    )?);

    let store = DailyStore::new(Arc::new(JsonFileStore::open(config.state_file()?)?));
    let ctx = SessionContext {
        language: config.practice.language,
        difficulty: config.practice.difficulty,
        theme: config.practice.theme.clone(),
        anchor_phrase: None,
        model: config.practice.model.clone(),
    }
    .restore(&store, DailyStore::today())?;

    let runner = Arc::new(
        DrillRunner::new(audio, Arc::clone(&api), store).with_volume(config.audio.volume),
    );
    let status = Arc::new(Mutex::new(StatusReporter::new(io::stdout())));

    Ok(App {
        runner,
        api,
        status,
        config,
        ctx,
        command_rx,
        shutdown_tx,
        ack_tx,
        phrase_cards: Vec::new(),
    })
}

#[cfg(feature = "cpal-backend")]
fn audio_backends(_config: &Config) -> AppResult<(Arc<dyn AudioInput>, Arc<dyn AudioOutput>)> {
    use speak_gym_core::audio::{CpalInput, CpalOutput};

    Ok((Arc::new(CpalInput::new()), Arc::new(CpalOutput::new())))
}

#[cfg(not(feature = "cpal-backend"))]
fn audio_backends(config: &Config) -> AppResult<(Arc<dyn AudioInput>, Arc<dyn AudioOutput>)> {
    use crate::headless::{WavDirOutput, WavFileInput};

    Ok((
        Arc::new(WavFileInput::new(config.audio.input_file.clone())),
        Arc::new(WavDirOutput::new(config.output_dir()?)),
    ))
}

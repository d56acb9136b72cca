use crate::{
    AppCommand, AppResult, RecordingAck, StatusReporter, config::Config, status::report_or_log,
};

use speak_gym_core::{
    AttemptOutcome, CoreError, DrillRunner, SessionContext, Slot, TutorApi,
    api::PhraseCard,
    audio::PlaybackEvent,
};

use std::{io::Stdout, sync::Arc};

use tokio::sync::{Mutex, broadcast::error::RecvError, mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Main application state.
///
/// Owns the practice context and applies commands from the
/// [`CommandReader`](crate::CommandReader) one at a time. Feedback chains run
/// in spawned tasks so a new recording can start (and supersede them) while
/// the bridge is still answering. Every recording start is answered on
/// `ack_tx` so the reader never believes in a capture that did not open.
pub struct App {
    pub(crate) runner: Arc<DrillRunner>,
    pub(crate) api: Arc<dyn TutorApi>,
    pub(crate) status: Arc<Mutex<StatusReporter<Stdout>>>,
    pub(crate) config: Config,
    pub(crate) ctx: SessionContext,
    pub(crate) command_rx: mpsc::Receiver<AppCommand>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
    pub(crate) ack_tx: watch::Sender<Option<RecordingAck>>,
    pub(crate) phrase_cards: Vec<PhraseCard>,
}

impl App {
    /// Run the main application event loop.
    #[instrument(skip(self))]
    pub(crate) async fn run(mut self) -> AppResult<()> {
        info!("Speak-gym starting");

        let mut playback_events = self.runner.audio().subscribe_playback();
        self.greet().await;

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    if cmd == AppCommand::Shutdown {
                        info!("Shutdown requested");
                        break;
                    }
                    self.handle_command(cmd).await;
                }

                event = playback_events.recv() => match event {
                    Ok(PlaybackEvent::Failed { clip_id, reason }) => {
                        warn!(clip_id = %clip_id, reason = %reason, "Clip skipped");
                        self.print(|status| status.line("! A clip could not be played.")).await;
                    }
                    Ok(event) => debug!(?event, "Playback event"),
                    Err(RecvError::Lagged(missed)) => warn!(missed, "Playback events lagged"),
                    Err(RecvError::Closed) => {
                        info!("Playback stopped, shutting down");
                        break;
                    }
                },

                else => {
                    info!("All channels closed, shutting down");
                    break;
                }
            }
        }

        let _ = self.shutdown_tx.send(true);
        release_audio(self.runner).await;
        info!("Speak-gym shut down successfully");

        Ok(())
    }

    /// Check the bridge, then show today's context and the command list.
    async fn greet(&self) {
        let reachable = match self.api.health().await {
            Ok(health) => {
                info!(status = %health.status, "Tutor bridge reachable");
                true
            }
            Err(e) => {
                warn!(error = ?e, base_url = %self.config.backend.base_url, "Tutor bridge unreachable");
                false
            }
        };

        let base_url = self.config.backend.base_url.clone();
        let theme = self.ctx.theme.clone();
        self.print(move |status| {
            if reachable {
                status.line(&format!("Connected to tutor at {}", base_url))?;
            } else {
                status.line(&format!(
                    "! Tutor at {} is not answering; drills will fail until it is up.",
                    base_url
                ))?;
            }
            if let Some(theme) = theme {
                status.line(&format!("Today's theme: {}", theme))?;
            }
            status.help()
        })
        .await;
    }

    #[instrument(skip(self))]
    pub(crate) async fn handle_command(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::SetTheme { theme } => self.set_theme(&theme).await,
            AppCommand::PinAnchor { card } => self.pin_anchor(card).await,
            AppCommand::StartDrill { slot } => {
                match self.runner.start_drill(&self.ctx, slot).await {
                    Ok(seed) => self.print(|status| status.seed(&seed)).await,
                    Err(e) => self.report_error(slot, e).await,
                }
            }
            AppCommand::StartRecording { slot, session_id } => {
                match self.runner.begin_attempt(slot).await {
                    Ok(capture_id) => {
                        self.ack_tx.send_replace(Some(RecordingAck::Started { session_id }));
                        info!(slot = %slot, session_id = %session_id, capture_id = %capture_id, "Recording started");
                        self.print(|status| status.line("Recording... type rec to submit.")).await;
                    }
                    Err(e) => {
                        self.ack_tx.send_replace(Some(RecordingAck::Refused { session_id }));
                        self.report_error(slot, e).await;
                    }
                }
            }
            AppCommand::StopRecording { slot, session_id } => {
                self.stop_and_submit(slot, session_id).await;
            }
            AppCommand::Replay { slot } => match self.runner.replay_feedback(slot).await {
                Ok(true) => debug!(slot = %slot, "Feedback replayed"),
                Ok(false) => self.print(|status| status.line("No feedback to replay yet.")).await,
                Err(e) => self.report_error(slot, e).await,
            },
            AppCommand::Report { slot } => {
                match self.runner.layered_feedback(&self.ctx, slot).await {
                    Ok(Some(report)) => self.print(|status| status.report(&report)).await,
                    Ok(None) => self.print(|status| status.line("Record an attempt first.")).await,
                    Err(e) => self.report_error(slot, e).await,
                }
            }
            AppCommand::Status => {
                let feedback: Vec<_> = Slot::ALL
                    .into_iter()
                    .map(|slot| (slot, self.runner.feedback(slot)))
                    .collect();
                let ctx = self.ctx.clone();
                self.print(move |status| status.summary(&ctx, &feedback)).await;
            }
            AppCommand::Help => self.print(|status| status.help()).await,
            AppCommand::Unrecognised { message } => {
                self.print(move |status| status.line(&message)).await
            }
            AppCommand::Shutdown => {}
        }
    }

    async fn set_theme(&mut self, theme: &str) {
        let count = self.config.practice.phrase_count;
        match self.runner.resolve_theme(&self.ctx, theme, count).await {
            Ok((ctx, response)) => {
                self.ctx = ctx;
                self.phrase_cards = response.phrase_cards.clone();
                self.print(|status| status.theme(&response)).await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to resolve theme");
                self.print(|status| status.error(&e)).await;
            }
        }
    }

    async fn pin_anchor(&mut self, card: usize) {
        let Some(phrase) = card
            .checked_sub(1)
            .and_then(|i| self.phrase_cards.get(i))
            .map(|c| c.phrase.clone())
        else {
            let available = self.phrase_cards.len();
            self.print(move |status| {
                status.line(&format!(
                    "No phrase card {}; {} available. Set a theme first.",
                    card, available
                ))
            })
            .await;
            return;
        };

        match self.runner.pin_anchor(&self.ctx, &phrase) {
            Ok(ctx) => {
                self.ctx = ctx;
                self.print(move |status| status.line(&format!("Anchor pinned: {}", phrase)))
                    .await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to pin anchor phrase");
                self.print(|status| status.error(&e)).await;
            }
        }
    }

    /// Stop the capture now and run the feedback chain in the background.
    #[instrument(skip(self))]
    async fn stop_and_submit(&self, slot: Slot, session_id: Uuid) {
        let attempt = match self.runner.stop_attempt(slot).await {
            Ok(Some(attempt)) => attempt,
            Ok(None) => {
                self.print(move |status| status.outcome(slot, &AttemptOutcome::Empty))
                    .await;
                return;
            }
            Err(e) => {
                self.report_error(slot, e).await;
                return;
            }
        };

        self.print(|status| status.line("Listening...")).await;

        let runner = Arc::clone(&self.runner);
        let status = Arc::clone(&self.status);
        let ctx = self.ctx.clone();

        tokio::spawn(async move {
            let result = runner.submit_attempt(&ctx, attempt).await;
            let mut status = status.lock().await;
            match result {
                Ok(outcome) => {
                    info!(session_id = %session_id, slot = %slot, "Attempt complete");
                    report_or_log(&mut *status, |s| s.outcome(slot, &outcome));
                }
                Err(e) if e.is_silent() => {
                    debug!(session_id = %session_id, slot = %slot, "Attempt superseded");
                }
                Err(e) => {
                    error!(session_id = %session_id, slot = %slot, error = ?e, "Attempt failed");
                    report_or_log(&mut *status, |s| s.error(&e));
                }
            }
        });
    }

    async fn report_error(&self, slot: Slot, e: CoreError) {
        if e.is_silent() {
            debug!(slot = %slot, "Request superseded");
            return;
        }
        error!(slot = %slot, error = ?e, "Drill command failed");
        self.print(|status| status.error(&e)).await;
    }

    async fn print(&self, print: impl FnOnce(&mut StatusReporter<Stdout>) -> AppResult<()>) {
        let mut status = self.status.lock().await;
        report_or_log(&mut *status, print);
    }
}

/// Cancel outstanding requests and shut the audio down if nothing else
/// holds it; otherwise just release the microphone.
async fn release_audio(runner: Arc<DrillRunner>) {
    let audio = Arc::clone(runner.audio());
    drop(runner);

    for slot in Slot::ALL {
        audio.cancel_in_flight(slot);
    }

    match Arc::try_unwrap(audio) {
        Ok(audio) => audio.shutdown().await,
        Err(audio) => {
            if let Some(slot) = audio.active_slot().await {
                if let Err(e) = audio.stop_capture(slot).await {
                    error!(slot = %slot, error = ?e, "Failed to release capture on exit");
                }
            }
            if let Err(e) = audio.stop_all_playback() {
                warn!(error = ?e, "Failed to stop playback on exit");
            }
            info!("Audio still referenced by background tasks, released capture only");
        }
    }
}

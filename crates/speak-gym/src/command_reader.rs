//! Line-oriented command reader with recording state machine.
//!
//! Reads practice commands from a terminal, keeps track of the current drill
//! and whether it is recording, and forwards typed [`AppCommand`]s to the
//! main application over an async channel.

use crate::{AppCommand, AppError, AppResult, RecordingAck, RecordingState};

use speak_gym_core::Slot;

use std::{panic::Location, time::Instant};

use error_location::ErrorLocation;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Command list printed by `help`.
pub const HELP: &str = "\
Commands:
  theme <text>    resolve a practice theme and list phrase cards
  pin <n>         pin phrase card n as today's anchor phrase
  drill <name>    start shadow | substitution | expansion | review
  rec [name]      start or stop recording for the current drill
  replay          hear the latest feedback again
  report          grammar and prosody notes for the last attempt
  status          show theme, anchor and feedback
  help            show this list
  quit            exit";

/// One parsed terminal line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// `theme <text>`
    Theme(String),
    /// `pin <n>`
    Pin(usize),
    /// `drill <slot>`
    Drill(Slot),
    /// `rec [slot]`
    Record(Option<Slot>),
    /// `replay`
    Replay,
    /// `report`
    Report,
    /// `status`
    Status,
    /// `help`
    Help,
    /// `quit`
    Quit,
}

/// Parse a terminal line; blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "theme" | "t" if !rest.is_empty() => Input::Theme(rest.to_string()),
        "theme" | "t" => return Err("Usage: theme <text>".to_string()),
        "pin" => match rest.parse::<usize>() {
            Ok(n) if n > 0 => Input::Pin(n),
            _ => return Err("Usage: pin <card number>".to_string()),
        },
        "drill" | "d" => Input::Drill(rest.parse::<Slot>()?),
        "rec" | "r" if rest.is_empty() => Input::Record(None),
        "rec" | "r" => Input::Record(Some(rest.parse::<Slot>()?)),
        "replay" => Input::Replay,
        "report" => Input::Report,
        "status" | "s" => Input::Status,
        "help" | "h" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(format!("Unknown command '{}'. Type help.", other)),
    };

    Ok(Some(input))
}

/// Terminal command reader with recording state machine.
pub struct CommandReader {
    state: RecordingState,
    current_slot: Option<Slot>,
    command_tx: mpsc::Sender<AppCommand>,
    ack_rx: watch::Receiver<Option<RecordingAck>>,
}

impl CommandReader {
    /// Create a reader that forwards commands to `command_tx` and learns
    /// from `ack_rx` whether the app really started each recording.
    pub fn new(
        command_tx: mpsc::Sender<AppCommand>,
        ack_rx: watch::Receiver<Option<RecordingAck>>,
    ) -> Self {
        Self {
            state: RecordingState::Idle,
            current_slot: None,
            command_tx,
            ack_rx,
        }
    }

    /// Current recording state.
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Drill that `rec`, `replay` and `report` apply to.
    pub fn current_slot(&self) -> Option<Slot> {
        self.current_slot
    }

    /// Run the reader loop until `quit`, end of input or shutdown.
    ///
    /// `lines` is fed by a thread blocked on the terminal; its closing is
    /// treated like `quit`.
    #[instrument(skip(self, lines, shutdown_rx))]
    pub async fn run(
        mut self,
        mut lines: mpsc::Receiver<String>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> AppResult<()> {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Command reader shutting down");
                    break;
                }
                line = lines.recv() => match line {
                    Some(line) => {
                        if !self.handle_line(&line).await? {
                            break;
                        }
                    }
                    None => {
                        debug!("Input closed");
                        self.send(AppCommand::Shutdown).await?;
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply one terminal line. Returns `false` once the learner quits.
    #[instrument(skip(self))]
    pub async fn handle_line(&mut self, line: &str) -> AppResult<bool> {
        self.sync_with_app();

        let input = match parse(line) {
            Ok(Some(input)) => input,
            Ok(None) => return Ok(true),
            Err(message) => {
                self.send(AppCommand::Unrecognised { message }).await?;
                return Ok(true);
            }
        };

        match input {
            Input::Theme(theme) => self.send(AppCommand::SetTheme { theme }).await?,
            Input::Pin(card) => self.send(AppCommand::PinAnchor { card }).await?,
            Input::Drill(slot) => {
                if let RecordingState::Recording { .. } = self.state {
                    self.toggle_recording(slot).await?;
                }
                self.send(AppCommand::StartDrill { slot }).await?;
                self.current_slot = Some(slot);
            }
            Input::Record(slot) => match slot.or(self.current_slot) {
                Some(slot) => self.toggle_recording(slot).await?,
                None => {
                    self.send(AppCommand::Unrecognised {
                        message: "Start a drill first, e.g. drill shadow.".to_string(),
                    })
                    .await?
                }
            },
            Input::Replay => {
                let command = self.for_current_slot(|slot| AppCommand::Replay { slot });
                self.send(command).await?;
            }
            Input::Report => {
                let command = self.for_current_slot(|slot| AppCommand::Report { slot });
                self.send(command).await?;
            }
            Input::Status => self.send(AppCommand::Status).await?,
            Input::Help => self.send(AppCommand::Help).await?,
            Input::Quit => {
                self.send(AppCommand::Shutdown).await?;
                return Ok(false);
            }
        }

        Ok(true)
    }

    #[instrument(skip(self))]
    async fn toggle_recording(&mut self, slot: Slot) -> AppResult<()> {
        match self.state {
            RecordingState::Idle => {
                let session_id = Uuid::new_v4();

                // Send command FIRST -- if this fails, state remains Idle.
                self.send(AppCommand::StartRecording { slot, session_id })
                    .await?;

                self.state = RecordingState::Recording {
                    slot,
                    started_at: Instant::now(),
                    session_id,
                };
                self.current_slot = Some(slot);

                info!(slot = %slot, session_id = %session_id, "Recording started");
            }
            RecordingState::Recording {
                slot: recording_slot,
                started_at,
                session_id,
            } => {
                let duration = started_at.elapsed();

                // Send command FIRST -- if this fails, state remains Recording.
                self.send(AppCommand::StopRecording {
                    slot: recording_slot,
                    session_id,
                })
                .await?;

                self.state = RecordingState::Idle;

                info!(
                    slot = %recording_slot,
                    session_id = %session_id,
                    duration_ms = duration.as_millis(),
                    "Recording stopped"
                );
            }
        }

        Ok(())
    }

    /// Drop back to idle if the app refused the recording we think is open.
    fn sync_with_app(&mut self) {
        if let RecordingState::Recording {
            slot, session_id, ..
        } = self.state
        {
            if *self.ack_rx.borrow() == Some(RecordingAck::Refused { session_id }) {
                info!(slot = %slot, session_id = %session_id, "Recording refused by app");
                self.state = RecordingState::Idle;
            }
        }
    }

    fn for_current_slot(&self, command: impl FnOnce(Slot) -> AppCommand) -> AppCommand {
        match self.current_slot {
            Some(slot) => command(slot),
            None => AppCommand::Unrecognised {
                message: "No drill in progress.".to_string(),
            },
        }
    }

    #[track_caller]
    fn send(&self, command: AppCommand) -> impl Future<Output = AppResult<()>> + '_ {
        let location = ErrorLocation::from(Location::caller());
        async move {
            self.command_tx
                .send(command)
                .await
                .map_err(|e| AppError::ChannelSendFailed {
                    message: format!("Failed to send command: {}", e),
                    location,
                })
        }
    }
}

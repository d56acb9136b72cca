use crate::{
    audio::Clip,
    {CoreError, CoreResult},
};

use std::{collections::VecDeque, panic::Location, sync::Arc};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Platform audio output.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `clip` to completion.
    ///
    /// Dropping the returned future must stop the sound; this is how
    /// [`PlaybackQueue::stop_all`] halts the current clip.
    async fn play(&self, clip: &Clip) -> CoreResult<()>;
}

/// Playback queue notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// A clip started playing.
    Started {
        /// Clip id.
        clip_id: Uuid,
    },
    /// A clip played to the end.
    Finished {
        /// Clip id.
        clip_id: Uuid,
    },
    /// A clip failed to decode or play and was skipped.
    Failed {
        /// Clip id.
        clip_id: Uuid,
        /// Failure description.
        reason: String,
    },
    /// The current clip was cut off by `stop_all`.
    Interrupted {
        /// Clip id.
        clip_id: Uuid,
    },
    /// `stop_all` discarded the pending queue.
    Stopped {
        /// Number of pending clips discarded.
        discarded: usize,
    },
    /// The queue ran empty.
    Idle,
}

#[derive(Debug)]
enum PlaybackCommand {
    Enqueue(Clip),
    StopAll,
    Shutdown,
}

/// Strictly sequential playback of audio clips.
///
/// The queue runs as a task that owns the pending clips; callers talk to it
/// over a command channel, so `stop_all` followed by `enqueue` is applied in
/// that order. At most one clip plays at any instant.
pub struct PlaybackQueue {
    commands: mpsc::UnboundedSender<PlaybackCommand>,
    events: broadcast::Sender<PlaybackEvent>,
    task: JoinHandle<()>,
}

impl PlaybackQueue {
    /// Spawn the playback task on the current tokio runtime.
    pub fn spawn(output: Arc<dyn AudioOutput>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(64);
        let task = tokio::spawn(run(output, rx, events.clone()));

        Self {
            commands,
            events,
            task,
        }
    }

    /// Subscribe to playback events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Append a clip; it plays once every clip ahead of it has finished.
    #[track_caller]
    #[instrument(skip(self, clip), fields(clip_id = %clip.id()))]
    pub fn enqueue(&self, clip: Clip) -> CoreResult<()> {
        self.send(PlaybackCommand::Enqueue(clip))
    }

    /// Halt the current clip and discard everything pending.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn stop_all(&self) -> CoreResult<()> {
        self.send(PlaybackCommand::StopAll)
    }

    /// Stop playback and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(PlaybackCommand::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = ?e, "Playback task panicked");
        }
    }

    #[track_caller]
    fn send(&self, command: PlaybackCommand) -> CoreResult<()> {
        self.commands
            .send(command)
            .map_err(|e| CoreError::ChannelClosed {
                reason: format!("Playback task is gone: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

enum Outcome {
    Done,
    Interrupted,
    Shutdown,
}

async fn run(
    output: Arc<dyn AudioOutput>,
    mut commands: mpsc::UnboundedReceiver<PlaybackCommand>,
    events: broadcast::Sender<PlaybackEvent>,
) {
    let mut pending: VecDeque<Clip> = VecDeque::new();

    loop {
        let Some(clip) = pending.pop_front() else {
            match commands.recv().await {
                Some(PlaybackCommand::Enqueue(clip)) => pending.push_back(clip),
                Some(PlaybackCommand::StopAll) => {
                    let _ = events.send(PlaybackEvent::Stopped { discarded: 0 });
                }
                Some(PlaybackCommand::Shutdown) | None => break,
            }
            continue;
        };

        let clip_id = clip.id();
        let _ = events.send(PlaybackEvent::Started { clip_id });
        debug!(clip_id = %clip_id, queued = pending.len(), "Clip playing");

        let outcome = {
            let play = output.play(&clip);
            tokio::pin!(play);

            loop {
                tokio::select! {
                    result = &mut play => {
                        match result {
                            Ok(()) => {
                                let _ = events.send(PlaybackEvent::Finished { clip_id });
                            }
                            Err(e) => {
                                warn!(clip_id = %clip_id, error = ?e, "Clip failed, skipping");
                                let _ = events.send(PlaybackEvent::Failed {
                                    clip_id,
                                    reason: e.to_string(),
                                });
                            }
                        }
                        break Outcome::Done;
                    }
                    command = commands.recv() => match command {
                        Some(PlaybackCommand::Enqueue(next)) => pending.push_back(next),
                        Some(PlaybackCommand::StopAll) => break Outcome::Interrupted,
                        Some(PlaybackCommand::Shutdown) | None => break Outcome::Shutdown,
                    }
                }
            }
        };

        // The clip and anything decoded for it are released here.
        drop(clip);

        match outcome {
            Outcome::Done => {}
            Outcome::Interrupted => {
                let discarded = pending.len();
                pending.clear();
                let _ = events.send(PlaybackEvent::Interrupted { clip_id });
                let _ = events.send(PlaybackEvent::Stopped { discarded });
                info!(clip_id = %clip_id, discarded, "Playback stopped");
            }
            Outcome::Shutdown => break,
        }

        if pending.is_empty() {
            let _ = events.send(PlaybackEvent::Idle);
        }
    }

    debug!("Playback task exiting");
}

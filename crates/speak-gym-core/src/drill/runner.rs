use crate::{
    CoreError, CoreResult, Slot,
    api::{
        DrillFeedback, DrillStartRequest, ExpansionFeedbackRequest, FeedbackReport,
        FeedbackRequest, ReviewStartRequest, ReviewTurnRequest, ShadowFeedbackRequest,
        SubstitutionFeedbackRequest, SynthesizeRequest, ThemeRequest, ThemeResponse, TutorApi,
    },
    audio::AudioCoordinator,
    context::{DailyStore, SessionContext},
    drill::{AttemptOutcome, DrillSeed, DrillState, PendingAttempt},
    request::{FeedbackBoard, FeedbackState, RequestTicket},
};

use std::{
    collections::HashMap,
    panic::Location,
    sync::{Arc, Mutex, MutexGuard},
};

use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Phrase cards requested per theme are clamped to this range.
pub const PHRASE_COUNT_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

const UNHEARD_MESSAGE: &str = "No speech was recognised. Try again.";

/// Runs the shadow, substitution, expansion and review turn-taking flows.
///
/// Each attempt is a sequential chain: stop capture, transcribe, fetch
/// feedback (or the next review line), then speak the result. The chain runs
/// under the slot's [`RequestTicket`]; starting a new attempt cancels the old
/// chain and anything it would have written is dropped.
pub struct DrillRunner {
    audio: Arc<AudioCoordinator>,
    api: Arc<dyn TutorApi>,
    store: DailyStore,
    volume: Option<f32>,
    board: Mutex<FeedbackBoard>,
    drills: Mutex<HashMap<Slot, DrillState>>,
}

impl DrillRunner {
    /// Create a runner over the coordinator, the bridge and the day store.
    pub fn new(audio: Arc<AudioCoordinator>, api: Arc<dyn TutorApi>, store: DailyStore) -> Self {
        Self {
            audio,
            api,
            store,
            volume: None,
            board: Mutex::new(FeedbackBoard::new()),
            drills: Mutex::new(HashMap::new()),
        }
    }

    /// Amplitude scale passed to synthesis.
    pub fn with_volume(mut self, volume: Option<f32>) -> Self {
        self.volume = volume;
        self
    }

    /// The audio coordinator this runner drives.
    pub fn audio(&self) -> &Arc<AudioCoordinator> {
        &self.audio
    }

    /// Ask the bridge for an intent and phrase cards, and remember the theme
    /// for today.
    ///
    /// # Errors
    ///
    /// Returns `NetworkFailure`/`InvalidResponse` from the bridge or
    /// `StorageError` if the theme cannot be saved.
    #[instrument(skip(self, ctx))]
    pub async fn resolve_theme(
        &self,
        ctx: &SessionContext,
        theme: &str,
        count: u8,
    ) -> CoreResult<(SessionContext, ThemeResponse)> {
        let theme = theme.trim();
        let request = ThemeRequest {
            language: ctx.language,
            theme: theme.to_string(),
            difficulty: Some(ctx.difficulty),
            count: count.clamp(*PHRASE_COUNT_RANGE.start(), *PHRASE_COUNT_RANGE.end()),
            model: ctx.model.clone(),
        };

        let response = self.api.resolve_theme(&request).await?;
        self.store.set_theme(DailyStore::today(), theme)?;

        info!(
            cards = response.phrase_cards.len(),
            "Theme resolved"
        );

        Ok((ctx.with_theme(theme), response))
    }

    /// Pin `phrase` as today's anchor phrase.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the phrase cannot be saved.
    #[instrument(skip(self, ctx))]
    pub fn pin_anchor(&self, ctx: &SessionContext, phrase: &str) -> CoreResult<SessionContext> {
        let phrase = phrase.trim();
        self.store.set_anchor_phrase(DailyStore::today(), phrase)?;
        debug!("Anchor phrase pinned");
        Ok(ctx.with_anchor(phrase))
    }

    /// Fetch fresh content for `slot`, replacing any drill already running
    /// there, and speak its prompt line.
    ///
    /// A synthesis failure is logged and does not fail the start; the seed is
    /// still usable as text.
    ///
    /// # Errors
    ///
    /// Returns `NetworkFailure`/`InvalidResponse` if the drill content cannot
    /// be fetched.
    #[instrument(skip(self, ctx), fields(slot = %slot))]
    pub async fn start_drill(&self, ctx: &SessionContext, slot: Slot) -> CoreResult<DrillSeed> {
        self.audio.cancel_in_flight(slot);
        lock(&self.board).clear(slot);

        let seed = self.fetch_seed(ctx, slot).await?;
        lock(&self.drills).insert(slot, DrillState::new(seed.clone()));

        info!(line = %seed.display_line(), "Drill started");

        self.audio.stop_all_playback()?;
        if let Err(e) = self.speak(&seed.spoken_line()).await {
            warn!(error = ?e, "Failed to speak drill prompt");
        }

        Ok(seed)
    }

    /// Start recording an attempt for `slot`.
    ///
    /// Any feedback still in flight for the slot's previous attempt is
    /// cancelled first, and playback stops so the tutor's voice is not
    /// captured.
    ///
    /// # Errors
    ///
    /// Returns `DrillNotStarted` if the slot has no drill, or
    /// `PermissionDenied` if the microphone is refused.
    #[instrument(skip(self), fields(slot = %slot))]
    pub async fn begin_attempt(&self, slot: Slot) -> CoreResult<Uuid> {
        if !lock(&self.drills).contains_key(&slot) {
            return Err(drill_not_started(slot));
        }

        let ticket = self.audio.supersede_in_flight(slot);
        if let Some(state) = lock(&self.drills).get_mut(&slot) {
            state.ticket = Some(ticket);
        }

        self.audio.stop_all_playback()?;
        self.audio.start_capture(slot).await
    }

    /// Stop recording for `slot` and run the feedback chain.
    ///
    /// # Errors
    ///
    /// Returns `Superseded` (silent) if a newer attempt started meanwhile,
    /// `NetworkFailure`/`InvalidResponse` if a bridge call failed, or
    /// `DrillNotStarted` if the slot has no drill.
    #[instrument(skip(self, ctx), fields(slot = %slot))]
    pub async fn finish_attempt(&self, ctx: &SessionContext, slot: Slot) -> CoreResult<AttemptOutcome> {
        match self.stop_attempt(slot).await? {
            Some(attempt) => self.submit_attempt(ctx, attempt).await,
            None => Ok(AttemptOutcome::Empty),
        }
    }

    /// Stop recording for `slot` without submitting anything.
    ///
    /// Callers that run the feedback chain in the background stop the
    /// capture first, so a later `begin_attempt` cannot race the stop.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError` if the microphone cannot be released, or
    /// `DrillNotStarted` if the slot has no drill.
    #[instrument(skip(self), fields(slot = %slot))]
    pub async fn stop_attempt(&self, slot: Slot) -> CoreResult<Option<PendingAttempt>> {
        let Some(clip) = self.audio.stop_capture(slot).await? else {
            debug!("Empty capture, nothing to submit");
            return Ok(None);
        };

        let ticket = lock(&self.drills)
            .get(&slot)
            .ok_or_else(|| drill_not_started(slot))?
            .ticket
            .clone();
        let ticket = match ticket {
            Some(ticket) => ticket,
            None => self.audio.supersede_in_flight(slot),
        };

        Ok(Some(PendingAttempt { clip, ticket }))
    }

    /// Transcribe a stopped attempt and fetch feedback (or the next review
    /// line) under the ticket it was recorded with.
    ///
    /// # Errors
    ///
    /// Same as [`DrillRunner::finish_attempt`].
    #[instrument(skip(self, ctx, attempt), fields(slot = %attempt.slot(), bytes = attempt.clip.len()))]
    pub async fn submit_attempt(
        &self,
        ctx: &SessionContext,
        attempt: PendingAttempt,
    ) -> CoreResult<AttemptOutcome> {
        let PendingAttempt { clip, ticket } = attempt;
        let slot = ticket.slot();

        let seed = lock(&self.drills)
            .get(&slot)
            .map(|state| state.seed.clone())
            .ok_or_else(|| drill_not_started(slot))?;

        self.show(&ticket, FeedbackState::Pending { transcript: None });

        let transcription = self
            .settle(&ticket, ticket.run(self.api.transcribe(&clip)).await)?;
        let transcript = transcription.transcription.trim().to_string();

        if transcript.is_empty() {
            self.show(
                &ticket,
                FeedbackState::Failed {
                    message: UNHEARD_MESSAGE.to_string(),
                },
            );
            return Ok(AttemptOutcome::Unheard);
        }

        self.show(
            &ticket,
            FeedbackState::Pending {
                transcript: Some(transcript.clone()),
            },
        );
        self.update_if_current(&ticket, |state| {
            state.last_transcript = Some(transcript.clone());
            state.last_segments = transcription.segments.clone();
        });

        info!(transcript = %transcript, "Attempt transcribed");

        match seed {
            DrillSeed::Review { .. } => self.review_turn(ctx, &ticket, transcript).await,
            seed => {
                let feedback = self
                    .settle(&ticket, ticket.run(self.drill_feedback(ctx, &seed, &transcript)).await)?;
                self.show(
                    &ticket,
                    FeedbackState::Ready {
                        transcript: transcript.clone(),
                        feedback: feedback.feedback.clone(),
                        variant: feedback.variant().map(str::to_string),
                    },
                );
                Ok(AttemptOutcome::Feedback {
                    transcript,
                    feedback,
                })
            }
        }
    }

    /// Speak the slot's latest feedback again, interrupting whatever plays.
    ///
    /// Returns `false` when there is no finished feedback to replay.
    ///
    /// # Errors
    ///
    /// Returns `NetworkFailure` if synthesis fails.
    #[instrument(skip(self), fields(slot = %slot))]
    pub async fn replay_feedback(&self, slot: Slot) -> CoreResult<bool> {
        let text = match lock(&self.board).get(slot) {
            Some(FeedbackState::Ready { feedback, .. }) => feedback.clone(),
            _ => return Ok(false),
        };

        self.audio.stop_all_playback()?;
        self.speak(&text).await?;
        Ok(true)
    }

    /// Grammar, prosody and re-record notes for the slot's last transcript.
    ///
    /// Returns `None` when nothing has been transcribed for the slot yet.
    ///
    /// # Errors
    ///
    /// Returns `NetworkFailure`/`InvalidResponse` from the bridge.
    #[instrument(skip(self, ctx), fields(slot = %slot))]
    pub async fn layered_feedback(
        &self,
        ctx: &SessionContext,
        slot: Slot,
    ) -> CoreResult<Option<FeedbackReport>> {
        let request = {
            let drills = lock(&self.drills);
            let Some(state) = drills.get(&slot) else {
                return Ok(None);
            };
            let Some(transcript) = state.last_transcript.clone() else {
                return Ok(None);
            };
            FeedbackRequest {
                transcript,
                segments: state.last_segments.clone(),
                target_language: ctx.language,
            }
        };

        let report = self.api.feedback(&request).await?;
        debug!(
            grammar = report.grammar_notes.len(),
            prosody = report.prosody_notes.len(),
            rerecord = report.rerecord_targets.len(),
            "Layered feedback received"
        );
        Ok(Some(report))
    }

    /// Feedback currently displayed for `slot`.
    pub fn feedback(&self, slot: Slot) -> Option<FeedbackState> {
        lock(&self.board).get(slot).cloned()
    }

    /// Seed of the drill running in `slot`.
    pub fn seed(&self, slot: Slot) -> Option<DrillSeed> {
        lock(&self.drills).get(&slot).map(|state| state.seed.clone())
    }

    /// Review dialog so far and the attempt number for the current agent line.
    pub fn review_progress(&self) -> Option<(usize, u32)> {
        lock(&self.drills)
            .get(&Slot::Review)
            .map(|state| (state.history.len(), state.attempt))
    }

    async fn fetch_seed(&self, ctx: &SessionContext, slot: Slot) -> CoreResult<DrillSeed> {
        let request = DrillStartRequest {
            theme: ctx.theme_or_default().to_string(),
            anchor_phrase: ctx.anchor_phrase.clone(),
            difficulty: ctx.difficulty,
            language: ctx.language,
            model: ctx.model.clone(),
        };

        let seed = match slot {
            Slot::Shadow => DrillSeed::Shadow(self.api.shadow_start(&request).await?),
            Slot::Substitution => {
                DrillSeed::Substitution(self.api.substitution_start(&request).await?)
            }
            Slot::Expansion => DrillSeed::Expansion(self.api.expansion_start(&request).await?),
            Slot::Review => {
                let start = self
                    .api
                    .review_start(&ReviewStartRequest {
                        theme: request.theme,
                        difficulty: request.difficulty,
                        language: request.language,
                        model: request.model,
                    })
                    .await?;
                DrillSeed::Review {
                    opening: start.opening,
                }
            }
        };

        Ok(seed)
    }

    async fn drill_feedback(
        &self,
        ctx: &SessionContext,
        seed: &DrillSeed,
        transcript: &str,
    ) -> CoreResult<DrillFeedback> {
        let transcript = transcript.to_string();
        match seed {
            DrillSeed::Shadow(start) => {
                self.api
                    .shadow_feedback(&ShadowFeedbackRequest {
                        reference: start.sentence.clone(),
                        transcript,
                        target_language: ctx.language,
                    })
                    .await
            }
            DrillSeed::Substitution(start) => {
                self.api
                    .substitution_feedback(&SubstitutionFeedbackRequest {
                        base_sentence: start.base_sentence.clone(),
                        transcript,
                        slots: start.slots.clone(),
                        target_language: ctx.language,
                    })
                    .await
            }
            DrillSeed::Expansion(start) => {
                self.api
                    .expansion_feedback(&ExpansionFeedbackRequest {
                        seed: start.seed.clone(),
                        transcript,
                        scaffolds: start.scaffolds.clone(),
                        target_language: ctx.language,
                    })
                    .await
            }
            DrillSeed::Review { .. } => Err(drill_not_started(seed.slot())),
        }
    }

    async fn review_turn(
        &self,
        ctx: &SessionContext,
        ticket: &RequestTicket,
        transcript: String,
    ) -> CoreResult<AttemptOutcome> {
        let (history, attempt) = {
            let drills = lock(&self.drills);
            let state = drills
                .get(&Slot::Review)
                .ok_or_else(|| drill_not_started(Slot::Review))?;
            (state.history.clone(), state.attempt)
        };

        let request = ReviewTurnRequest {
            theme: ctx.theme_or_default().to_string(),
            difficulty: ctx.difficulty,
            language: ctx.language,
            history,
            user_reply: transcript.clone(),
            attempt,
            model: ctx.model.clone(),
        };

        let turn = match ticket.run(self.api.review_turn(&request)).await {
            Ok(turn) => turn,
            Err(e) => {
                if !e.is_silent() {
                    self.update_if_current(ticket, |state| state.attempt += 1);
                }
                return self.settle(ticket, Err(e));
            }
        };

        let reply = turn.reply.trim().to_string();
        if !self.update_if_current(ticket, |state| state.push_exchange(&transcript, &reply)) {
            return self.settle(ticket, Err(superseded(Slot::Review)));
        }

        self.show(
            ticket,
            FeedbackState::Ready {
                transcript: transcript.clone(),
                feedback: reply.clone(),
                variant: None,
            },
        );

        if let Err(e) = self.speak(&reply).await {
            warn!(error = ?e, "Failed to speak review reply");
        }

        Ok(AttemptOutcome::Reply { transcript, reply })
    }

    async fn speak(&self, text: &str) -> CoreResult<()> {
        let clip = self
            .api
            .synthesize(&SynthesizeRequest {
                text: text.to_string(),
                volume: self.volume,
            })
            .await?;
        self.audio.enqueue_playback(clip)
    }

    fn show(&self, ticket: &RequestTicket, state: FeedbackState) -> bool {
        if !self.audio.is_current(ticket) {
            return false;
        }
        lock(&self.board).apply(ticket, state)
    }

    /// Mark a failed chain on the board unless the failure is a supersession.
    fn settle<T>(&self, ticket: &RequestTicket, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(e) = &result {
            if let Some(message) = e.user_message() {
                self.show(ticket, FeedbackState::Failed { message });
            }
        }
        result
    }

    fn update_if_current(&self, ticket: &RequestTicket, update: impl FnOnce(&mut DrillState)) -> bool {
        if !self.audio.is_current(ticket) {
            return false;
        }
        match lock(&self.drills).get_mut(&ticket.slot()) {
            Some(state) => {
                update(state);
                true
            }
            None => false,
        }
    }
}

#[track_caller]
fn drill_not_started(slot: Slot) -> CoreError {
    CoreError::DrillNotStarted {
        slot,
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn superseded(slot: Slot) -> CoreError {
    CoreError::Superseded {
        slot,
        location: ErrorLocation::from(Location::caller()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| {
        error!("Drill state lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}

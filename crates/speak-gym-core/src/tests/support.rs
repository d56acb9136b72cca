//! In-memory stand-ins for the microphone, the speaker and the tutor bridge.

use crate::{
    CoreError, CoreResult,
    api::*,
    audio::{AudioInput, AudioOutput, CaptureStream, ChunkEncoding, Clip, DeviceHandle, wav},
};

use std::{
    collections::{HashSet, VecDeque},
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

pub(crate) const WEBM_MIME: &str = "audio/webm";

/// Microphone that replays scripted chunks, one script per acquisition.
#[derive(Default)]
pub(crate) struct FakeInput {
    scripts: Mutex<VecDeque<Vec<Vec<u8>>>>,
    deny: AtomicBool,
    stuck: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    acquisitions: AtomicUsize,
}

impl FakeInput {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Chunks delivered by the next acquisition.
    pub(crate) fn script(&self, chunks: Vec<Vec<u8>>) {
        self.scripts.lock().unwrap().push_back(chunks);
    }

    pub(crate) fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    /// Make every device handle refuse to release from now on.
    pub(crate) fn jam(&self) {
        self.stuck.store(true, Ordering::SeqCst);
    }

    /// Device handles acquired and not yet released.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

struct FakeDevice {
    stuck: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

impl DeviceHandle for FakeDevice {
    fn release(&mut self) -> CoreResult<()> {
        if self.stuck.load(Ordering::SeqCst) {
            return Err(CoreError::DeviceError {
                reason: "device did not stop".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AudioInput for FakeInput {
    async fn acquire(&self) -> CoreResult<CaptureStream> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CoreError::PermissionDenied {
                reason: "user dismissed the prompt".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        let chunks = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        for chunk in chunks {
            tx.send(chunk).unwrap();
        }

        Ok(CaptureStream::new(
            Box::new(FakeDevice {
                stuck: Arc::clone(&self.stuck),
                live: Arc::clone(&self.live),
            }),
            rx,
            ChunkEncoding::Container {
                mime: WEBM_MIME.to_string(),
            },
        ))
    }
}

/// Speaker that "plays" each clip by sleeping, tracking overlap.
pub(crate) struct FakeOutput {
    delay: Duration,
    playing: Arc<AtomicUsize>,
    max_playing: AtomicUsize,
    started: Mutex<Vec<Uuid>>,
    finished: Mutex<Vec<Uuid>>,
    failing: Mutex<HashSet<Uuid>>,
}

impl FakeOutput {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            playing: Arc::new(AtomicUsize::new(0)),
            max_playing: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn fail(&self, clip: &Clip) {
        self.failing.lock().unwrap().insert(clip.id());
    }

    pub(crate) fn started(&self) -> Vec<Uuid> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn finished(&self) -> Vec<Uuid> {
        self.finished.lock().unwrap().clone()
    }

    pub(crate) fn max_playing(&self) -> usize {
        self.max_playing.load(Ordering::SeqCst)
    }

    pub(crate) fn playing(&self) -> usize {
        self.playing.load(Ordering::SeqCst)
    }
}

struct PlayingGuard(Arc<AtomicUsize>);

impl Drop for PlayingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn play(&self, clip: &Clip) -> CoreResult<()> {
        let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = PlayingGuard(Arc::clone(&self.playing));
        self.max_playing.fetch_max(now, Ordering::SeqCst);
        self.started.lock().unwrap().push(clip.id());

        if self.failing.lock().unwrap().contains(&clip.id()) {
            return Err(CoreError::PlaybackFailure {
                clip_id: clip.id(),
                reason: "undecodable".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        tokio::time::sleep(self.delay).await;
        self.finished.lock().unwrap().push(clip.id());
        Ok(())
    }
}

/// Short silent WAV clip.
pub(crate) fn silent_wav() -> Clip {
    Clip::wav(wav::encode_f32(&[0.0; 160], 16_000, 1).unwrap())
}

/// Stereo 16-bit WAV whose header claims a 0 Hz sample rate.
pub(crate) fn zero_rate_wav() -> Clip {
    let mut bytes = Vec::with_capacity(48);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&2u16.to_le_bytes()); // channels
    bytes.extend_from_slice(&0u32.to_le_bytes()); // sample rate
    bytes.extend_from_slice(&0u32.to_le_bytes()); // byte rate
    bytes.extend_from_slice(&4u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&4u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 4]);
    Clip::wav(bytes)
}

/// Tutor bridge with canned answers and a call log.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub(crate) transcript: Mutex<String>,
    calls: Mutex<Vec<&'static str>>,
    blocked_transcribes: AtomicUsize,
    pub(crate) transcribe_entered: Notify,
    fail_review: AtomicBool,
    review_requests: Mutex<Vec<ReviewTurnRequest>>,
    synthesized: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn new(transcript: &str) -> Arc<Self> {
        let api = Self::default();
        *api.transcript.lock().unwrap() = transcript.to_string();
        Arc::new(api)
    }

    /// The next transcribe call never completes.
    pub(crate) fn block_next_transcribe(&self) {
        self.blocked_transcribes.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn set_transcript(&self, transcript: &str) {
        *self.transcript.lock().unwrap() = transcript.to_string();
    }

    pub(crate) fn fail_review(&self, fail: bool) {
        self.fail_review.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub(crate) fn review_requests(&self) -> Vec<ReviewTurnRequest> {
        self.review_requests.lock().unwrap().clone()
    }

    pub(crate) fn synthesized(&self) -> Vec<String> {
        self.synthesized.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

fn feedback(text: &str) -> DrillFeedback {
    DrillFeedback {
        feedback: text.to_string(),
        next_variant: None,
        improved_variant: None,
    }
}

fn session(session_id: &str, mode: SessionMode) -> SessionInfo {
    SessionInfo {
        session_id: session_id.to_string(),
        mode,
        turns: 0,
    }
}

#[async_trait]
impl TutorApi for FakeApi {
    async fn health(&self) -> CoreResult<HealthResponse> {
        self.record("health");
        Ok(HealthResponse {
            status: "ok".to_string(),
        })
    }

    async fn transcribe(&self, _clip: &Clip) -> CoreResult<TranscribeResponse> {
        self.record("transcribe");
        self.transcribe_entered.notify_one();

        let blocked = self
            .blocked_transcribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if blocked {
            std::future::pending::<()>().await;
        }

        Ok(TranscribeResponse {
            transcription: self.transcript.lock().unwrap().clone(),
            language: Some("en".to_string()),
            duration: Some(1.0),
            segments: Vec::new(),
        })
    }

    async fn synthesize(&self, request: &SynthesizeRequest) -> CoreResult<Clip> {
        self.record("synthesize");
        self.synthesized.lock().unwrap().push(request.text.clone());
        Ok(silent_wav())
    }

    async fn shadow_start(&self, _request: &DrillStartRequest) -> CoreResult<ShadowStart> {
        self.record("shadow_start");
        Ok(ShadowStart {
            sentence: "Could I get a table for two?".to_string(),
            cue: Some("friendly".to_string()),
        })
    }

    async fn shadow_feedback(&self, _request: &ShadowFeedbackRequest) -> CoreResult<DrillFeedback> {
        self.record("shadow_feedback");
        Ok(feedback("Nice rhythm."))
    }

    async fn substitution_start(&self, _request: &DrillStartRequest) -> CoreResult<SubstitutionStart> {
        self.record("substitution_start");
        Ok(SubstitutionStart {
            base_sentence: "I'd like a [drink] with my [meal].".to_string(),
            slots: vec![
                SubstitutionSlot {
                    label: "drink".to_string(),
                    options: vec!["coffee".to_string(), "tea".to_string()],
                },
                SubstitutionSlot {
                    label: "meal".to_string(),
                    options: vec!["breakfast".to_string()],
                },
            ],
        })
    }

    async fn substitution_feedback(
        &self,
        _request: &SubstitutionFeedbackRequest,
    ) -> CoreResult<DrillFeedback> {
        self.record("substitution_feedback");
        Ok(DrillFeedback {
            next_variant: Some("I'd like a tea with my breakfast.".to_string()),
            ..feedback("Good swap.")
        })
    }

    async fn expansion_start(&self, _request: &DrillStartRequest) -> CoreResult<ExpansionStart> {
        self.record("expansion_start");
        Ok(ExpansionStart {
            seed: "I went out.".to_string(),
            scaffolds: vec!["add a time".to_string(), "use because".to_string()],
        })
    }

    async fn expansion_feedback(&self, _request: &ExpansionFeedbackRequest) -> CoreResult<DrillFeedback> {
        self.record("expansion_feedback");
        Ok(DrillFeedback {
            improved_variant: Some("I went out last night because I was bored.".to_string()),
            ..feedback("Add a connector.")
        })
    }

    async fn review_start(&self, _request: &ReviewStartRequest) -> CoreResult<ReviewStart> {
        self.record("review_start");
        Ok(ReviewStart {
            opening: "Hi! How was your weekend?".to_string(),
        })
    }

    async fn review_turn(&self, request: &ReviewTurnRequest) -> CoreResult<ReviewTurn> {
        self.record("review_turn");
        self.review_requests.lock().unwrap().push(request.clone());
        if self.fail_review.load(Ordering::SeqCst) {
            return Err(CoreError::NetworkFailure {
                endpoint: "/review/turn".to_string(),
                status: Some(502),
                reason: "llm unavailable".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(ReviewTurn {
            reply: "Sounds fun. What did you eat?".to_string(),
        })
    }

    async fn resolve_theme(&self, request: &ThemeRequest) -> CoreResult<ThemeResponse> {
        self.record("resolve_theme");
        Ok(ThemeResponse {
            language: request.language.code().to_string(),
            theme: request.theme.clone(),
            intent: "Order food politely.".to_string(),
            phrase_cards: (0..request.count)
                .map(|i| PhraseCard {
                    phrase: format!("phrase {}", i),
                    translation: None,
                    cue: None,
                    difficulty: None,
                })
                .collect(),
        })
    }

    async fn feedback(&self, request: &FeedbackRequest) -> CoreResult<FeedbackReport> {
        self.record("feedback");
        Ok(FeedbackReport {
            chunks: vec![request.transcript.clone()],
            grammar_notes: vec!["Use the past tense.".to_string()],
            ..FeedbackReport::default()
        })
    }

    async fn create_session(&self, request: &SessionCreateRequest) -> CoreResult<SessionInfo> {
        self.record("create_session");
        Ok(session("s-1", request.mode))
    }

    async fn get_session(&self, session_id: &str) -> CoreResult<SessionInfo> {
        self.record("get_session");
        Ok(session(session_id, SessionMode::Fluency))
    }

    async fn update_session(&self, session_id: &str, mode: SessionMode) -> CoreResult<SessionInfo> {
        self.record("update_session");
        Ok(session(session_id, mode))
    }

    async fn session_chat(&self, session_id: &str, request: &ChatRequest) -> CoreResult<SessionChatResponse> {
        self.record("session_chat");
        Ok(SessionChatResponse {
            session_id: session_id.to_string(),
            mode: SessionMode::Fluency,
            response: request.prompt.clone(),
            turns: 1,
        })
    }

    async fn chat(&self, request: &ChatRequest) -> CoreResult<ChatResponse> {
        self.record("chat");
        Ok(ChatResponse {
            response: request.prompt.clone(),
        })
    }
}

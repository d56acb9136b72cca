//! `TutorApi` trait and the reqwest-backed `HttpTutorApi`.
//!
//! Every call is a single request/response; nothing is retried here. A
//! failed call is reported to the caller, which lets the learner try again.

use crate::{
    CoreError, CoreResult,
    api::types::*,
    audio::{Clip, WAV_MIME},
};

use std::{panic::Location, time::Duration};

use async_trait::async_trait;
use error_location::ErrorLocation;
use reqwest::{
    Client, Method, RequestBuilder, Response,
    header::CONTENT_TYPE,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

/// Default per-request timeout; LLM-backed calls can take tens of seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Calls into the tutor bridge.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn TutorApi>`.
#[async_trait]
pub trait TutorApi: Send + Sync {
    /// Liveness probe.
    async fn health(&self) -> CoreResult<HealthResponse>;
    /// Speech to text. The clip goes up as multipart field `audio`.
    async fn transcribe(&self, clip: &Clip) -> CoreResult<TranscribeResponse>;
    /// Text to speech; returns a WAV clip.
    async fn synthesize(&self, request: &SynthesizeRequest) -> CoreResult<Clip>;
    /// Seed sentence and delivery cue for shadowing.
    async fn shadow_start(&self, request: &DrillStartRequest) -> CoreResult<ShadowStart>;
    /// Compare a shadowing attempt with the reference.
    async fn shadow_feedback(&self, request: &ShadowFeedbackRequest) -> CoreResult<DrillFeedback>;
    /// Base sentence and slots for substitution.
    async fn substitution_start(&self, request: &DrillStartRequest) -> CoreResult<SubstitutionStart>;
    /// Check a substitution attempt against its slots.
    async fn substitution_feedback(
        &self,
        request: &SubstitutionFeedbackRequest,
    ) -> CoreResult<DrillFeedback>;
    /// Seed line and scaffolds for expansion.
    async fn expansion_start(&self, request: &DrillStartRequest) -> CoreResult<ExpansionStart>;
    /// Judge an expansion attempt.
    async fn expansion_feedback(&self, request: &ExpansionFeedbackRequest) -> CoreResult<DrillFeedback>;
    /// Opening agent line for the review dialog.
    async fn review_start(&self, request: &ReviewStartRequest) -> CoreResult<ReviewStart>;
    /// Next agent line given the learner's reply.
    async fn review_turn(&self, request: &ReviewTurnRequest) -> CoreResult<ReviewTurn>;
    /// Resolve a theme into an intent and phrase cards.
    async fn resolve_theme(&self, request: &ThemeRequest) -> CoreResult<ThemeResponse>;
    /// Layered grammar/prosody notes for a transcript.
    async fn feedback(&self, request: &FeedbackRequest) -> CoreResult<FeedbackReport>;
    /// Open a chat session.
    async fn create_session(&self, request: &SessionCreateRequest) -> CoreResult<SessionInfo>;
    /// Look up a chat session.
    async fn get_session(&self, session_id: &str) -> CoreResult<SessionInfo>;
    /// Switch a chat session's mode.
    async fn update_session(&self, session_id: &str, mode: SessionMode) -> CoreResult<SessionInfo>;
    /// Send a prompt within a session.
    async fn session_chat(&self, session_id: &str, request: &ChatRequest) -> CoreResult<SessionChatResponse>;
    /// Stateless prompt.
    async fn chat(&self, request: &ChatRequest) -> CoreResult<ChatResponse>;
}

/// Tutor bridge reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTutorApi {
    client: Client,
    base_url: String,
}

impl HttpTutorApi {
    /// Build a client for the bridge at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `NetworkFailure` if the HTTP client cannot be constructed.
    #[track_caller]
    #[instrument]
    pub fn new(base_url: &str, timeout: Duration) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::NetworkFailure {
                endpoint: base_url.to_string(),
                status: None,
                reason: format!("Failed to build HTTP client: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Bridge base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> CoreResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = send(path, self.request(Method::POST, path).json(body)).await?;
        decode(path, response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CoreResult<T> {
        let response = send(path, self.request(Method::GET, path)).await?;
        decode(path, response).await
    }
}

async fn send(endpoint: &str, request: RequestBuilder) -> CoreResult<Response> {
    let response = request.send().await.map_err(|e| {
        warn!(endpoint, error = %e, "Request failed");
        CoreError::NetworkFailure {
            endpoint: endpoint.to_string(),
            status: None,
            reason: if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            },
            location: ErrorLocation::from(Location::caller()),
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(endpoint, status = status.as_u16(), "Request rejected");
        return Err(CoreError::NetworkFailure {
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            reason: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            location: ErrorLocation::from(Location::caller()),
        });
    }

    debug!(endpoint, status = status.as_u16(), "Request succeeded");
    Ok(response)
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> CoreResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CoreError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

#[async_trait]
impl TutorApi for HttpTutorApi {
    async fn health(&self) -> CoreResult<HealthResponse> {
        self.get_json("/health").await
    }

    #[instrument(skip(self, clip), fields(clip_id = %clip.id(), bytes = clip.len()))]
    async fn transcribe(&self, clip: &Clip) -> CoreResult<TranscribeResponse> {
        const PATH: &str = "/transcribe";

        let part = Part::bytes(clip.bytes().to_vec())
            .file_name(clip.file_name())
            .mime_str(clip.mime())
            .map_err(|e| CoreError::InvalidResponse {
                endpoint: PATH.to_string(),
                reason: format!("Invalid clip MIME type {}: {}", clip.mime(), e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let form = Form::new().part("audio", part);

        let response = send(PATH, self.request(Method::POST, PATH).multipart(form)).await?;
        decode(PATH, response).await
    }

    #[instrument(skip(self, request), fields(text_len = request.text.len()))]
    async fn synthesize(&self, request: &SynthesizeRequest) -> CoreResult<Clip> {
        const PATH: &str = "/synthesize";

        let response = send(PATH, self.request(Method::POST, PATH).json(request)).await?;
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(WAV_MIME)
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::NetworkFailure {
                endpoint: PATH.to_string(),
                status: None,
                reason: format!("Failed to read audio body: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(Clip::new(bytes.to_vec(), mime))
    }

    async fn shadow_start(&self, request: &DrillStartRequest) -> CoreResult<ShadowStart> {
        self.post_json("/shadow/start", request).await
    }

    async fn shadow_feedback(&self, request: &ShadowFeedbackRequest) -> CoreResult<DrillFeedback> {
        self.post_json("/shadow/feedback", request).await
    }

    async fn substitution_start(&self, request: &DrillStartRequest) -> CoreResult<SubstitutionStart> {
        self.post_json("/substitution/start", request).await
    }

    async fn substitution_feedback(
        &self,
        request: &SubstitutionFeedbackRequest,
    ) -> CoreResult<DrillFeedback> {
        self.post_json("/substitution/feedback", request).await
    }

    async fn expansion_start(&self, request: &DrillStartRequest) -> CoreResult<ExpansionStart> {
        self.post_json("/expansion/start", request).await
    }

    async fn expansion_feedback(&self, request: &ExpansionFeedbackRequest) -> CoreResult<DrillFeedback> {
        self.post_json("/expansion/feedback", request).await
    }

    async fn review_start(&self, request: &ReviewStartRequest) -> CoreResult<ReviewStart> {
        self.post_json("/review/start", request).await
    }

    async fn review_turn(&self, request: &ReviewTurnRequest) -> CoreResult<ReviewTurn> {
        self.post_json("/review/turn", request).await
    }

    async fn resolve_theme(&self, request: &ThemeRequest) -> CoreResult<ThemeResponse> {
        self.post_json("/themes", request).await
    }

    async fn feedback(&self, request: &FeedbackRequest) -> CoreResult<FeedbackReport> {
        self.post_json("/feedback", request).await
    }

    async fn create_session(&self, request: &SessionCreateRequest) -> CoreResult<SessionInfo> {
        self.post_json("/sessions", request).await
    }

    async fn get_session(&self, session_id: &str) -> CoreResult<SessionInfo> {
        self.get_json(&format!("/sessions/{}", session_id)).await
    }

    async fn update_session(&self, session_id: &str, mode: SessionMode) -> CoreResult<SessionInfo> {
        let path = format!("/sessions/{}", session_id);
        let body = serde_json::json!({ "mode": mode });
        let response = send(&path, self.request(Method::PATCH, &path).json(&body)).await?;
        decode(&path, response).await
    }

    async fn session_chat(&self, session_id: &str, request: &ChatRequest) -> CoreResult<SessionChatResponse> {
        self.post_json(&format!("/sessions/{}/chat", session_id), request)
            .await
    }

    async fn chat(&self, request: &ChatRequest) -> CoreResult<ChatResponse> {
        self.post_json("/chat", request).await
    }
}

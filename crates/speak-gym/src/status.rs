//! Learner-facing status output.
//!
//! Everything the learner reads goes through [`StatusReporter`]; tracing
//! output goes to stderr so the two never interleave on one stream.

use crate::{AppResult, command_reader::HELP};

use speak_gym_core::{
    AttemptOutcome, CoreError, DrillSeed, FeedbackState, SessionContext, Slot,
    api::{FeedbackReport, ThemeResponse},
};

use std::io::Write;

use tracing::warn;

/// Writes status lines for the learner.
pub struct StatusReporter<W: Write> {
    out: W,
}

impl<W: Write> StatusReporter<W> {
    /// Report to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print one line.
    pub fn line(&mut self, text: &str) -> AppResult<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }

    /// Print the command list.
    pub fn help(&mut self) -> AppResult<()> {
        self.line(HELP)
    }

    /// Print a failure, unless it is one the learner should never see.
    pub fn error(&mut self, error: &CoreError) -> AppResult<()> {
        match error.user_message() {
            Some(message) => self.line(&format!("! {}", message)),
            None => Ok(()),
        }
    }

    /// Print a resolved theme with numbered phrase cards.
    pub fn theme(&mut self, response: &ThemeResponse) -> AppResult<()> {
        self.line(&format!("Theme: {}", response.theme))?;
        self.line(&format!("Goal: {}", response.intent))?;
        for (i, card) in response.phrase_cards.iter().enumerate() {
            let mut text = format!("  {}. {}", i + 1, card.phrase);
            if let Some(translation) = &card.translation {
                text.push_str(&format!(" ({})", translation));
            }
            if let Some(cue) = &card.cue {
                text.push_str(&format!(" [{}]", cue));
            }
            self.line(&text)?;
        }
        if !response.phrase_cards.is_empty() {
            self.line("Use pin <n> to keep a phrase as today's anchor.")?;
        }
        Ok(())
    }

    /// Print what a freshly started drill asks for.
    pub fn seed(&mut self, seed: &DrillSeed) -> AppResult<()> {
        match seed {
            DrillSeed::Shadow(start) => {
                self.line(&format!("[shadow] Repeat: {}", start.sentence))?;
                if let Some(cue) = &start.cue {
                    self.line(&format!("  Delivery: {}", cue))?;
                }
            }
            DrillSeed::Substitution(start) => {
                self.line(&format!("[substitution] {}", start.base_sentence))?;
                for slot in &start.slots {
                    self.line(&format!("  [{}] {}", slot.label, slot.options.join(" / ")))?;
                }
            }
            DrillSeed::Expansion(start) => {
                self.line(&format!("[expansion] Grow this: {}", start.seed))?;
                for scaffold in &start.scaffolds {
                    self.line(&format!("  - {}", scaffold))?;
                }
            }
            DrillSeed::Review { opening } => {
                self.line(&format!("[review] Tutor: {}", opening))?;
            }
        }
        self.line("Type rec to record, rec again to submit.")
    }

    /// Print the result of a submitted attempt.
    pub fn outcome(&mut self, slot: Slot, outcome: &AttemptOutcome) -> AppResult<()> {
        match outcome {
            AttemptOutcome::Empty => self.line(&format!("[{}] Nothing was recorded.", slot)),
            AttemptOutcome::Unheard => {
                self.line(&format!("[{}] No speech was recognised. Try again.", slot))
            }
            AttemptOutcome::Feedback {
                transcript,
                feedback,
            } => {
                self.line(&format!("[{}] You said: {}", slot, transcript))?;
                self.line(&format!("  {}", feedback.feedback))?;
                if let Some(variant) = feedback.variant() {
                    self.line(&format!("  Try: {}", variant))?;
                }
                Ok(())
            }
            AttemptOutcome::Reply { transcript, reply } => {
                self.line(&format!("[{}] You: {}", slot, transcript))?;
                self.line(&format!("[{}] Tutor: {}", slot, reply))
            }
        }
    }

    /// Print a layered feedback report.
    pub fn report(&mut self, report: &FeedbackReport) -> AppResult<()> {
        let sections = [
            ("Grammar", &report.grammar_notes),
            ("Prosody", &report.prosody_notes),
            ("Re-record", &report.rerecord_targets),
        ];
        for (title, notes) in sections {
            if notes.is_empty() {
                continue;
            }
            self.line(&format!("{}:", title))?;
            for note in notes {
                self.line(&format!("  {}", note.trim()))?;
            }
        }
        Ok(())
    }

    /// Print theme, anchor and each slot's feedback.
    pub fn summary(
        &mut self,
        ctx: &SessionContext,
        feedback: &[(Slot, Option<FeedbackState>)],
    ) -> AppResult<()> {
        self.line(&format!(
            "Theme: {} | Anchor: {} | {} / {}",
            ctx.theme_or_default(),
            ctx.anchor_phrase.as_deref().unwrap_or("-"),
            ctx.difficulty,
            ctx.language
        ))?;
        for (slot, state) in feedback {
            let text = match state {
                None => continue,
                Some(FeedbackState::Pending { transcript: None }) => "waiting for transcript".to_string(),
                Some(FeedbackState::Pending {
                    transcript: Some(transcript),
                }) => format!("\"{}\", waiting for feedback", transcript),
                Some(FeedbackState::Ready { feedback, .. }) => feedback.clone(),
                Some(FeedbackState::Failed { message }) => format!("failed: {}", message),
            };
            self.line(&format!("  {}: {}", slot, text))?;
        }
        Ok(())
    }
}

/// Print through `reporter`, logging if the terminal itself fails.
pub fn report_or_log<W: Write>(
    reporter: &mut StatusReporter<W>,
    print: impl FnOnce(&mut StatusReporter<W>) -> AppResult<()>,
) {
    if let Err(e) = print(reporter) {
        warn!(error = ?e, "Failed to write status");
    }
}

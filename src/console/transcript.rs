//! Transcript output with edge-triggered speaker labels.
//!
//! Transcription arrives as many small fragments.  A `User:` / `Model:`
//! label is written only when the speaker changes, so consecutive fragments
//! of one speaker read as a single line.

use std::io::{self, Write};

use crate::conversation::Role;
use crate::llm::Intent;
use crate::session::UsageTotals;
use crate::tools::BatchOutcome;

pub struct TranscriptPrinter<W: Write> {
    out: W,
    last_speaker: Option<Role>,
}

impl TranscriptPrinter<Box<dyn Write + Send>> {
    /// Printer writing to stdout.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_speaker: None,
        }
    }

    /// Write one transcription fragment, preceded by a label on a speaker
    /// change.
    pub fn transcript(&mut self, role: Role, text: &str) -> io::Result<()> {
        if self.last_speaker != Some(role) {
            let label = match role {
                Role::User => "User",
                Role::Model => "Model",
            };
            write!(self.out, "\n{label}: ")?;
            self.last_speaker = Some(role);
        }
        write!(self.out, "{text}")?;
        self.out.flush()
    }

    /// Show what a tool batch produced.  The next fragment gets a fresh
    /// label.
    pub fn tool_outcome(&mut self, outcome: &BatchOutcome) -> io::Result<()> {
        let Some(text) = outcome.display_text() else {
            return Ok(());
        };
        writeln!(self.out, "\n[tools: {}] {text}", outcome.status())?;
        self.last_speaker = None;
        self.out.flush()
    }

    /// The routed intent of the last user utterance.
    pub fn intent(&mut self, intent: Intent) -> io::Result<()> {
        writeln!(self.out, "\n[intent: {}]", intent.label())?;
        self.last_speaker = None;
        self.out.flush()
    }

    /// End-of-session token totals.
    pub fn usage_summary(&mut self, totals: &UsageTotals) -> io::Result<()> {
        writeln!(
            self.out,
            "\n[session] {} turns, tokens in={} out={} thinking={} total={}",
            totals.turns,
            totals.prompt_tokens,
            totals.response_tokens,
            totals.thinking_tokens,
            totals.total()
        )?;
        self.last_speaker = None;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn printed(printer: TranscriptPrinter<Vec<u8>>) -> String {
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn label_only_on_speaker_change() {
        let mut p = TranscriptPrinter::new(Vec::new());
        p.transcript(Role::User, "what's the").unwrap();
        p.transcript(Role::User, " weather").unwrap();
        p.transcript(Role::Model, "Sunny").unwrap();
        p.transcript(Role::Model, ", 21 degrees.").unwrap();
        p.transcript(Role::User, "thanks").unwrap();

        assert_eq!(
            printed(p),
            "\nUser: what's the weather\nModel: Sunny, 21 degrees.\nUser: thanks"
        );
    }

    #[test]
    fn tool_outcome_resets_label() {
        let mut p = TranscriptPrinter::new(Vec::new());
        p.transcript(Role::Model, "One moment").unwrap();
        p.tool_outcome(&BatchOutcome::NeedsMoreInput {
            pending: BTreeMap::from([(
                "weather".to_string(),
                crate::tools::PendingParamSet {
                    missing: vec!["city".into()],
                    args: Default::default(),
                },
            )]),
            deferred: Vec::new(),
        })
        .unwrap();
        p.transcript(Role::Model, "Which city?").unwrap();

        assert_eq!(
            printed(p),
            "\nModel: One moment\n[tools: needs_more_input] weather needs city\n\nModel: Which city?"
        );
    }

    #[test]
    fn empty_outcome_prints_nothing() {
        let mut p = TranscriptPrinter::new(Vec::new());
        p.tool_outcome(&BatchOutcome::Empty).unwrap();
        assert!(printed(p).is_empty());
    }

    #[test]
    fn usage_summary_line() {
        let mut p = TranscriptPrinter::new(Vec::new());
        p.usage_summary(&UsageTotals {
            turns: 2,
            prompt_tokens: 30,
            response_tokens: 12,
            thinking_tokens: 3,
        })
        .unwrap();
        assert_eq!(
            printed(p),
            "\n[session] 2 turns, tokens in=30 out=12 thinking=3 total=45\n"
        );
    }

    #[test]
    fn intent_line_resets_label() {
        let mut p = TranscriptPrinter::new(Vec::new());
        p.transcript(Role::User, "open settings").unwrap();
        p.intent(Intent::Navigation).unwrap();
        p.transcript(Role::Model, "Opening.").unwrap();
        assert_eq!(
            printed(p),
            "\nUser: open settings\n[intent: navigation]\n\nModel: Opening."
        );
    }
}

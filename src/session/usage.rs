//! Token usage accounting.
//!
//! The service reports usage several times per turn; the last report of a
//! turn is the one that counts.  [`UsageTracker::finish_turn`] folds it
//! into the running totals.

use super::protocol::UsageMetadata;

/// Cumulative token counts for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub turns: u64,
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub thinking_tokens: u64,
}

impl UsageTotals {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.response_tokens + self.thinking_tokens
    }
}

#[derive(Debug, Default)]
pub struct UsageTracker {
    current: Option<UsageMetadata>,
    totals: UsageTotals,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the latest report for the running turn.
    pub fn record(&mut self, usage: UsageMetadata) {
        self.current = Some(usage);
    }

    /// Close the running turn.  Returns the turn's usage, or `None` when the
    /// service reported nothing for it.
    pub fn finish_turn(&mut self) -> Option<UsageMetadata> {
        let usage = self.current.take()?;
        self.totals.turns += 1;
        self.totals.prompt_tokens += usage.prompt_token_count;
        self.totals.response_tokens += usage.response_token_count;
        self.totals.thinking_tokens += usage.thoughts_token_count;

        log::info!(
            "session: turn {} tokens in={} out={} thinking={} (session total {})",
            self.totals.turns,
            usage.prompt_token_count,
            usage.response_token_count,
            usage.thoughts_token_count,
            self.totals.total()
        );
        Some(usage)
    }

    pub fn totals(&self) -> UsageTotals {
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u64, response: u64) -> UsageMetadata {
        UsageMetadata {
            prompt_token_count: prompt,
            response_token_count: response,
            ..UsageMetadata::default()
        }
    }

    #[test]
    fn last_report_of_a_turn_wins() {
        let mut t = UsageTracker::new();
        t.record(usage(10, 1));
        t.record(usage(12, 40));
        assert_eq!(t.finish_turn(), Some(usage(12, 40)));

        let totals = t.totals();
        assert_eq!(totals.turns, 1);
        assert_eq!(totals.prompt_tokens, 12);
        assert_eq!(totals.response_tokens, 40);
    }

    #[test]
    fn turn_without_report_is_not_counted() {
        let mut t = UsageTracker::new();
        assert!(t.finish_turn().is_none());
        assert_eq!(t.totals(), UsageTotals::default());
    }

    #[test]
    fn totals_accumulate() {
        let mut t = UsageTracker::new();
        t.record(usage(5, 5));
        t.finish_turn();
        t.record(UsageMetadata {
            thoughts_token_count: 3,
            ..usage(7, 2)
        });
        t.finish_turn();
        assert_eq!(t.totals().total(), 22);
        assert_eq!(t.totals().turns, 2);
    }
}

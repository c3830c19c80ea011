//! Inference of missing tool arguments from conversation history.
//!
//! The engine asks a [`ParamExtractor`] for every required parameter the
//! model left empty.  [`SubstringExtractor`] is the default strategy; it is
//! naive and can be swapped without touching the engine.

use crate::conversation::{ConversationHistory, Role};

/// Strategy for inferring one parameter value from history.
pub trait ParamExtractor: Send + Sync {
    /// Return an inferred value for `param`, or `None` when it stays missing.
    fn extract(&self, param: &str, history: &ConversationHistory) -> Option<String>;
}

/// Scans user turns newest-first.  For each turn the text parts are joined
/// with a space and lower-cased; if the lower-cased parameter name occurs,
/// the trimmed text after its first occurrence is the value.  An occurrence
/// with nothing after it does not count and the scan moves to older turns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringExtractor;

impl ParamExtractor for SubstringExtractor {
    fn extract(&self, param: &str, history: &ConversationHistory) -> Option<String> {
        let needle = param.to_lowercase();
        if needle.is_empty() {
            return None;
        }

        history
            .turns()
            .iter()
            .rev()
            .filter(|turn| turn.role == Role::User)
            .find_map(|turn| {
                let content = turn.joined_text().to_lowercase();
                let (_, tail) = content.split_once(needle.as_str())?;
                let tail = tail.trim();
                (!tail.is_empty()).then(|| tail.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationTurn;

    fn history(turns: &[(Role, &str)]) -> ConversationHistory {
        ConversationHistory::from_turns(
            turns
                .iter()
                .map(|(role, text)| ConversationTurn::text(*role, *text))
                .collect(),
        )
    }

    #[test]
    fn takes_text_after_parameter_name() {
        let h = history(&[(Role::User, "weather in rome please today")]);
        assert_eq!(
            SubstringExtractor.extract("please", &h).as_deref(),
            Some("today")
        );
    }

    #[test]
    fn absent_name_is_missing() {
        let h = history(&[(Role::User, "weather in Rome please")]);
        assert!(SubstringExtractor.extract("location", &h).is_none());
    }

    #[test]
    fn matching_is_case_insensitive_and_lowercases_value() {
        let h = history(&[(Role::User, "My Location is Surat, India")]);
        assert_eq!(
            SubstringExtractor.extract("location", &h).as_deref(),
            Some("is surat, india")
        );
    }

    #[test]
    fn model_turns_are_ignored() {
        let h = history(&[
            (Role::User, "hello"),
            (Role::Model, "which coin bitcoin or ether?"),
        ]);
        assert!(SubstringExtractor.extract("coin", &h).is_none());
    }

    #[test]
    fn newest_user_turn_wins() {
        let h = history(&[
            (Role::User, "topic cooking"),
            (Role::Model, "ok"),
            (Role::User, "topic running"),
        ]);
        assert_eq!(SubstringExtractor.extract("topic", &h).as_deref(), Some("running"));
    }

    #[test]
    fn empty_tail_continues_with_older_turns() {
        let h = history(&[(Role::User, "coin dogecoin"), (Role::User, "what coin")]);
        assert_eq!(SubstringExtractor.extract("coin", &h).as_deref(), Some("dogecoin"));
    }

    #[test]
    fn multi_part_turns_are_joined_with_a_space() {
        let mut h = ConversationHistory::new();
        h.push_text(Role::User, "category");
        h.close_turn();
        let mut turns = h.turns().to_vec();
        turns[0]
            .parts
            .push(crate::conversation::Part::Text("sports".into()));
        let h = ConversationHistory::from_turns(turns);

        assert_eq!(SubstringExtractor.extract("category", &h).as_deref(), Some("sports"));
    }
}

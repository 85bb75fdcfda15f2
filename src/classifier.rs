//! Regex-based triage of review comments.
//!
//! Pattern groups are checked in a fixed order and the first group with any
//! matching pattern decides the verdict. Keywords only match whole words.

use std::sync::LazyLock;

use regex::RegexSet;

use crate::data::{ActionType, Classification, Severity};

struct PatternGroup {
    patterns: RegexSet,
    verdict: Classification,
}

impl PatternGroup {
    fn new(patterns: &[&str], action_type: ActionType, severity: Severity) -> Self {
        Self {
            patterns: RegexSet::new(patterns).expect("classifier patterns are valid regexes"),
            verdict: Classification::actionable(action_type, severity),
        }
    }
}

static GROUPS: LazyLock<[PatternGroup; 5]> = LazyLock::new(|| {
    [
        PatternGroup::new(
            &[
                r"\b(bug|error|fix|broken|issue|problem|wrong)\b",
                r"\b(security|vulnerability|exploit|dangerous)\b",
                r"\b(performance|slow|inefficient|optimize)\b",
                r"\b(memory leak|deadlock|race condition)\b",
            ],
            ActionType::FixRequired,
            Severity::High,
        ),
        PatternGroup::new(
            &[
                r"\b(should|must|need to|required)\b",
                r"\b(refactor|restructure|cleanup)\b",
                r"\b(test|testing)\b",
                r"\b(documentation|docs|explain)\b",
                r"\b(style|format|convention)\b",
            ],
            ActionType::ImprovementNeeded,
            Severity::Medium,
        ),
        PatternGroup::new(
            &[
                r"\b(consider|suggest|might|could|perhaps)\b",
                r"\b(improvement|enhancement|better)\b",
                r"\b(question|clarification|understand)\b",
                r"\bnaming\b",
            ],
            ActionType::Suggestion,
            Severity::Low,
        ),
        PatternGroup::new(
            &[
                r"\?",
                r"\b(why|how|what|when|where|which)\b",
                r"\b(can|could|would) you\b",
            ],
            ActionType::Question,
            Severity::Medium,
        ),
        PatternGroup::new(
            &[
                r"\b(please|add|remove|change|update|modify)\b",
                r"\b(implement|create|build|develop)\b",
            ],
            ActionType::Request,
            Severity::Medium,
        ),
    ]
});

/// Classify a comment body. Empty or missing bodies are never actionable.
pub fn classify(body: Option<&str>) -> Classification {
    let Some(body) = body.filter(|b| !b.trim().is_empty()) else {
        return Classification::NOT_ACTIONABLE;
    };

    let text = body.to_lowercase();
    GROUPS
        .iter()
        .find(|group| group.patterns.is_match(&text))
        .map_or(Classification::NOT_ACTIONABLE, |group| group.verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn verdict(body: &str) -> Option<(ActionType, Severity)> {
        classify(Some(body)).verdict()
    }

    #[test]
    fn test_missing_and_empty_bodies() {
        assert_eq!(classify(None), Classification::NOT_ACTIONABLE);
        assert_eq!(classify(Some("")), Classification::NOT_ACTIONABLE);
        assert_eq!(classify(Some("   \n\t")), Classification::NOT_ACTIONABLE);
    }

    #[test]
    fn test_high_severity() {
        assert_eq!(
            verdict("this is broken"),
            Some((ActionType::FixRequired, Severity::High))
        );
        assert_eq!(
            verdict("Possible RACE CONDITION here"),
            Some((ActionType::FixRequired, Severity::High))
        );
        assert_eq!(
            verdict("Memory leak when the buffer grows"),
            Some((ActionType::FixRequired, Severity::High))
        );
    }

    #[test]
    fn test_high_beats_question_mark() {
        assert_eq!(
            verdict("Is this a security hole?"),
            Some((ActionType::FixRequired, Severity::High))
        );
    }

    #[test]
    fn test_medium_before_question_and_request() {
        assert_eq!(
            verdict("Could you add a test for this?"),
            Some((ActionType::ImprovementNeeded, Severity::Medium))
        );
        assert_eq!(
            verdict("We need to refactor this module"),
            Some((ActionType::ImprovementNeeded, Severity::Medium))
        );
    }

    #[test]
    fn test_low_severity() {
        assert_eq!(
            verdict("Maybe consider a different name"),
            Some((ActionType::Suggestion, Severity::Low))
        );
        assert_eq!(
            verdict("naming nit"),
            Some((ActionType::Suggestion, Severity::Low))
        );
    }

    #[test]
    fn test_question_only() {
        assert_eq!(
            classify(Some("What does this do?")),
            Classification::actionable(ActionType::Question, Severity::Medium)
        );
        assert_eq!(
            verdict("why not inline it"),
            Some((ActionType::Question, Severity::Medium))
        );
    }

    #[test]
    fn test_request() {
        assert_eq!(
            verdict("Please rename the variable"),
            Some((ActionType::Request, Severity::Medium))
        );
        assert_eq!(
            verdict("add a changelog entry"),
            Some((ActionType::Request, Severity::Medium))
        );
    }

    #[test]
    fn test_not_actionable() {
        assert_eq!(classify(Some("lgtm")), Classification::NOT_ACTIONABLE);
        assert_eq!(classify(Some("Nice work 🎉")), Classification::NOT_ACTIONABLE);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "prefix" contains "fix", "latest" contains "test"
        assert_eq!(classify(Some("prefix latest")), Classification::NOT_ACTIONABLE);
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(body in ".{0,200}") {
            prop_assert_eq!(classify(Some(body.as_str())), classify(Some(body.as_str())));
        }

        #[test]
        fn prop_high_keyword_wins(prefix in "[a-z ]{0,40}", suffix in "[a-z ?]{0,40}") {
            let body = format!("{prefix} broken {suffix}?");
            prop_assert_eq!(
                classify(Some(body.as_str())).verdict(),
                Some((ActionType::FixRequired, Severity::High))
            );
        }

        #[test]
        fn prop_actionable_always_has_verdict(body in ".{0,200}") {
            let c = classify(Some(body.as_str()));
            prop_assert_eq!(c.actionable, c.verdict().is_some());
        }
    }
}

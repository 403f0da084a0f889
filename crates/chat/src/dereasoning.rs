//! Strips internal agent-reasoning lines before text is persisted to
//! Memory or re-injected into a prompt — spec.md §4.10.

use std::sync::LazyLock;

use regex::RegexSet;

static REASONING_MARKERS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"^Now I need to",
        r"^I(?:'ve| have) completed Phase",
        r"\[FINDING:",
        r"^Phase \d+:",
    ])
    .unwrap()
});

pub fn is_reasoning_line(line: &str) -> bool {
    REASONING_MARKERS.is_match(line.trim_start())
}

/// Removes every line matching a reasoning marker, keeping the rest in
/// order. Used both when persisting an assistant turn to Memory and when
/// filtering memory snippets re-injected into a prompt (the de-reasoning
/// filter), so feedback loops can't reinforce the agent's own scratch
/// narration.
pub fn strip_reasoning_lines(text: &str) -> String {
    text.lines().filter(|line| !is_reasoning_line(line)).collect::<Vec<_>>().join("\n")
}

/// A snippet is kept only if none of its lines look like reasoning
/// narration — applied to memory search results before they're injected
/// back into a prompt.
pub fn passes_dereasoning_filter(snippet: &str) -> bool {
    !snippet.lines().any(is_reasoning_line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_now_i_need_to_lines() {
        let text = "Here is the answer.\nNow I need to check the calendar.\nDone.";
        let stripped = strip_reasoning_lines(text);
        assert_eq!(stripped, "Here is the answer.\nDone.");
    }

    #[test]
    fn strips_phase_completion_markers() {
        let text = "I've completed Phase 2: research\nFinal summary here.";
        let stripped = strip_reasoning_lines(text);
        assert_eq!(stripped, "Final summary here.");
    }

    #[test]
    fn strips_finding_tags() {
        let text = "some text\n[FINDING: bug in parser]\nmore text";
        let stripped = strip_reasoning_lines(text);
        assert_eq!(stripped, "some text\nmore text");
    }

    #[test]
    fn leaves_clean_text_untouched() {
        let text = "Just a normal reply with no markers.";
        assert_eq!(strip_reasoning_lines(text), text);
    }

    #[test]
    fn dereasoning_filter_rejects_snippet_with_marker() {
        assert!(!passes_dereasoning_filter("Phase 3: wrap up"));
        assert!(passes_dereasoning_filter("The meeting is at 3pm."));
    }
}

//! Keyword prefilter: the cheap admission test in front of the paid
//! classifier. Recall-biased: the term list is broad so genuinely
//! newsworthy reports are not filtered out; precision is the LLM's job.
//! Deterministic, no external calls.

use regex::Regex;
use std::sync::OnceLock;

/// Terms that indicate potentially newsworthy content.
const NEWSWORTHY_TERMS: &[&str] = &[
    "fraud",
    "waste",
    "abuse",
    "criminal",
    "investigation",
    "misconduct",
    "mismanagement",
    "violation",
    "deficiency",
    "failure",
    "breach",
    "unauthorized",
    "improper",
    "illegal",
    "theft",
    "embezzlement",
    "kickback",
    "bribery",
    "corruption",
    "whistleblower",
    "substantiated",
];

fn dollar_magnitude_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\$\s*\d+(?:[.,]\d+)*\s*(?:million|billion|m\b|b\b)")
            .expect("dollar magnitude regex is valid")
    })
}

/// Case-insensitive admission test over title + abstract. Returns the
/// first matching term for logging, or `None` to reject.
pub fn keyword_match(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    for term in NEWSWORTHY_TERMS {
        if lower.contains(term) {
            return Some(term);
        }
    }
    if dollar_magnitude_re().is_match(text) {
        return Some("dollar-magnitude");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_case_insensitive() {
        assert_eq!(keyword_match("Major FRAUD case uncovered"), Some("fraud"));
        assert_eq!(keyword_match("Whistleblower Revelations"), Some("whistleblower"));
    }

    #[test]
    fn dollar_magnitudes_match() {
        assert!(keyword_match("Audit finds $50 million in questioned costs").is_some());
        assert!(keyword_match("$1.2 billion program shortfall").is_some());
        assert!(keyword_match("a $3M overrun").is_some());
    }

    #[test]
    fn routine_reports_are_rejected() {
        assert_eq!(keyword_match("Annual financial statement audit"), None);
        assert_eq!(keyword_match("Semiannual report to Congress"), None);
        // Small plain dollar amounts are not magnitude words.
        assert_eq!(keyword_match("Reimbursement of $500 in travel costs"), None);
    }

    #[test]
    fn decision_is_stable_across_calls() {
        let text = "Investigation substantiates misuse of $2 million in grant funds";
        let first = keyword_match(text);
        for _ in 0..100 {
            assert_eq!(keyword_match(text), first);
        }
    }
}

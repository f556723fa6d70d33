//! Decoration: the deterministic post-processing step that turns raw
//! generated text into a publishable post: defensive truncation to the
//! soft cap, then a canonical link and up to a few topic hashtags under
//! the hard cap. The link is never dropped; tags are dropped first and
//! generated text is truncated last, with an ellipsis at the cut.
//!
//! Lengths are counted in chars, not bytes.

#[derive(Debug, Clone, Copy)]
pub struct DecorationLimits {
    /// Raw generated text is cut here before any decoration.
    pub soft_cap: usize,
    /// The decorated total never exceeds this.
    pub hard_cap: usize,
    /// At most this many topic hashtags.
    pub max_tags: usize,
}

impl Default for DecorationLimits {
    fn default() -> Self {
        Self {
            soft_cap: 280,
            hard_cap: 300,
            max_tags: 2,
        }
    }
}

const ELLIPSIS: char = '…';
const MAX_TAG_CHARS: usize = 20;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `s` to at most `max_chars` chars, marking the cut with an ellipsis.
pub fn truncate_with_marker(s: &str, max_chars: usize) -> String {
    if char_len(s) <= max_chars {
        return s.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    while out.ends_with(|c: char| c.is_whitespace()) {
        out.pop();
    }
    out.push(ELLIPSIS);
    out
}

/// "health care!" → "#HealthCare". Returns `None` for topics with no
/// alphanumeric content.
pub fn hashtag(topic: &str) -> Option<String> {
    let mut tag = String::from("#");
    for word in topic.split(|c: char| !c.is_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            tag.extend(first.to_uppercase());
            tag.extend(chars);
        }
    }
    if tag.len() == 1 {
        return None;
    }
    Some(truncate_no_marker(&tag, MAX_TAG_CHARS))
}

fn truncate_no_marker(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Build the final post. Postcondition: the result is at most
/// `limits.hard_cap` chars as long as the link itself fits under it.
pub fn decorate(raw: &str, link: &str, topics: &[String], limits: DecorationLimits) -> String {
    let mut text = raw.trim().to_string();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].to_string();
    }

    text = truncate_with_marker(&text, limits.soft_cap);

    let link_part = format!("\n🔗 {link}");
    let text_budget = limits.hard_cap.saturating_sub(char_len(&link_part));
    if char_len(&text) > text_budget {
        text = truncate_with_marker(&text, text_budget);
    }

    let mut post = text;
    post.push_str(&link_part);

    for tag in topics.iter().filter_map(|t| hashtag(t)).take(limits.max_tags) {
        if char_len(&post) + 1 + char_len(&tag) <= limits.hard_cap {
            post.push(' ');
            post.push_str(&tag);
        }
    }

    post
}

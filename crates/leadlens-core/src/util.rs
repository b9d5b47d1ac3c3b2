use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email pattern")
});

/// First email-looking token in the text, if any.
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_REGEX.find(text).map(|m| m.as_str().to_string())
}

/// Top-ranked detected language with its confidence, formatted like
/// `"eng - 0.93"`. None for empty or undecidable text.
pub fn detect_language(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    whatlang::detect(text).map(|info| format!("{} - {:.2}", info.lang().code(), info.confidence()))
}

/// A duration drawn uniformly-ish from `[min, max]`.
///
/// Uses an xorshift step over the system clock rather than pulling in
/// a full RNG crate; jitter does not need statistical quality.
pub fn jitter_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span_ms = (max - min).as_millis() as u64;
    min + Duration::from_millis(rand_ms(span_ms + 1))
}

fn rand_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}

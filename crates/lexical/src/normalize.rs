use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").expect("email regex")
});

const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

/// Lowercase `text`, fold emails and URLs into single alphanumeric tokens and
/// turn every other non-alphanumeric character into a separator.
///
/// `support@cloudsphere.com` becomes `supportatcloudspheredotcom`, so the
/// address is one term instead of three.
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();

    let urls_folded = URL.replace_all(&lowered, |caps: &Captures<'_>| {
        let raw = &caps[0];
        let trimmed = raw.trim_end_matches(URL_TRAILING);
        let tail = &raw[trimmed.len()..];
        format!("{}{tail}", fuse(trimmed))
    });
    let emails_folded = EMAIL.replace_all(&urls_folded, |caps: &Captures<'_>| fuse(&caps[0]));

    let separated: String = emails_folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    separated.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized tokens of at least two characters
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn fuse(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    for ch in raw.chars() {
        match ch {
            '@' => out.push_str("at"),
            '.' => out.push_str("dot"),
            '/' => out.push_str("slash"),
            c if c.is_alphanumeric() => out.push(c),
            _ => {}
        }
    }
    out
}

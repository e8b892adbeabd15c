// Listing content moderation: banned-term list plus link-count heuristic

use lazy_static::lazy_static;
use regex::Regex;

/// Terms that block a listing outright. Lowercase; matching is
/// case-insensitive substring.
const BANNED_TERMS: &[&str] = &[
    "idiota",
    "golpe",
    "urubu do pix",
    "ganhe dinheiro fácil",
    "site-concorrente.com",
    "maldito",
    "desgraça",
];

/// More than this many link tokens marks the text as spam
const MAX_LINK_TOKENS: usize = 2;

lazy_static! {
    static ref LINK_TOKEN_REGEX: Regex = Regex::new(r"(?i)https?://|www\.").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentViolation {
    BannedTerm(String),
    TooManyLinks(usize),
}

impl std::fmt::Display for ContentViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentViolation::BannedTerm(term) => {
                write!(f, "Content contains a blocked term: {}", term)
            },
            ContentViolation::TooManyLinks(count) => {
                write!(f, "Content contains too many links ({})", count)
            },
        }
    }
}

/// Check listing text before it is persisted. Returns the first violation.
pub fn check_content(text: &str) -> Result<(), ContentViolation> {
    let lowered = text.to_lowercase();

    for term in BANNED_TERMS {
        if lowered.contains(term) {
            return Err(ContentViolation::BannedTerm((*term).to_string()));
        }
    }

    let link_count = LINK_TOKEN_REGEX.find_iter(text).count();
    if link_count > MAX_LINK_TOKENS {
        return Err(ContentViolation::TooManyLinks(link_count));
    }

    Ok(())
}

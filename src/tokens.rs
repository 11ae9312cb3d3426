//! Short random tokens used to uniquify generated resource names (statement
//! ids, inline policy names). Injected so tests get deterministic names.

pub trait TokenSource: Send + Sync {
    fn short_token(&self) -> String;
}

/// Production token source: an 8-character nanoid.
pub struct NanoidTokens;

impl TokenSource for NanoidTokens {
    fn short_token(&self) -> String {
        nanoid::nanoid!(8)
    }
}

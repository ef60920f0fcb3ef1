/// Dedup classification for one command identity.
/// Derived on every submission, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    New,
    IdempotentReplay,
    Conflict,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::IdempotentReplay => write!(f, "IDEMPOTENT_REPLAY"),
            Self::Conflict => write!(f, "CONFLICT"),
        }
    }
}

/// Pure function of exactly three inputs; no clock, no store, no other state.
/// Unseen identity is NEW. A seen identity with a matching fingerprint is a
/// harmless replay; anything else under a seen identity is a conflict (a
/// seen identity with no recorded fingerprint cannot be proven identical, so
/// it conflicts).
pub fn classify(
    seen: bool,
    previous_fingerprint: Option<&str>,
    current_fingerprint: &str,
) -> Classification {
    if !seen {
        return Classification::New;
    }
    match previous_fingerprint {
        Some(prev) if prev == current_fingerprint => Classification::IdempotentReplay,
        _ => Classification::Conflict,
    }
}

use super::duration::parse_duration;

/// Shortest retention window an automatic purge will act on (24 hours).
///
/// Unattended runs below this are refused outright rather than clamped.
pub const MIN_AUTO_PURGE_SECS: u64 = 86_400;

/// Whether the configured retention window allows an automatic purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDecision {
    /// Retention is unset or zero. Nothing to do, nothing to report.
    Disabled,
    /// Retention is positive but under [`MIN_AUTO_PURGE_SECS`].
    TooShort,
    /// Purge rows older than this many seconds.
    Eligible(u64),
}

impl RetentionDecision {
    /// Classify a raw retention expression such as `"30d"`.
    pub fn evaluate(expression: Option<&str>) -> Self {
        Self::from_seconds(parse_duration(expression))
    }

    pub fn from_seconds(seconds: u64) -> Self {
        match seconds {
            0 => RetentionDecision::Disabled,
            s if s < MIN_AUTO_PURGE_SECS => RetentionDecision::TooShort,
            s => RetentionDecision::Eligible(s),
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, RetentionDecision::Eligible(_))
    }
}

/// Classification for retry policy.
///
/// Used by the run coordinator to decide whether a failed attempt may be
/// retried after the configured delay.
///
/// # Behavior Summary
///
/// | Class | Consumes retry budget? | Retried? |
/// |-------|------------------------|----------|
/// | `Never` | No | No, the run fails immediately |
/// | `WithBackoff` | Yes | Yes, until the retry limit is exhausted |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad symbol, bad credential, malformed payload.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Transient failure such as a timeout, a dropped connection, HTTP 429
    /// or HTTP 5xx. Another attempt after the retry delay may succeed.
    WithBackoff,
}

impl RetryClass {
    /// Returns true if another attempt may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::WithBackoff)
    }
}

impl std::fmt::Display for RetryClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Never => write!(f, "never"),
            Self::WithBackoff => write!(f, "with_backoff"),
        }
    }
}

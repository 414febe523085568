/// Classification for retry policy.
///
/// Used to determine how the fetcher and the fallback resolver should
/// respond to an error.
///
/// # Behavior Summary
///
/// | Class | Retry Same Request? | Try Next Strategy? |
/// |-------|--------------------|--------------------|
/// | `WithBackoff` | Yes, after an exponentially growing delay | Yes, once attempts are exhausted |
/// | `NextStrategy` | No | Yes |
/// | `Never` | No | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Retry the same request with exponential backoff.
    ///
    /// Used for rate limiting (429) and transport-level failures such as
    /// timeouts and connection resets. The fetcher owns this loop; by the
    /// time an error of this class escapes the fetcher, its attempt budget
    /// is already spent and the resolver moves on to the next strategy.
    WithBackoff,

    /// Abandon this strategy and try the next one in the ordered list.
    ///
    /// Used for hard upstream errors (non-2xx, non-429) and for payloads
    /// that parse but fail schema expectations. Retrying the same request
    /// is pointless, but an alternate sort order or endpoint may succeed.
    NextStrategy,

    /// Terminal - every strategy and every cache tier has been exhausted.
    /// The error surfaces to the caller.
    Never,
}

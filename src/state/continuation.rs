//! Guess whether a chat message was cut by the platform's per-message size cap.
//!
//! The platform splits long input into several messages of at most
//! [`TRANSPORT_MESSAGE_LIMIT`] UTF-16 code units. A fragment at or just below that cap
//! most likely has a tail coming; anything clearly shorter is taken as complete.
//!
//! Known limitation: a complete message that happens to reach the threshold waits for a
//! continuation that never comes (until the merge idle timeout drops it), and a split
//! part that ends a few units short of the threshold is taken as complete, losing the
//! remaining parts of that logical message.

/// Hard per-message cap of the chat platform, in UTF-16 code units.
pub const TRANSPORT_MESSAGE_LIMIT: usize = 4096;
/// Default threshold, a few units below [`TRANSPORT_MESSAGE_LIMIT`].
pub const DEFAULT_CONTINUATION_THRESHOLD: usize = 4090;

/// Length rule flagging fragments that probably have a tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationHeuristic {
    threshold: usize,
}

impl Default for ContinuationHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_CONTINUATION_THRESHOLD)
    }
}

impl ContinuationHeuristic {
    /// Flag fragments of at least `threshold` UTF-16 units.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Configured threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// `true` when `fragment` is long enough to be a truncated part of a longer message.
    ///
    /// ```
    /// use tale_forge_back::state::continuation::ContinuationHeuristic;
    ///
    /// let heuristic = ContinuationHeuristic::default();
    /// assert!(heuristic.expects_more(&"a".repeat(4090)));
    /// assert!(!heuristic.expects_more("Once upon"));
    /// ```
    pub fn expects_more(&self, fragment: &str) -> bool {
        fragment_len(fragment) >= self.threshold
    }
}

/// Length as counted by the platform (UTF-16 code units).
pub fn fragment_len(fragment: &str) -> usize {
    fragment.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_at_threshold_is_a_continuation() {
        let heuristic = ContinuationHeuristic::new(4090);

        assert!(heuristic.expects_more(&"x".repeat(4090)));
        assert!(!heuristic.expects_more(&"x".repeat(4089)));
        assert!(heuristic.expects_more(&"x".repeat(TRANSPORT_MESSAGE_LIMIT)));
    }

    #[test]
    fn short_messages_are_complete() {
        let heuristic = ContinuationHeuristic::default();
        assert!(!heuristic.expects_more(""));
        assert!(!heuristic.expects_more("Once upon"));
    }

    #[test]
    fn length_counts_utf16_units() {
        // Astral-plane characters take two units each.
        let heuristic = ContinuationHeuristic::new(4);
        assert_eq!(fragment_len("🐉🐉"), 4);
        assert!(heuristic.expects_more("🐉🐉"));
        assert!(!heuristic.expects_more("ééé"));
    }
}

//! Request/token accounting.
//!
//! The PDF pipeline hands each call an optional "block" object that tallies
//! how many LLM requests were spent on it and how many tokens they produced.
//! Anything implementing [`UsageSink`] can play that role; [`UsageMetadata`]
//! is the plain accumulator used when there is no richer block type.
//!
//! The sink is borrowed mutably for the duration of a call, so concurrent
//! callers sharing one sink must wrap it (e.g. in a `Mutex`) themselves.

use serde::{Deserialize, Serialize};

/// Receives usage after each successful call.
pub trait UsageSink: Send {
    /// Add `request_count` requests and `tokens_used` tokens to the running totals.
    fn update_metadata(&mut self, request_count: u64, tokens_used: u64);
}

/// Running totals for one block or one batch item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub request_count: u64,
    pub tokens_used: u64,
}

impl UsageSink for UsageMetadata {
    fn update_metadata(&mut self, request_count: u64, tokens_used: u64) {
        self.request_count += request_count;
        self.tokens_used += tokens_used;
    }
}

impl std::ops::AddAssign for UsageMetadata {
    fn add_assign(&mut self, rhs: Self) {
        self.update_metadata(rhs.request_count, rhs.tokens_used);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates() {
        let mut u = UsageMetadata::default();
        u.update_metadata(1, 120);
        u.update_metadata(1, 30);
        assert_eq!(
            u,
            UsageMetadata {
                request_count: 2,
                tokens_used: 150
            }
        );
    }

    #[test]
    fn add_assign_sums_batches() {
        let mut total = UsageMetadata::default();
        total += UsageMetadata {
            request_count: 1,
            tokens_used: 10,
        };
        total += UsageMetadata {
            request_count: 3,
            tokens_used: 5,
        };
        assert_eq!(total.request_count, 4);
        assert_eq!(total.tokens_used, 15);
    }
}

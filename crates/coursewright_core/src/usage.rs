//! Token accounting.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Token usage for one model call, or the running total of a generation.
///
/// Usage only ever grows: totals are built by adding per-call usage, and a
/// provider response without usage contributes [`TokenUsage::default`].
///
/// # Examples
///
/// ```
/// use coursewright_core::TokenUsage;
///
/// let total: TokenUsage = [TokenUsage::new(10, 5), TokenUsage::new(3, 2)].into_iter().sum();
/// assert_eq!(*total.prompt_tokens(), 13);
/// assert_eq!(*total.total_tokens(), 20);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Getters, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens in the prompt/input.
    prompt_tokens: u64,
    /// Tokens in the response/output.
    completion_tokens: u64,
    /// Total tokens as reported by the provider.
    total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage record where total = prompt + completion.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Create a usage record with a provider-reported total.
    ///
    /// Some providers count reasoning or cached tokens in the total only, so
    /// the total is kept as reported rather than recomputed.
    pub fn with_total(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total_tokens.max(prompt_tokens + completion_tokens),
        }
    }

    /// True when nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }

}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), Add::add)
    }
}

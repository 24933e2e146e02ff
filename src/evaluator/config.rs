// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Evaluation limits and cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default maximum expression nesting depth
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 128;

/// Default bound on `repeat()` rounds
pub const DEFAULT_MAX_REPEAT_ITERATIONS: usize = 10_000;

/// Cooperative cancellation signal shared between a host and running evaluations
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every evaluation holding this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Evaluation limits
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Maximum nesting of recursive evaluation calls
    pub max_recursion_depth: usize,
    /// Maximum rounds `repeat()` may run before failing
    pub max_repeat_iterations: usize,
    /// Checked at every recursive evaluation step
    pub cancellation: Option<CancellationToken>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_repeat_iterations: DEFAULT_MAX_REPEAT_ITERATIONS,
            cancellation: None,
        }
    }
}

impl EvaluationConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum recursion depth
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Set the `repeat()` round limit
    pub fn with_max_repeat_iterations(mut self, iterations: usize) -> Self {
        self.max_repeat_iterations = iterations;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

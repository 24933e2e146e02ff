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

//! FHIRPath engine - convenience entry point for repeated evaluation
//!
//! The engine pairs an [`EvaluationContext`] with an LRU cache of parsed
//! expressions, so hosts evaluating the same expression text against many
//! records parse it once.

use crate::ast::ExpressionNode;
use crate::error::Result;
use crate::evaluator::{EvaluationConfig, EvaluationContext, evaluate};
use crate::model::Collection;
use crate::parser::parse;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of parsed expressions kept by the engine
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Keep parsed expressions between calls
    pub enable_ast_cache: bool,
    /// Maximum number of cached expressions; zero disables the cache
    pub max_cache_size: usize,
    /// Limits applied to every evaluation
    pub evaluation: EvaluationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_ast_cache: true,
            max_cache_size: DEFAULT_CACHE_SIZE,
            evaluation: EvaluationConfig::default(),
        }
    }
}

/// Main FHIRPath engine for parsing and evaluating expressions.
///
/// The engine is `Send + Sync`; share it behind an `Arc` to evaluate from
/// several threads.
#[derive(Debug)]
pub struct FhirPathEngine {
    context: EvaluationContext,
    cache: Option<Mutex<LruCache<String, Arc<ExpressionNode>>>>,
}

impl FhirPathEngine {
    /// Create an engine over `context` with the default settings
    pub fn new(context: EvaluationContext) -> Self {
        Self::with_config(context, EngineConfig::default())
    }

    /// Create an engine over `context`; the configured evaluation limits replace the context's
    pub fn with_config(context: EvaluationContext, config: EngineConfig) -> Self {
        let cache = config
            .enable_ast_cache
            .then(|| NonZeroUsize::new(config.max_cache_size))
            .flatten()
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Self {
            context: context.with_config(config.evaluation),
            cache,
        }
    }

    /// The context every evaluation runs in
    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    /// Parse `expression`, reusing a cached AST when one exists
    pub fn parse_cached(&self, expression: &str) -> Result<Arc<ExpressionNode>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(parse(expression)?));
        };

        // One guard for lookup and insert, so concurrent misses share one AST.
        let mut cache = cache.lock();
        if let Some(ast) = cache.get(expression) {
            return Ok(Arc::clone(ast));
        }

        log::debug!("AST cache miss for '{expression}'");
        let ast = Arc::new(parse(expression)?);
        cache.put(expression.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    /// Parse and evaluate `expression` against `root`
    pub fn evaluate(&self, expression: &str, root: impl Into<Collection>) -> Result<Collection> {
        let ast = self.parse_cached(expression)?;
        Ok(evaluate(&ast, root, &self.context)?)
    }

    /// Evaluate an already parsed expression
    pub fn evaluate_ast(&self, ast: &ExpressionNode, root: impl Into<Collection>) -> Result<Collection> {
        Ok(evaluate(ast, root, &self.context)?)
    }

    /// Drop every cached expression
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }

    /// Number of cached expressions
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.lock().len())
    }
}

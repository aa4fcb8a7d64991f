//! The compiler facade.
//!
//! A [`Compiler`] owns the cache, the dependency graph and the worker pool.
//! There is no global instance: create one with [`Compiler::create`] and
//! drop it (or call [`Compiler::dispose`]) when done.
//!
//! # Example
//!
//! ```no_run
//! use vbstudio::{Compiler, CompileOptions, CompilerConfig};
//!
//! let mut compiler = Compiler::create(CompilerConfig::default())?;
//! let result = compiler.compile(
//!     [("Module1", "Dim x As Integer\nx = 2 + 3 * 4")],
//!     &CompileOptions::default(),
//! );
//! assert!(result.success);
//! assert!(result.output.contains("x = (2 + (3 * 4));"));
//! # Ok::<(), vbstudio::PipelineError>(())
//! ```

use crate::cache::{CompilationCache, jit_key};
use crate::deps::{DependencyExtractor, DependencyGraph, PatternExtractor};
use crate::error::{PipelineError, Result};
use crate::unit::CompilationUnit;
use crate::worker::{UnitHandler, WorkerPool, batch_size};
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use vbstudio_compiler::{CompilationResult, Pipeline};
use vbstudio_core::{CompileOptions, CompilerConfig, CompilerError, ContentHash, ErrorCode};

/// Sizes reported by [`Compiler::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerStats {
    pub cache_size: usize,
    pub dependency_graph_size: usize,
    pub worker_count: usize,
}

/// What happens to one unit in a compile request.
enum Plan<'u> {
    Cached(CompilationResult),
    Compile(&'u CompilationUnit),
}

pub struct Compiler {
    config: CompilerConfig,
    pipeline: Pipeline,
    extractor: Box<dyn DependencyExtractor>,
    pool: WorkerPool,
    cache: CompilationCache,
    graph: DependencyGraph,
    disposed: bool,
}

impl Compiler {
    /// Create a compiler with the default dependency extractor, compiling on
    /// `config.workers` threads (the host's CPU count when unset).
    pub fn create(config: CompilerConfig) -> Result<Self> {
        let pipeline = Pipeline::from_config(&config);
        Self::create_with(config, Box::new(PatternExtractor::new()), Arc::new(pipeline))
    }

    /// Create a compiler with a custom extractor and worker-side handler.
    pub fn create_with(
        config: CompilerConfig,
        extractor: Box<dyn DependencyExtractor>,
        handler: Arc<dyn UnitHandler>,
    ) -> Result<Self> {
        let workers = config.workers.unwrap_or_else(num_cpus::get);
        let pool = WorkerPool::new(workers, config.worker_timeout, handler)?;
        info!("compiler created with {} workers", pool.size());

        Ok(Self {
            pipeline: Pipeline::from_config(&config),
            config,
            extractor,
            pool,
            cache: CompilationCache::new(),
            graph: DependencyGraph::new(),
            disposed: false,
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a set of named sources into one result.
    ///
    /// Units whose cached result is still valid are not recompiled. When
    /// every unit is valid the result comes straight from the cache. A later
    /// source with the same name as an earlier one replaces it.
    ///
    /// Never panics and never returns an error: anything that goes wrong at
    /// this level becomes a failed result with one diagnostic.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile<I, K, V>(&mut self, sources: I, options: &CompileOptions) -> CompilationResult
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sources: Vec<(String, String)> = sources
            .into_iter()
            .map(|(id, source)| (id.into(), source.into()))
            .collect();

        match panic::catch_unwind(AssertUnwindSafe(|| self.compile_sources(sources, options))) {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => failed(&error),
            Err(panic) => failed(&PipelineError::Panicked(panic_message(&*panic))),
        }
    }

    fn compile_sources(
        &mut self,
        sources: Vec<(String, String)>,
        options: &CompileOptions,
    ) -> Result<CompilationResult> {
        if self.disposed {
            return Err(PipelineError::Disposed);
        }
        let started = Instant::now();

        let mut units: FxHashMap<String, CompilationUnit> = FxHashMap::default();
        let mut submitted: Vec<String> = Vec::new();
        for (id, source) in sources {
            let unit = CompilationUnit::new(id.clone(), source, self.extractor.as_ref());
            self.graph.insert(&unit);
            if units.insert(id.clone(), unit).is_none() {
                submitted.push(id);
            }
        }
        // Every id is known now, so names spelled in another case can be
        // matched to their units
        for unit in units.values_mut() {
            unit.resolve_dependencies(&self.graph);
            self.graph.insert(unit);
        }

        // The graph outlives this request; keep only ids submitted now
        let schedule: Vec<&CompilationUnit> = self
            .graph
            .topological_order(submitted.iter().map(String::as_str))
            .into_iter()
            .filter_map(|id| units.get(&id))
            .collect();

        let plan: Vec<Plan<'_>> = schedule
            .iter()
            .copied()
            .map(|unit| {
                let cached = if self.cache.is_valid(unit) {
                    self.cache.lookup(unit.id(), unit.hash())
                } else {
                    None
                };
                match cached {
                    Some(result) => Plan::Cached(result.clone().as_cache_hit()),
                    None => Plan::Compile(unit),
                }
            })
            .collect();

        let stale: Vec<&CompilationUnit> = plan
            .iter()
            .filter_map(|step| match step {
                Plan::Compile(unit) => Some(*unit),
                Plan::Cached(_) => None,
            })
            .collect();

        if stale.is_empty() {
            debug!("all {} units valid, reading from cache", schedule.len());
        }

        let mut fresh = self.compile_stale(&stale, options)?;

        let results: Vec<CompilationResult> = plan
            .into_iter()
            .map(|step| match step {
                Plan::Cached(result) => result,
                Plan::Compile(unit) => fresh.remove(unit.id()).unwrap_or_else(|| {
                    let error = CompilerError::unpositioned(
                        ErrorCode::CompilationFailed,
                        format!("no result for unit '{}'", unit.id()),
                    );
                    unit_failure(error)
                }),
            })
            .collect();

        let merged = CompilationResult::merge(results);
        info!(
            "compiled {} units in {:?}: {} cache hits, {} misses, {} errors",
            merged.unit_count,
            started.elapsed(),
            merged.metrics.cache_hits,
            merged.metrics.cache_misses,
            merged.errors.len()
        );
        Ok(merged)
    }

    /// Recompile `stale` units in dependency-ordered batches, caching each
    /// successful result once its batch has finished.
    fn compile_stale(
        &mut self,
        stale: &[&CompilationUnit],
        options: &CompileOptions,
    ) -> Result<FxHashMap<String, CompilationResult>> {
        let mut fresh = FxHashMap::default();
        if stale.is_empty() {
            return Ok(fresh);
        }
        if self.pool.is_disposed() {
            return Err(PipelineError::Disposed);
        }

        let size = batch_size(stale.len(), self.pool.size());
        for (number, batch) in stale.chunks(size).enumerate() {
            debug!("batch {}: {} units", number, batch.len());
            let outcomes = self.pool.compile_batch(batch, options);

            for (unit, outcome) in batch.iter().zip(outcomes) {
                let result = match outcome {
                    Ok(result) => result,
                    Err(error) => {
                        warn!("unit '{}' failed to dispatch: {}", unit.id(), error);
                        unit_failure(CompilerError::from(&error))
                    }
                };
                self.cache.store(unit.id(), unit.hash(), result.clone());
                fresh.insert(unit.id().to_string(), result.as_cache_miss());
            }
        }
        Ok(fresh)
    }

    /// Compile a one-off snippet on the calling thread.
    ///
    /// The cache is consulted by content hash. Only `hot_path` results that
    /// succeed are stored, so cold snippets never fill the cache.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile_jit(&mut self, source: &str, hot_path: bool) -> CompilationResult {
        if self.disposed {
            return failed(&PipelineError::Disposed);
        }

        let hash = ContentHash::of(source);
        let key = jit_key(hash);
        if let Some(cached) = self.cache.lookup(&key, hash) {
            debug!("jit cache hit for {}", key);
            return cached.clone().as_cache_hit();
        }

        let pipeline = self.pipeline;
        let run = AssertUnwindSafe(|| pipeline.run(source, &CompileOptions::jit()));
        let result = match panic::catch_unwind(run) {
            Ok(result) => result,
            Err(panic) => return failed(&PipelineError::Panicked(panic_message(&*panic))),
        };

        if hot_path {
            self.cache.store(key, hash, result.clone());
        }
        result.as_cache_miss()
    }

    /// Fail everything in flight, stop the workers and drop all cached
    /// state. Idempotent; later compiles fail with `DISPOSED`.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pool.dispose();
        self.cache.clear();
        self.graph.clear();
        info!("compiler disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Forget every cached result and the dependency graph.
    pub fn clear_caches(&mut self) {
        self.cache.clear();
        self.graph.clear();
    }

    pub fn stats(&self) -> CompilerStats {
        CompilerStats {
            cache_size: self.cache.len(),
            dependency_graph_size: self.graph.len(),
            worker_count: self.pool.size(),
        }
    }
}

impl Drop for Compiler {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn failed(error: &PipelineError) -> CompilationResult {
    CompilationResult::failure(CompilerError::from(error))
}

/// A failed result standing in for one unit.
fn unit_failure(error: CompilerError) -> CompilationResult {
    let mut result = CompilationResult::failure(error);
    result.unit_count = 1;
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn compiler(workers: usize) -> Compiler {
        Compiler::create(CompilerConfig {
            workers: Some(workers),
            ..CompilerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn end_to_end() {
        let mut compiler = compiler(2);
        let result = compiler.compile(
            [("Module1", "Dim x As Integer\nx = 2 + 3 * 4")],
            &CompileOptions::default(),
        );

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.unit_count, 1);
        assert!(result.output.contains("x = (2 + (3 * 4));"));
        assert_eq!(result.metrics.cache_misses, 1);
        assert_eq!(result.metrics.cache_hits, 0);
    }

    #[test]
    fn second_compile_reuses_valid_units() {
        let mut compiler = compiler(2);
        let sources = [("Module1", "Dim a"), ("Module2", "Dim b"), ("Form1", "Load Form2")];

        let first = compiler.compile(sources, &CompileOptions::default());
        let second = compiler.compile(sources, &CompileOptions::default());

        assert_eq!(first.metrics.cache_misses, 3);
        // Form1 depends on Form2, which was never submitted
        assert_eq!(second.metrics.cache_hits, 2);
        assert_eq!(second.metrics.cache_misses, 1);
        assert_eq!(first.output, second.output);
    }

    #[test]
    fn dependencies_precede_dependents_in_output() {
        let mut compiler = compiler(1);
        let result = compiler.compile(
            [("Form1", "Load Form2\nDim a"), ("Form2", "Dim b")],
            &CompileOptions::default(),
        );
        assert!(result.success);
        assert_eq!(result.output, "let b = null;\n\nLoad(Form2);\nlet a = null;");
    }

    #[test]
    fn dependency_names_ignore_case() {
        let mut compiler = compiler(1);
        let sources = [("Form1", "Load form2\nDim a"), ("Form2", "Dim b")];

        let first = compiler.compile(sources, &CompileOptions::default());
        assert!(first.success);
        assert_eq!(first.output, "let b = null;\n\nLoad(form2);\nlet a = null;");

        let second = compiler.compile(sources, &CompileOptions::default());
        assert_eq!(second.metrics.cache_hits, 2);
        assert_eq!(second.metrics.cache_misses, 0);
        assert_eq!(first.output, second.output);
    }

    #[test]
    fn jit_hot_path_is_cached() {
        let mut compiler = compiler(1);

        let cold = compiler.compile_jit("x = 1 + 2", false);
        assert!(cold.success);
        assert_eq!(compiler.stats().cache_size, 0);

        let hot = compiler.compile_jit("x = 1 + 2", true);
        assert_eq!(hot.metrics.cache_misses, 1);
        assert_eq!(compiler.stats().cache_size, 1);

        let again = compiler.compile_jit("x = 1 + 2", false);
        assert_eq!(again.metrics.cache_hits, 1);
        assert_eq!(again.output, "x = (1 + 2);");
    }

    #[test]
    fn stats_and_clear() {
        let mut compiler = compiler(3);
        compiler.compile([("Module1", "Dim a"), ("Module2", "Dim b")], &CompileOptions::default());

        assert_eq!(
            compiler.stats(),
            CompilerStats {
                cache_size: 2,
                dependency_graph_size: 2,
                worker_count: 3,
            }
        );

        compiler.clear_caches();
        assert_eq!(compiler.stats().cache_size, 0);
        assert_eq!(compiler.stats().dependency_graph_size, 0);
    }

    #[test]
    fn compile_after_dispose_fails() {
        let mut compiler = compiler(1);
        compiler.dispose();
        compiler.dispose();

        let result = compiler.compile([("Module1", "Dim a")], &CompileOptions::default());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::Disposed);
        assert_eq!(compiler.stats().worker_count, 0);

        let jit = compiler.compile_jit("x = 1", true);
        assert_eq!(jit.errors[0].code, ErrorCode::Disposed);
    }

    #[test]
    fn dispose_returns_while_a_unit_is_stuck() {
        struct Stalls;
        impl UnitHandler for Stalls {
            fn compile(
                &self,
                _: &str,
                source: &str,
                options: &CompileOptions,
            ) -> CompilationResult {
                std::thread::sleep(Duration::from_secs(4));
                Pipeline::default().run(source, options)
            }
        }

        let config = CompilerConfig {
            workers: Some(1),
            worker_timeout: Duration::from_millis(50),
            ..CompilerConfig::default()
        };
        let extractor = Box::new(PatternExtractor::new());
        let mut compiler = Compiler::create_with(config, extractor, Arc::new(Stalls)).unwrap();

        let result = compiler.compile([("Module1", "Dim a")], &CompileOptions::default());
        assert_eq!(result.errors[0].code, ErrorCode::WorkerTimeout);

        let started = Instant::now();
        compiler.dispose();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn handler_panic_is_reported_per_unit() {
        struct Explodes;
        impl UnitHandler for Explodes {
            fn compile(&self, _: &str, _: &str, _: &CompileOptions) -> CompilationResult {
                panic!("boom");
            }
        }

        let config = CompilerConfig {
            workers: Some(1),
            worker_timeout: Duration::from_secs(5),
            ..CompilerConfig::default()
        };
        let extractor = Box::new(PatternExtractor::new());
        let mut compiler = Compiler::create_with(config, extractor, Arc::new(Explodes)).unwrap();

        let result = compiler.compile([("Module1", "Dim a")], &CompileOptions::default());
        assert!(!result.success);
        assert_eq!(result.unit_count, 1);
        assert_eq!(result.errors[0].code, ErrorCode::WorkerFailed);
        assert_eq!(compiler.stats().cache_size, 0);
    }
}

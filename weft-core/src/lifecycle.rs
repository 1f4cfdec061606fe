//! Compiled schema lifecycle
//!
//! Tracks whether the cached contract still reflects the registry. Every
//! topology change bumps a generation counter; a cached artifact is valid
//! only while the generation it was compiled at is still the current one.
//!
//! ```text
//! Invalid --ensure_compiled--> (compiling) --ok--> Valid
//!    ^                             |                 |
//!    +-------------err-------------+                 |
//!    +----------------------invalidate---------------+
//! ```
//!
//! A compile that was overtaken by an invalidation still publishes its
//! artifact, but the artifact is stale on arrival and the next call compiles
//! again.

use crate::builder::Outline;
use crate::compiler::SchemaCompiler;
use crate::error::CompileError;
use crate::registry::ServiceRegistry;
use crate::resolver::ResolverTable;
use crate::snapshot::write_snapshot;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use weft_broker::Broker;

/// Invalidation generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen:{}", self.0)
    }
}

/// Cloneable handle that marks the schema stale
///
/// Hand this to whatever watches the registry.
#[derive(Debug, Clone, Default)]
pub struct Invalidator {
    generation: Arc<AtomicU64>,
}

impl Invalidator {
    pub fn invalidate(&self) -> Generation {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation = next, "schema invalidated");
        Generation(next)
    }

    pub fn current(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }
}

/// One compiled contract with its resolvers and subscription broker
#[derive(Debug)]
pub struct CompiledArtifact {
    pub document: String,
    pub resolvers: ResolverTable,
    pub outline: Outline,
    /// Broker bound to this compile; closed when a newer compile replaces it
    pub broker: Broker,
    /// Generation the registry snapshot was taken at
    pub generation: Generation,
}

/// Broadcast once per successful compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdated {
    pub document: String,
    pub generation: Generation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    Invalid,
    Valid,
}

/// Counters describing compile activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStats {
    pub compiles: u64,
    pub failures: u64,
    pub generation: Generation,
}

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Owns the cached artifact and decides when to rebuild it
pub struct SchemaLifecycle {
    registry: Arc<dyn ServiceRegistry>,
    compiler: SchemaCompiler,
    snapshot_path: Option<PathBuf>,
    invalidator: Invalidator,
    cached: RwLock<Option<Arc<CompiledArtifact>>>,
    compile_guard: AsyncMutex<()>,
    snapshot_task: Mutex<Option<JoinHandle<bool>>>,
    updates: broadcast::Sender<SchemaUpdated>,
    compiles: AtomicU64,
    failures: AtomicU64,
}

impl fmt::Debug for SchemaLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLifecycle")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl SchemaLifecycle {
    pub fn new(registry: Arc<dyn ServiceRegistry>, compiler: SchemaCompiler) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            registry,
            compiler,
            snapshot_path: None,
            invalidator: Invalidator::default(),
            cached: RwLock::new(None),
            compile_guard: AsyncMutex::new(()),
            snapshot_task: Mutex::new(None),
            updates,
            compiles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Write every compiled document to `path`
    pub fn with_snapshot(mut self, path: Option<PathBuf>) -> Self {
        self.snapshot_path = path;
        self
    }

    pub fn invalidator(&self) -> Invalidator {
        self.invalidator.clone()
    }

    /// Mark the cached artifact stale, even if a compile is in flight
    pub fn invalidate(&self) -> Generation {
        self.invalidator.invalidate()
    }

    pub fn generation(&self) -> Generation {
        self.invalidator.current()
    }

    pub fn state(&self) -> SchemaState {
        if self.valid_artifact().is_some() {
            SchemaState::Valid
        } else {
            SchemaState::Invalid
        }
    }

    /// The most recent artifact, whether or not it is still valid
    pub fn current(&self) -> Option<Arc<CompiledArtifact>> {
        self.cached.read().clone()
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<SchemaUpdated> {
        self.updates.subscribe()
    }

    pub fn stats(&self) -> LifecycleStats {
        LifecycleStats {
            compiles: self.compiles.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            generation: self.generation(),
        }
    }

    fn valid_artifact(&self) -> Option<Arc<CompiledArtifact>> {
        let current = self.generation();
        self.cached
            .read()
            .as_ref()
            .filter(|artifact| artifact.generation == current)
            .cloned()
    }

    /// Return the cached artifact, compiling first if it is stale.
    ///
    /// Concurrent callers share one compile and wait for it without blocking
    /// their worker thread. On failure nothing is cached and the next call
    /// tries again. The snapshot is written by a background task; see
    /// [`flush_snapshot`](Self::flush_snapshot).
    pub async fn ensure_compiled(&self) -> Result<Arc<CompiledArtifact>, CompileError> {
        if let Some(artifact) = self.valid_artifact() {
            return Ok(artifact);
        }

        let artifact = {
            let _guard = self.compile_guard.lock().await;
            if let Some(artifact) = self.valid_artifact() {
                return Ok(artifact);
            }
            self.compile()?
        };

        if let Some(path) = &self.snapshot_path {
            self.spawn_snapshot(path.clone(), artifact.document.clone());
        }

        Ok(artifact)
    }

    /// Wait for the latest snapshot write, if one is pending.
    ///
    /// Returns whether it succeeded.
    pub async fn flush_snapshot(&self) -> Option<bool> {
        let task = self.snapshot_task.lock().take()?;
        task.await.ok()
    }

    /// Queue a snapshot write behind the previous one so files land in
    /// compile order
    fn spawn_snapshot(&self, path: PathBuf, document: String) {
        let mut pending = self.snapshot_task.lock();
        let previous = pending.take();
        *pending = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            write_snapshot(&path, &document).await
        }));
    }

    fn compile(&self) -> Result<Arc<CompiledArtifact>, CompileError> {
        let started = self.generation();
        let services = self.registry.services();
        let timer = Instant::now();
        self.compiles.fetch_add(1, Ordering::Relaxed);

        let compiled = self.compiler.compile(&services).inspect_err(|_| {
            self.failures.fetch_add(1, Ordering::Relaxed);
        })?;

        let artifact = Arc::new(CompiledArtifact {
            document: compiled.document,
            resolvers: compiled.resolvers,
            outline: compiled.outline,
            broker: Broker::new(),
            generation: started,
        });

        if let Some(previous) = self.cached.write().replace(artifact.clone()) {
            previous.broker.close();
        }

        info!(
            generation = started.0,
            services = services.len(),
            broker = %artifact.broker.id(),
            elapsed_us = timer.elapsed().as_micros() as u64,
            "created schema"
        );
        if self.generation() != started {
            debug!(generation = started.0, "schema went stale while compiling");
        }

        // no receivers is fine
        let _ = self.updates.send(SchemaUpdated {
            document: artifact.document.clone(),
            generation: started,
        });

        Ok(artifact)
    }
}

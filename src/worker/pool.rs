//! The worker pool and its reply router.
//!
//! ## Architecture
//!
//! ```text
//!            submit                          job channel (one per worker)
//! caller ────────────► WorkerPool ──────────────────────────► worker N
//!   ▲                     │ registers PendingRequest                │
//!   │                     ▼ before sending                          │
//!   │               pending map ◄──── router thread ◄───────────────┘
//!   └─────────────────── reply ────── (match id, sweep deadlines)   replies
//! ```
//!
//! Workers only see serialized requests and only produce serialized
//! replies. The router is the only place a pending request is resolved,
//! apart from [`WorkerPool::dispose`], which fails whatever is left.

use super::DispatchError;
use super::message::{CompileUnitPayload, ErrorPayload, MessageType, WorkerMessage, message_id};
use crate::unit::CompilationUnit;
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use log::{debug, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use vbstudio_compiler::{CompilationResult, Pipeline};
use vbstudio_core::CompileOptions;

/// How often the router checks deadlines when no reply arrives.
const SWEEP_INTERVAL: Duration = Duration::from_millis(20);

/// Compiles one unit on a worker thread.
pub trait UnitHandler: Send + Sync + 'static {
    fn compile(&self, unit_id: &str, source: &str, options: &CompileOptions) -> CompilationResult;
}

impl UnitHandler for Pipeline {
    fn compile(&self, _unit_id: &str, source: &str, options: &CompileOptions) -> CompilationResult {
        self.run(source, options)
    }
}

type Outcome = Result<CompilationResult, DispatchError>;

struct PendingRequest {
    unit_id: String,
    deadline: Instant,
    reply: Sender<Outcome>,
}

type PendingMap = Arc<Mutex<FxHashMap<String, PendingRequest>>>;

/// Handle to a submitted unit.
#[derive(Debug)]
pub struct PendingCompilation {
    id: String,
    unit_id: String,
    receiver: Receiver<Outcome>,
}

impl PendingCompilation {
    /// The message id the request was sent under.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Block until the worker replies, the deadline passes or the pool is
    /// disposed.
    pub fn wait(self) -> Outcome {
        match self.receiver.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(DispatchError::ChannelClosed { unit: self.unit_id }),
        }
    }
}

struct Worker {
    index: usize,
    jobs: Option<Sender<WorkerMessage>>,
    thread: Option<JoinHandle<()>>,
    /// Set while the worker is inside a handler.
    busy: Arc<AtomicBool>,
}

/// A fixed set of worker threads with per-request deadlines.
pub struct WorkerPool {
    workers: Vec<Worker>,
    pending: PendingMap,
    timeout: Duration,
    /// Set once by `dispose`; workers read it as their shutdown flag.
    disposed: Arc<AtomicBool>,
    next_worker: AtomicUsize,
    router: Option<JoinHandle<()>>,
    router_stop: Option<Sender<()>>,
}

impl WorkerPool {
    /// Start `size` workers (at least one) and the reply router.
    pub fn new(size: usize, timeout: Duration, handler: Arc<dyn UnitHandler>) -> io::Result<Self> {
        let size = size.max(1);
        let disposed = Arc::new(AtomicBool::new(false));
        let pending: PendingMap = Arc::new(Mutex::new(FxHashMap::default()));
        let (reply_tx, reply_rx) = unbounded();

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let (job_tx, job_rx) = unbounded();
            let replies = reply_tx.clone();
            let handler = Arc::clone(&handler);
            let shutdown = Arc::clone(&disposed);
            let busy = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&busy);
            let thread = thread::Builder::new()
                .name(format!("vbstudio-worker-{}", index))
                .spawn(move || worker_loop(index, job_rx, replies, handler, shutdown, flag))?;

            workers.push(Worker {
                index,
                jobs: Some(job_tx),
                thread: Some(thread),
                busy,
            });
        }
        drop(reply_tx);

        let (stop_tx, stop_rx) = bounded(1);
        let router_pending = Arc::clone(&pending);
        let router = thread::Builder::new()
            .name("vbstudio-router".to_string())
            .spawn(move || route_replies(reply_rx, stop_rx, router_pending, timeout))?;

        debug!("worker pool started with {} workers, timeout {:?}", size, timeout);
        Ok(Self {
            workers,
            pending,
            timeout,
            disposed,
            next_worker: AtomicUsize::new(0),
            router: Some(router),
            router_stop: Some(stop_tx),
        })
    }

    /// Number of live workers; zero after disposal.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Requests sent but not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Submit a unit to the next worker in turn.
    pub fn submit(
        &self,
        unit: &CompilationUnit,
        options: &CompileOptions,
    ) -> Result<PendingCompilation, DispatchError> {
        let index = self.next_worker.fetch_add(1, Ordering::Relaxed);
        self.submit_to(index, unit, options)
    }

    /// Submit a unit to worker `index` (modulo the pool size).
    ///
    /// Fails immediately with [`DispatchError::Disposed`] once the pool has
    /// been disposed.
    pub fn submit_to(
        &self,
        index: usize,
        unit: &CompilationUnit,
        options: &CompileOptions,
    ) -> Result<PendingCompilation, DispatchError> {
        if self.is_disposed() || self.workers.is_empty() {
            return Err(DispatchError::Disposed);
        }
        let worker = &self.workers[index % self.workers.len()];
        let Some(jobs) = worker.jobs.as_ref() else {
            return Err(DispatchError::Disposed);
        };

        let payload = CompileUnitPayload {
            unit_id: unit.id().to_string(),
            source: unit.source().to_string(),
            options: options.clone(),
        };
        let payload = serde_json::to_value(&payload).map_err(|e| DispatchError::WorkerFailed {
            unit: unit.id().to_string(),
            message: format!("could not encode request: {}", e),
        })?;

        let id = message_id(unit.id());
        let (reply_tx, reply_rx) = bounded(1);
        {
            let mut pending = self.pending.lock();
            if self.is_disposed() {
                return Err(DispatchError::Disposed);
            }
            pending.insert(
                id.clone(),
                PendingRequest {
                    unit_id: unit.id().to_string(),
                    deadline: Instant::now() + self.timeout,
                    reply: reply_tx,
                },
            );
        }

        debug!("dispatching {} to worker {}", id, worker.index);
        let message = WorkerMessage::new(id.clone(), MessageType::CompileUnit, payload);
        if jobs.send(message).is_err() {
            self.pending.lock().remove(&id);
            return Err(DispatchError::ChannelClosed {
                unit: unit.id().to_string(),
            });
        }

        Ok(PendingCompilation {
            id,
            unit_id: unit.id().to_string(),
            receiver: reply_rx,
        })
    }

    /// Compile a batch: unit `i` goes to worker `i % size`, and every unit
    /// is awaited before returning. Outcomes are in batch order.
    pub fn compile_batch(
        &self,
        batch: &[&CompilationUnit],
        options: &CompileOptions,
    ) -> Vec<Outcome> {
        let handles: Vec<Result<PendingCompilation, DispatchError>> = batch
            .iter()
            .enumerate()
            .map(|(i, unit)| self.submit_to(i, unit, options))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.and_then(PendingCompilation::wait))
            .collect()
    }

    /// Shut the pool down. Idempotent.
    ///
    /// Every pending request is failed with [`DispatchError::Disposed`]
    /// first, then the router is stopped so no late reply is delivered, and
    /// only then are the workers told to stop. Idle workers are joined. A
    /// worker still inside a handler is detached: it exits once the handler
    /// returns, and dispose does not wait for it.
    pub fn dispose(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let failed: Vec<PendingRequest> = self.pending.lock().drain().map(|(_, r)| r).collect();
        debug!("disposing worker pool, failing {} pending requests", failed.len());
        for request in failed {
            let _ = request.reply.send(Err(DispatchError::Disposed));
        }

        if let Some(stop) = self.router_stop.take() {
            let _ = stop.send(());
        }
        if let Some(router) = self.router.take() {
            if router.join().is_err() {
                warn!("reply router panicked");
            }
        }

        for worker in &mut self.workers {
            worker.jobs.take();
        }
        for mut worker in self.workers.drain(..) {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            if worker.busy.load(Ordering::SeqCst) {
                warn!("worker {} is still compiling, detaching it", worker.index);
                continue;
            }
            if thread.join().is_err() {
                warn!("worker {} panicked outside a compilation", worker.index);
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Units per batch for `units` units on `workers` workers: the ceiling of
/// their ratio, and at least one.
pub fn batch_size(units: usize, workers: usize) -> usize {
    units.div_ceil(workers.max(1)).max(1)
}

// ============================================================================
// Worker side
// ============================================================================

fn worker_loop(
    index: usize,
    jobs: Receiver<WorkerMessage>,
    replies: Sender<WorkerMessage>,
    handler: Arc<dyn UnitHandler>,
    shutdown: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
) {
    for request in jobs.iter() {
        // Mark busy before checking shutdown; dispose reads them in the
        // opposite order, so it never joins a worker that goes on to compile
        busy.store(true, Ordering::SeqCst);
        if shutdown.load(Ordering::SeqCst) {
            busy.store(false, Ordering::SeqCst);
            break;
        }
        let reply = handle_request(index, request, handler.as_ref());
        busy.store(false, Ordering::SeqCst);
        if replies.send(reply).is_err() {
            break;
        }
    }
    debug!("worker {} stopped", index);
}

fn handle_request(
    index: usize,
    request: WorkerMessage,
    handler: &dyn UnitHandler,
) -> WorkerMessage {
    let id = request.id;
    if request.kind != MessageType::CompileUnit {
        return error_reply(id, format!("unexpected {:?} request", request.kind));
    }

    let payload: CompileUnitPayload = match serde_json::from_value(request.payload) {
        Ok(payload) => payload,
        Err(e) => return error_reply(id, format!("malformed request: {}", e)),
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.compile(&payload.unit_id, &payload.source, &payload.options)
    }));

    match outcome {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => WorkerMessage::new(id, MessageType::CompilationComplete, value),
            Err(e) => error_reply(id, format!("could not encode result: {}", e)),
        },
        Err(panic) => {
            let message = panic_message(&*panic);
            warn!("worker {} panicked on '{}': {}", index, payload.unit_id, message);
            error_reply(id, format!("worker panicked: {}", message))
        }
    }
}

fn error_reply(id: String, message: String) -> WorkerMessage {
    WorkerMessage::new(id, MessageType::CompilationError, json!({ "message": message }))
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

// ============================================================================
// Router
// ============================================================================

fn route_replies(
    replies: Receiver<WorkerMessage>,
    stop: Receiver<()>,
    pending: PendingMap,
    timeout: Duration,
) {
    let tick = SWEEP_INTERVAL.min(timeout).max(Duration::from_millis(1));
    loop {
        let running = select! {
            recv(replies) -> message => match message {
                Ok(message) => {
                    resolve(&pending, message);
                    true
                }
                Err(_) => {
                    fail_all(&pending, "all workers have stopped");
                    false
                }
            },
            recv(stop) -> _ => false,
            default(tick) => true,
        };
        if !running {
            break;
        }
        sweep_expired(&pending, timeout);
    }
    debug!("reply router stopped");
}

fn resolve(pending: &PendingMap, message: WorkerMessage) {
    let Some(request) = pending.lock().remove(&message.id) else {
        warn!("ignoring reply with unknown id {}", message.id);
        return;
    };

    let unit = request.unit_id;
    let outcome = match message.kind {
        MessageType::CompilationComplete => {
            serde_json::from_value::<CompilationResult>(message.payload).map_err(|e| {
                DispatchError::WorkerFailed {
                    unit,
                    message: format!("malformed result: {}", e),
                }
            })
        }
        MessageType::CompilationError => {
            let message = serde_json::from_value::<ErrorPayload>(message.payload)
                .map(|payload| payload.message)
                .unwrap_or_else(|_| "unknown worker error".to_string());
            Err(DispatchError::WorkerFailed { unit, message })
        }
        MessageType::CompileUnit => Err(DispatchError::WorkerFailed {
            unit,
            message: "worker replied with a request".to_string(),
        }),
    };

    debug!("resolved {} ({})", message.id, if outcome.is_ok() { "ok" } else { "failed" });
    let _ = request.reply.send(outcome);
}

fn sweep_expired(pending: &PendingMap, timeout: Duration) {
    let now = Instant::now();
    let expired: Vec<PendingRequest> = {
        let mut map = pending.lock();
        let ids: Vec<String> = map
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| map.remove(id)).collect()
    };

    for request in expired {
        warn!("unit '{}' timed out after {:?}", request.unit_id, timeout);
        let _ = request.reply.send(Err(DispatchError::WorkerTimeout {
            unit: request.unit_id,
            timeout,
        }));
    }
}

fn fail_all(pending: &PendingMap, reason: &str) {
    let failed: Vec<PendingRequest> = pending.lock().drain().map(|(_, r)| r).collect();
    for request in failed {
        let _ = request.reply.send(Err(DispatchError::WorkerFailed {
            unit: request.unit_id,
            message: reason.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::PatternExtractor;
    use vbstudio_core::{CompilerError, ErrorCode};

    struct Slow(Duration);

    impl UnitHandler for Slow {
        fn compile(
            &self,
            _unit_id: &str,
            source: &str,
            options: &CompileOptions,
        ) -> CompilationResult {
            thread::sleep(self.0);
            Pipeline::default().run(source, options)
        }
    }

    struct Panics;

    impl UnitHandler for Panics {
        fn compile(
            &self,
            unit_id: &str,
            _source: &str,
            _options: &CompileOptions,
        ) -> CompilationResult {
            panic!("cannot compile {}", unit_id);
        }
    }

    fn unit(id: &str, source: &str) -> CompilationUnit {
        CompilationUnit::new(id, source, &PatternExtractor::new())
    }

    fn pool(size: usize, timeout: Duration, handler: impl UnitHandler) -> WorkerPool {
        WorkerPool::new(size, timeout, Arc::new(handler)).unwrap()
    }

    #[test]
    fn compiles_on_a_worker() {
        let pool = pool(2, Duration::from_secs(5), Pipeline::default());
        let module = unit("Module1", "Dim x As Integer\nx = 2 + 3 * 4");

        let pending = pool.submit(&module, &CompileOptions::default()).unwrap();
        assert!(pending.id().starts_with("Module1-"));

        let result = pending.wait().unwrap();
        assert!(result.success);
        assert!(result.output.contains("x = (2 + (3 * 4));"));
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn batch_outcomes_keep_order() {
        let pool = pool(3, Duration::from_secs(5), Pipeline::default());
        let units: Vec<CompilationUnit> =
            (0..5).map(|i| unit(&format!("Module{}", i), &format!("x{} = {}", i, i))).collect();
        let batch: Vec<&CompilationUnit> = units.iter().collect();

        let outcomes = pool.compile_batch(&batch, &CompileOptions::default());
        assert_eq!(outcomes.len(), 5);
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let result = outcome.unwrap();
            assert_eq!(result.output, format!("x{} = {};", i, i));
        }
    }

    #[test]
    fn slow_worker_times_out() {
        let pool = pool(1, Duration::from_millis(50), Slow(Duration::from_millis(300)));
        let pending = pool.submit(&unit("Form1", "Dim x"), &CompileOptions::default()).unwrap();

        let started = Instant::now();
        let err = pending.wait().unwrap_err();
        assert!(matches!(err, DispatchError::WorkerTimeout { ref unit, .. } if unit == "Form1"));
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(pool.pending_count(), 0);
    }

    #[test]
    fn dispose_does_not_wait_for_a_timed_out_worker() {
        let mut pool = pool(1, Duration::from_millis(50), Slow(Duration::from_secs(4)));
        let pending = pool.submit(&unit("Form1", "Dim x"), &CompileOptions::default()).unwrap();
        assert!(matches!(pending.wait(), Err(DispatchError::WorkerTimeout { .. })));

        let started = Instant::now();
        pool.dispose();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(pool.is_disposed());
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn panics_become_worker_failures() {
        let pool = pool(1, Duration::from_secs(5), Panics);
        let err = pool
            .submit(&unit("Form1", "Dim x"), &CompileOptions::default())
            .unwrap()
            .wait()
            .unwrap_err();

        match err {
            DispatchError::WorkerFailed { unit, message } => {
                assert_eq!(unit, "Form1");
                assert!(message.contains("cannot compile Form1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // The worker survives the panic
        let again = pool.submit(&unit("Form2", "Dim x"), &CompileOptions::default()).unwrap();
        assert!(matches!(again.wait(), Err(DispatchError::WorkerFailed { .. })));
    }

    #[test]
    fn dispose_fails_everything_in_flight() {
        let mut pool = pool(2, Duration::from_secs(30), Slow(Duration::from_millis(250)));
        let units: Vec<CompilationUnit> =
            (0..6).map(|i| unit(&format!("Module{}", i), "Dim x")).collect();
        let handles: Vec<PendingCompilation> = units
            .iter()
            .map(|u| pool.submit(u, &CompileOptions::default()).unwrap())
            .collect();

        pool.dispose();
        assert!(pool.is_disposed());
        assert_eq!(pool.size(), 0);

        for handle in handles {
            assert_eq!(handle.wait().unwrap_err(), DispatchError::Disposed);
        }
    }

    #[test]
    fn submit_after_dispose_fails_immediately() {
        let mut pool = pool(1, Duration::from_secs(30), Pipeline::default());
        pool.dispose();
        pool.dispose();

        let started = Instant::now();
        let err = pool.submit(&unit("Form1", "Dim x"), &CompileOptions::default()).unwrap_err();
        assert_eq!(err, DispatchError::Disposed);
        assert_eq!(CompilerError::from(&err).code, ErrorCode::Disposed);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn unknown_reply_ids_are_ignored() {
        let pending: PendingMap = Arc::new(Mutex::new(FxHashMap::default()));
        let (reply_tx, reply_rx) = bounded(1);
        pending.lock().insert(
            "known".to_string(),
            PendingRequest {
                unit_id: "Form1".to_string(),
                deadline: Instant::now() + Duration::from_secs(30),
                reply: reply_tx,
            },
        );

        let stranger = json!({ "message": "x" });
        resolve(
            &pending,
            WorkerMessage::new("stranger", MessageType::CompilationError, stranger),
        );
        assert_eq!(pending.lock().len(), 1);
        assert!(reply_rx.try_recv().is_err());

        let result = serde_json::to_value(CompilationResult::empty()).unwrap();
        resolve(&pending, WorkerMessage::new("known", MessageType::CompilationComplete, result));
        assert!(pending.lock().is_empty());
        assert!(reply_rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn batch_sizes() {
        assert_eq!(batch_size(10, 4), 3);
        assert_eq!(batch_size(8, 4), 2);
        assert_eq!(batch_size(1, 8), 1);
        assert_eq!(batch_size(0, 4), 1);
        assert_eq!(batch_size(5, 0), 5);
    }
}

//! Execution steps
//!
//! A step owns at most one upstream step. `start` wires the step's stream
//! to its upstream, starting the upstream chain in the process. Sorting and
//! aggregating steps drain their upstream inside `start`. `LimitStep` is
//! the exception: with `LIMIT 0` it never starts its upstream, so the
//! source is not touched.
//!
//! Every stream handed out by a step checks the context deadline on each
//! pull and, when profiling is on, counts rows and time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::context::ExecutionContext;
use super::errors::ExecResult;
use super::result::QueryResult;
use super::steps::StepKind;
use super::stream::{ExecutionStream, ResultSource};

/// Row and time counters of one step, shared by clones of the plan
#[derive(Debug, Default)]
pub struct StepStats {
    rows: AtomicU64,
    nanos: AtomicU64,
}

impl StepStats {
    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed) / 1_000
    }

    fn record_row(&self) {
        self.rows.fetch_add(1, Ordering::Relaxed);
    }

    fn record_time(&self, since: Instant) {
        let nanos = u64::try_from(since.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StepStatsSnapshot {
        StepStatsSnapshot {
            rows: self.rows(),
            elapsed_micros: self.elapsed_micros(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepStatsSnapshot {
    pub rows: u64,
    pub elapsed_micros: u64,
}

/// Handle used by a step to start its upstream on demand
#[derive(Clone, Copy)]
pub struct Upstream<'a>(Option<&'a ExecutionStep>);

impl<'a> Upstream<'a> {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    /// Starts the upstream step; an absent upstream is an empty stream
    pub fn start(self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        match self.0 {
            Some(step) => step.start(ctx),
            None => Ok(ExecutionStream::empty()),
        }
    }
}

/// A node of an execution plan
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    id: usize,
    profiling: bool,
    stats: Arc<StepStats>,
    prev: Option<Box<ExecutionStep>>,
    kind: StepKind,
}

impl ExecutionStep {
    pub fn new(id: usize, kind: StepKind, profiling: bool) -> Self {
        Self {
            id,
            profiling,
            stats: Arc::new(StepStats::default()),
            prev: None,
            kind,
        }
    }

    pub(crate) fn with_prev(mut self, prev: ExecutionStep) -> Self {
        self.prev = Some(Box::new(prev));
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn prev(&self) -> Option<&ExecutionStep> {
        self.prev.as_deref()
    }

    pub fn is_profiling(&self) -> bool {
        self.profiling
    }

    pub fn stats(&self) -> &StepStats {
        &self.stats
    }

    /// Starts this step and, lazily, its upstream chain
    pub fn start(&self, ctx: &mut ExecutionContext) -> ExecResult<ExecutionStream> {
        ctx.check_deadline()?;
        let started = Instant::now();
        let stream = self.kind.start(Upstream(self.prev.as_deref()), ctx)?;
        if self.profiling {
            self.stats.record_time(started);
        }
        Ok(ExecutionStream::new(Instrumented {
            inner: stream,
            stats: self.profiling.then(|| Arc::clone(&self.stats)),
        }))
    }
}

/// Deadline checks and profiling around a step's stream
struct Instrumented {
    inner: ExecutionStream,
    stats: Option<Arc<StepStats>>,
}

impl ResultSource for Instrumented {
    fn has_next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<bool> {
        ctx.check_deadline()?;
        let started = Instant::now();
        let result = self.inner.has_next(ctx);
        if let Some(stats) = &self.stats {
            stats.record_time(started);
        }
        result
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecResult<QueryResult> {
        ctx.check_deadline()?;
        let started = Instant::now();
        let result = self.inner.next(ctx);
        if let Some(stats) = &self.stats {
            stats.record_time(started);
            if result.is_ok() {
                stats.record_row();
            }
        }
        result
    }

    fn close(&mut self, ctx: &mut ExecutionContext) {
        self.inner.close(ctx);
    }
}

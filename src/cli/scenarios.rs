//! Benchmark scenarios.
//!
//! The registry is an ordered map from scenario name to a run function and
//! an optional exclusion rule. It is built once and passed to
//! [`run_scenarios`], which applies `--only`/`--skip` and the exclusions.

use crate::error::Result;
use crate::job::Job;
use crate::metrics::Metrics;
use crate::scratch::SharedScratch;
use crate::tree::AvlTree;
use crate::visit::{VisitAction, VisitFlags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Knobs shared by every scenario.
#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub nodes: usize,
    pub threads: usize,
    pub seed: u64,
    /// Repetitions of whole-tree scenarios.
    pub repeat: usize,
}

/// Input handed to every scenario: the prepared tree and where to record.
pub struct BenchContext {
    pub options: BenchOptions,
    pub tree: AvlTree<u64>,
    pub values: Vec<u64>,
    pub metrics: Metrics,
    pub scratch: SharedScratch,
}

impl BenchContext {
    /// Builds the shared tree from `options.nodes` seeded random values.
    pub fn prepare(options: BenchOptions, mut tree: AvlTree<u64>) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let values: Vec<u64> = (0..options.nodes).map(|_| rng.gen()).collect();

        let scratch = SharedScratch::new();
        tree.share_scratch(&scratch);
        for &value in &values {
            tree.insert(value)?;
        }

        Ok(Self {
            options,
            tree,
            values,
            metrics: Metrics::new(),
            scratch,
        })
    }

    fn rng(&self, salt: u64) -> StdRng {
        StdRng::seed_from_u64(self.options.seed ^ salt)
    }
}

pub type ScenarioFn = fn(&BenchContext) -> Result<()>;

/// Returns why a scenario cannot run with the given options.
pub type ExcludeFn = fn(&BenchContext) -> Option<&'static str>;

pub struct Scenario {
    pub run: ScenarioFn,
    pub exclude: Option<ExcludeFn>,
}

impl Scenario {
    fn always(run: ScenarioFn) -> Self {
        Self { run, exclude: None }
    }

    fn unless(run: ScenarioFn, exclude: ExcludeFn) -> Self {
        Self {
            run,
            exclude: Some(exclude),
        }
    }
}

pub type Registry = BTreeMap<&'static str, Scenario>;

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.insert("insert", Scenario::always(insert));
    registry.insert("find", Scenario::always(find));
    registry.insert("remove", Scenario::always(remove));
    registry.insert("visit_infix", Scenario::always(visit_infix));
    registry.insert("visit_breadth", Scenario::always(visit_breadth));
    registry.insert("range", Scenario::always(range));
    registry.insert("iter", Scenario::always(iter));
    registry.insert("par_visit", Scenario::unless(par_visit, below_threshold));
    registry.insert("par_merge", Scenario::unless(par_merge, below_threshold));
    registry.insert("shared_scratch", Scenario::unless(shared_scratch, single_thread));
    registry
}

/// Outcome of a registry run.
#[derive(Debug, Default, serde::Serialize)]
pub struct RunSummary {
    pub ran: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

pub fn run_scenarios(
    registry: &Registry,
    ctx: &BenchContext,
    only: &[String],
    skip: &[String],
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for (name, scenario) in registry {
        let wanted = only.is_empty() || only.iter().any(|o| o == name);
        if !wanted || skip.iter().any(|s| s == name) {
            summary.skipped.push((name.to_string(), "filtered".to_string()));
            continue;
        }
        if let Some(reason) = scenario.exclude.and_then(|exclude| exclude(ctx)) {
            tracing::info!(scenario = name, reason, "scenario excluded");
            summary.skipped.push((name.to_string(), reason.to_string()));
            continue;
        }

        tracing::info!(scenario = name, "running scenario");
        let start = Instant::now();
        (scenario.run)(ctx)?;
        tracing::debug!(scenario = name, elapsed = ?start.elapsed(), "scenario done");
        summary.ran.push(name.to_string());
    }

    Ok(summary)
}

fn below_threshold(ctx: &BenchContext) -> Option<&'static str> {
    (ctx.tree.len() <= ctx.tree.config().parallel_threshold)
        .then_some("tree does not exceed the parallel threshold")
}

fn single_thread(ctx: &BenchContext) -> Option<&'static str> {
    (ctx.options.threads < 2).then_some("needs at least two threads")
}

fn insert(ctx: &BenchContext) -> Result<()> {
    let mut tree = AvlTree::with_config(crate::tree::NaturalOrder, ctx.tree.config().clone())?;
    for &value in &ctx.values {
        let start = Instant::now();
        tree.insert(value)?;
        ctx.metrics.record_latency("insert", start.elapsed());
    }
    Ok(())
}

fn find(ctx: &BenchContext) -> Result<()> {
    let mut rng = ctx.rng(0xf1d);
    for _ in 0..ctx.values.len() {
        let key = ctx.values[rng.gen_range(0..ctx.values.len())];
        let start = Instant::now();
        let found = ctx.tree.find(&key).is_some();
        ctx.metrics.record_latency("find", start.elapsed());
        debug_assert!(found);
    }
    Ok(())
}

fn remove(ctx: &BenchContext) -> Result<()> {
    let mut tree: AvlTree<u64> = ctx.values.iter().copied().collect();
    for value in &ctx.values {
        let start = Instant::now();
        tree.remove(value)?;
        ctx.metrics.record_latency("remove", start.elapsed());
    }
    Ok(())
}

fn timed_visit(ctx: &BenchContext, operation: &str, flags: VisitFlags) -> Result<()> {
    for _ in 0..ctx.options.repeat {
        let start = Instant::now();
        let summary = ctx.tree.visit(flags, |_, _| VisitAction::Continue)?;
        ctx.metrics.record_latency(operation, start.elapsed());
        ctx.metrics.record_summary(&summary);
    }
    Ok(())
}

fn visit_infix(ctx: &BenchContext) -> Result<()> {
    timed_visit(ctx, "visit_infix", VisitFlags::INFIX)
}

fn visit_breadth(ctx: &BenchContext) -> Result<()> {
    timed_visit(ctx, "visit_breadth", VisitFlags::BREADTH)
}

fn range(ctx: &BenchContext) -> Result<()> {
    let mut rng = ctx.rng(0x5a6e);
    // Sized to hold about 16 of the uniformly drawn values.
    let span = (u64::MAX / ctx.values.len().max(1) as u64).saturating_mul(16);
    for _ in 0..ctx.values.len().min(10_000) {
        let min = rng.gen_range(0..u64::MAX.saturating_sub(span).max(1));
        let max = min.saturating_add(span);
        let start = Instant::now();
        let summary = ctx
            .tree
            .visit_range(&min, &max, VisitFlags::empty(), |_, _| VisitAction::Continue)?;
        ctx.metrics.record_latency("range", start.elapsed());
        ctx.metrics.record_summary(&summary);
    }
    Ok(())
}

fn iter(ctx: &BenchContext) -> Result<()> {
    for _ in 0..ctx.options.repeat {
        let start = Instant::now();
        let count = ctx.tree.iter().count();
        ctx.metrics.record_latency("iter", start.elapsed());
        debug_assert_eq!(count, ctx.tree.len());
    }
    Ok(())
}

fn par_visit(ctx: &BenchContext) -> Result<()> {
    for _ in 0..ctx.options.repeat {
        let counter = AtomicUsize::new(0);
        let start = Instant::now();
        let summary = ctx.tree.par_visit(VisitFlags::INFIX, |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
            VisitAction::Continue
        })?;
        ctx.metrics.record_latency("par_visit", start.elapsed());
        ctx.metrics.record_summary(&summary);
    }
    Ok(())
}

fn par_merge(ctx: &BenchContext) -> Result<()> {
    for _ in 0..ctx.options.repeat {
        let start = Instant::now();
        let (collected, summary) = ctx.tree.par_visit_merge(VisitFlags::PREFIX, |node, _, out| {
            match out.push(*node.value()) {
                Ok(()) => VisitAction::Continue,
                Err(_) => VisitAction::Abort,
            }
        })?;
        ctx.metrics.record_latency("par_merge", start.elapsed());
        ctx.metrics.record_summary(&summary);
        debug_assert_eq!(collected.len(), ctx.tree.len());
    }
    Ok(())
}

/// Independent trees built and visited in separate jobs, all drawing their
/// traversal stacks from one shared scratch.
fn shared_scratch(ctx: &BenchContext) -> Result<()> {
    let threads = ctx.options.threads;
    let per_job = ctx.options.nodes / threads;

    let mut jobs = Vec::with_capacity(threads);
    for index in 0..threads {
        let scratch = ctx.scratch.clone();
        let seed = ctx.options.seed.wrapping_add(index as u64);
        let repeat = ctx.options.repeat;

        let job = Job::run(format!("scratch-{}", index), move |token| -> Result<Vec<_>> {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut tree = AvlTree::new();
            tree.share_scratch(&scratch);
            for _ in 0..per_job {
                tree.insert(rng.gen::<u64>())?;
            }

            let mut timings = Vec::with_capacity(repeat);
            for _ in 0..repeat {
                if token.is_killed() {
                    break;
                }
                let start = Instant::now();
                tree.visit(VisitFlags::INFIX, |_, _| VisitAction::Continue)?;
                timings.push(start.elapsed());
            }
            tree.audit()?;
            Ok(timings)
        })?;
        jobs.push(job);
    }

    for job in jobs {
        match job.wait()? {
            Some(timings) => {
                for elapsed in timings? {
                    ctx.metrics.record_latency("shared_scratch_visit", elapsed);
                }
            }
            None => tracing::warn!("shared scratch job never ran"),
        }
    }
    Ok(())
}

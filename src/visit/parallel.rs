//! Fork/join visits.
//!
//! While the estimated size of the subtree under a node exceeds the tree's
//! `parallel_threshold`, the visit forks there: both children are handed to
//! scoped jobs and the node itself is reported by the forking thread.
//! Below the threshold, or past `max_fork_depth`, a subtree is walked
//! sequentially.
//!
//! Ordering is only guaranteed within a sequential subtree. A `Stop` or
//! `Abort` raised anywhere halts every branch as soon as it next looks at
//! the shared flag.

use super::walk::{Lineage, Walker};
use super::{drive, Flow, VisitAction, VisitContext, VisitFlags, VisitState, VisitSummary};
use crate::collector::Collector;
use crate::error::{AvlError, Result};
use crate::job::{self, JobScope, ScopedJob};
use crate::tree::{AvlTree, Compare, Node};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Per-job behaviour of a parallel visit.
trait Branch<'a, T>: Sync {
    /// Private state of one job.
    type Buf: Send;

    fn fresh(&self) -> Self::Buf;

    fn call(&self, node: &'a Node<T>, ctx: &VisitContext<'a, '_, T>, buf: &mut Self::Buf)
        -> VisitAction;

    /// Folds a finished child's state into its parent's. Returns whether
    /// anything was merged.
    fn merge(&self, into: &mut Self::Buf, from: Self::Buf) -> Result<bool>;
}

struct Plain<F>(F);

impl<'a, T, F> Branch<'a, T> for Plain<F>
where
    F: Fn(&'a Node<T>, &VisitContext<'a, '_, T>) -> VisitAction + Sync,
{
    type Buf = ();

    fn fresh(&self) {}

    fn call(&self, node: &'a Node<T>, ctx: &VisitContext<'a, '_, T>, _: &mut ()) -> VisitAction {
        (self.0)(node, ctx)
    }

    fn merge(&self, _: &mut (), _: ()) -> Result<bool> {
        Ok(false)
    }
}

struct Merging<F, R> {
    visitor: F,
    _out: PhantomData<fn() -> R>,
}

impl<'a, T, F, R> Branch<'a, T> for Merging<F, R>
where
    F: Fn(&'a Node<T>, &VisitContext<'a, '_, T>, &mut Collector<R>) -> VisitAction + Sync,
    R: Send,
{
    type Buf = Collector<R>;

    fn fresh(&self) -> Collector<R> {
        Collector::new()
    }

    fn call(
        &self,
        node: &'a Node<T>,
        ctx: &VisitContext<'a, '_, T>,
        buf: &mut Collector<R>,
    ) -> VisitAction {
        (self.visitor)(node, ctx, buf)
    }

    fn merge(&self, into: &mut Collector<R>, from: Collector<R>) -> Result<bool> {
        into.append(from)?;
        Ok(true)
    }
}

/// State shared by every job of one parallel visit.
struct Fork<'a, 'b, T, C, B> {
    tree: &'a AvlTree<T, C>,
    branch: &'b B,
    flags: VisitFlags,
    threshold: usize,
    max_depth: usize,
    halt: AtomicBool,
    visited: AtomicUsize,
    examined: AtomicUsize,
    forks: AtomicUsize,
    jobs: AtomicUsize,
    merges: AtomicUsize,
}

type ChildJob<'scope, B> = ScopedJob<'scope, (Result<Flow>, B)>;

impl<'a, 'b, T, C, B> Fork<'a, 'b, T, C, B>
where
    T: Sync,
    C: Compare<T> + Sync,
    B: Branch<'a, T>,
{
    fn new(tree: &'a AvlTree<T, C>, branch: &'b B, flags: VisitFlags) -> Self {
        Self {
            tree,
            branch,
            flags,
            threshold: tree.config().parallel_threshold,
            max_depth: tree.config().max_fork_depth,
            halt: AtomicBool::new(false),
            visited: AtomicUsize::new(0),
            examined: AtomicUsize::new(0),
            forks: AtomicUsize::new(0),
            jobs: AtomicUsize::new(0),
            merges: AtomicUsize::new(0),
        }
    }

    fn summary(&self) -> VisitSummary {
        VisitSummary {
            visited: self.visited.load(Ordering::Relaxed),
            examined: self.examined.load(Ordering::Relaxed),
            stopped: false,
            forks: self.forks.load(Ordering::Relaxed),
            jobs: self.jobs.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            merges_skipped: 0,
        }
    }

    /// Walks the subtree at `node` without forking. `path` holds the
    /// nodes from the root down to `node`'s parent.
    fn sequential(&self, node: &'a Node<T>, path: &[&'a Node<T>], buf: &mut B::Buf) -> Flow {
        let mut walker = Walker::start(
            Some(node),
            path.to_vec(),
            self.tree.comparator(),
            self.flags,
            None,
            self.tree.scratch(),
        );
        let (flow, calls) = drive(
            &mut walker,
            |node, ctx| self.branch.call(node, ctx, buf),
            Some(&self.halt),
        );

        self.visited.fetch_add(calls, Ordering::Relaxed);
        self.examined.fetch_add(walker.examined(), Ordering::Relaxed);
        if flow != Flow::Finished {
            self.halt.store(true, Ordering::Release);
        }
        flow
    }

    /// Reports the forking node itself for `state`, if that order was
    /// selected.
    fn emit(
        &self,
        node: &'a Node<T>,
        state: VisitState,
        path: &[&'a Node<T>],
        buf: &mut B::Buf,
    ) -> Flow {
        let selected = match state {
            VisitState::Prefix => VisitFlags::PREFIX,
            VisitState::Infix => VisitFlags::INFIX,
            VisitState::Suffix => VisitFlags::SUFFIX,
            VisitState::Breadth => VisitFlags::BREADTH,
        };
        if !self.flags.contains(selected) {
            return Flow::Finished;
        }
        if self.halt.load(Ordering::Acquire) {
            return Flow::Stopped;
        }

        self.visited.fetch_add(1, Ordering::Relaxed);
        let ctx = VisitContext::new(state, path.len(), Lineage::path(path), self.flags);
        let flow = match self.branch.call(node, &ctx, buf) {
            VisitAction::Continue => return Flow::Finished,
            VisitAction::Stop => Flow::Stopped,
            VisitAction::Abort => Flow::Aborted,
        };
        self.halt.store(true, Ordering::Release);
        flow
    }

    /// Visits the subtree at `node`, whose size is about `estimate`.
    fn run(
        &self,
        node: &'a Node<T>,
        path: &[&'a Node<T>],
        estimate: usize,
        buf: &mut B::Buf,
    ) -> Result<Flow> {
        let depth = path.len();
        if estimate <= self.threshold || depth >= self.max_depth {
            return Ok(self.sequential(node, path, buf));
        }

        self.forks.fetch_add(1, Ordering::Relaxed);
        self.examined.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(depth, estimate, "forking visit");

        let flow = self.emit(node, VisitState::Prefix, path, buf);
        if flow != Flow::Finished {
            return Ok(flow);
        }

        let (first, second) = node.children(self.flags.contains(VisitFlags::RIGHT_TO_LEFT));
        let child_estimate = estimate.saturating_sub(1) / 2;

        let flow = job::scope(|s| -> Result<Flow> {
            let first = self.spawn(s, first, path, node, child_estimate)?;
            let second = match self.spawn(s, second, path, node, child_estimate) {
                Ok(job) => job,
                Err(e) => {
                    self.halt.store(true, Ordering::Release);
                    return Err(e);
                }
            };

            let mut flow = self.emit(node, VisitState::Infix, path, buf);
            let mut failure = None;
            for job in [first, second].into_iter().flatten() {
                match self.join(job, buf) {
                    Ok(child) => flow = flow.fold(child),
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
            }
            match failure {
                Some(e) => Err(e),
                None => Ok(flow),
            }
        })?;

        if flow != Flow::Finished {
            return Ok(flow);
        }
        Ok(self.emit(node, VisitState::Suffix, path, buf))
    }

    fn spawn<'scope>(
        &'scope self,
        s: &JobScope<'scope, '_>,
        child: Option<&'a Node<T>>,
        path: &[&'a Node<T>],
        parent: &'a Node<T>,
        estimate: usize,
    ) -> Result<Option<ChildJob<'scope, B::Buf>>>
    where
        'a: 'scope,
    {
        let Some(child) = child else {
            return Ok(None);
        };

        let mut child_path = Vec::with_capacity(path.len() + 1);
        child_path.extend_from_slice(path);
        child_path.push(parent);

        let name = format!("avl-visit-d{}", child_path.len());
        let job = s.run(&name, move |_| {
            let mut buf = self.branch.fresh();
            let flow = self.run(child, &child_path, estimate, &mut buf);
            (flow, buf)
        })?;
        self.jobs.fetch_add(1, Ordering::Relaxed);
        Ok(Some(job))
    }

    fn join(&self, job: ChildJob<'_, B::Buf>, buf: &mut B::Buf) -> Result<Flow> {
        let outcome = job.wait().map_err(|e| {
            self.halt.store(true, Ordering::Release);
            AvlError::from(e)
        })?;

        match outcome {
            Some((flow, child_buf)) => {
                let flow = flow.map_err(|e| {
                    self.halt.store(true, Ordering::Release);
                    e
                })?;
                if self.branch.merge(buf, child_buf)? {
                    self.merges.fetch_add(1, Ordering::Relaxed);
                }
                Ok(flow)
            }
            // Never started, which only happens once the visit is halting.
            None => Ok(Flow::Stopped),
        }
    }
}

impl<T, C> AvlTree<T, C>
where
    T: Sync,
    C: Compare<T> + Sync,
{
    fn fork_visit<'a, B>(
        &'a self,
        flags: VisitFlags,
        branch: &B,
        allow_fork: bool,
    ) -> Result<(VisitSummary, B::Buf)>
    where
        B: Branch<'a, T>,
    {
        let mut buf = branch.fresh();
        let Some(root) = self.root() else {
            return Ok((VisitSummary::default(), buf));
        };

        let fork = Fork::new(self, branch, flags);
        let flow = if allow_fork {
            fork.run(root, &[], self.len(), &mut buf)?
        } else {
            fork.sequential(root, &[], &mut buf)
        };

        let summary = flow.into_summary(fork.summary())?;
        tracing::debug!(
            visited = summary.visited,
            forks = summary.forks,
            jobs = summary.jobs,
            "parallel visit done"
        );
        Ok((summary, buf))
    }

    /// Visits the tree, fanning large subtrees out to jobs.
    ///
    /// The visitor runs concurrently on several threads, so it must be
    /// `Fn + Sync`; visitors that gather results should use
    /// [`par_visit_merge`](Self::par_visit_merge) instead of shared
    /// locking. Within one job, nodes arrive in the order `flags` selects;
    /// across jobs there is no ordering.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for unusable flags, including breadth order
    /// - `VisitAborted` if any visitor call aborted
    /// - `Job` if a job could not be started or panicked
    pub fn par_visit<'a, F>(&'a self, flags: VisitFlags, visitor: F) -> Result<VisitSummary>
    where
        F: Fn(&'a Node<T>, &VisitContext<'a, '_, T>) -> VisitAction + Sync,
    {
        let flags = flags | VisitFlags::PARALLEL;
        flags.validate()?;
        if flags.contains(VisitFlags::MERGE) {
            return Err(AvlError::invalid("merge visits go through par_visit_merge"));
        }

        let (summary, ()) = self.fork_visit(flags, &Plain(visitor), true)?;
        Ok(summary)
    }

    /// Parallel visit where every job collects into a private
    /// [`Collector`]; a parent appends each child's collector to its own
    /// after joining it. The root's collector is returned.
    ///
    /// Items pushed by one sequential subtree stay contiguous and in
    /// traversal order. When the tree holds at least `merge_ceiling`
    /// nodes, the whole visit runs in the calling job instead and
    /// `merges_skipped` is set; results are still complete.
    ///
    /// # Errors
    ///
    /// As [`par_visit`](Self::par_visit), plus any error raised while
    /// merging collectors.
    pub fn par_visit_merge<'a, R, F>(
        &'a self,
        flags: VisitFlags,
        visitor: F,
    ) -> Result<(Collector<R>, VisitSummary)>
    where
        R: Send,
        F: Fn(&'a Node<T>, &VisitContext<'a, '_, T>, &mut Collector<R>) -> VisitAction + Sync,
    {
        let flags = flags | VisitFlags::PARALLEL | VisitFlags::MERGE;
        flags.validate()?;

        let skip = matches!(self.config().merge_ceiling, Some(ceiling) if self.len() >= ceiling);
        if skip {
            tracing::warn!(
                nodes = self.len(),
                ceiling = ?self.config().merge_ceiling,
                "tree exceeds merge ceiling, collecting in a single job"
            );
        }

        let branch = Merging {
            visitor,
            _out: PhantomData,
        };
        let (mut summary, collected) = self.fork_visit(flags, &branch, !skip)?;
        if skip {
            summary.merges_skipped = 1;
        }
        Ok((collected, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::tree::NaturalOrder;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    fn tree_with(n: u32, threshold: usize) -> AvlTree<u32> {
        let config = TreeConfig::new()
            .with_parallel_threshold(threshold)
            .with_max_fork_depth(4);
        let mut tree = AvlTree::with_config(NaturalOrder, config).unwrap();
        for v in 0..n {
            tree.insert(v).unwrap();
        }
        tree
    }

    #[test]
    fn test_par_visit_sees_every_node_once() {
        let tree = tree_with(5000, 100);
        let seen = Mutex::new(Vec::new());
        let summary = tree
            .par_visit(VisitFlags::INFIX, |node, _| {
                seen.lock().unwrap().push(*node.value());
                VisitAction::Continue
            })
            .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..5000).collect::<Vec<_>>());
        assert_eq!(summary.visited, 5000);
        assert!(summary.forks > 0);
        assert_eq!(summary.jobs, 2 * summary.forks);
    }

    #[test]
    fn test_small_tree_does_not_fork() {
        let tree = tree_with(50, 100);
        let summary = tree
            .par_visit(VisitFlags::PREFIX, |_, _| VisitAction::Continue)
            .unwrap();
        assert_eq!(summary.forks, 0);
        assert_eq!(summary.jobs, 0);
        assert_eq!(summary.visited, 50);
    }

    #[test]
    fn test_par_visit_context_matches_sequential() {
        let tree = tree_with(3000, 64);
        let position = |node: &Node<u32>, ctx: &VisitContext<'_, '_, u32>| {
            let chain: Vec<u32> = ctx.ancestors().map(|n| *n.value()).collect();
            (*node.value(), ctx.depth(), ctx.parent().map(|p| *p.value()), chain)
        };

        let mut expected = HashSet::new();
        tree.visit(VisitFlags::PREFIX, |node, ctx| {
            expected.insert(position(node, ctx));
            VisitAction::Continue
        })
        .unwrap();

        let seen = Mutex::new(HashSet::new());
        let summary = tree
            .par_visit(VisitFlags::PREFIX, |node, ctx| {
                seen.lock().unwrap().insert(position(node, ctx));
                VisitAction::Continue
            })
            .unwrap();
        assert!(summary.forks > 0);

        assert_eq!(seen.into_inner().unwrap(), expected);
    }

    #[test]
    fn test_par_visit_keeps_order_within_each_job() {
        let tree = tree_with(20_000, 100);
        let by_thread: Mutex<HashMap<ThreadId, Vec<u32>>> = Mutex::new(HashMap::new());
        let summary = tree
            .par_visit(VisitFlags::INFIX, |node, _| {
                by_thread
                    .lock()
                    .unwrap()
                    .entry(thread::current().id())
                    .or_default()
                    .push(*node.value());
                VisitAction::Continue
            })
            .unwrap();

        let by_thread = by_thread.into_inner().unwrap();
        assert!(summary.jobs > 0);
        assert!(by_thread.len() > 1);
        for values in by_thread.values() {
            assert!(values.windows(2).all(|w| w[0] < w[1]), "{:?}", values);
        }
        assert_eq!(by_thread.values().map(Vec::len).sum::<usize>(), 20_000);
    }

    /// Buffer layout a merge visit produces: a forking node's own infix
    /// entry, then its first child's buffer, then its second's.
    fn merged_infix(
        node: Option<&Node<u32>>,
        depth: usize,
        estimate: usize,
        config: &TreeConfig,
        out: &mut Vec<u32>,
    ) {
        let Some(node) = node else {
            return;
        };
        if estimate <= config.parallel_threshold || depth >= config.max_fork_depth {
            in_order(Some(node), out);
            return;
        }
        out.push(*node.value());
        let child = estimate.saturating_sub(1) / 2;
        merged_infix(node.left(), depth + 1, child, config, out);
        merged_infix(node.right(), depth + 1, child, config, out);
    }

    fn in_order(node: Option<&Node<u32>>, out: &mut Vec<u32>) {
        if let Some(node) = node {
            in_order(node.left(), out);
            out.push(*node.value());
            in_order(node.right(), out);
        }
    }

    #[test]
    fn test_merge_keeps_sequential_runs_contiguous() {
        let tree = tree_with(8000, 150);
        let (collected, summary) = tree
            .par_visit_merge(VisitFlags::INFIX, |node, _, out| {
                match out.push(*node.value()) {
                    Ok(()) => VisitAction::Continue,
                    Err(_) => VisitAction::Abort,
                }
            })
            .unwrap();
        assert!(summary.merges > 0);

        let mut expected = Vec::new();
        merged_infix(tree.root(), 0, tree.len(), tree.config(), &mut expected);
        assert_eq!(collected.into_vec(), expected);
    }

    #[test]
    fn test_par_visit_abort() {
        let tree = tree_with(4000, 100);
        let result = tree.par_visit(VisitFlags::SUFFIX, |node, _| {
            if *node.value() == 1234 {
                VisitAction::Abort
            } else {
                VisitAction::Continue
            }
        });
        assert!(matches!(result, Err(AvlError::VisitAborted)));
    }

    #[test]
    fn test_par_visit_stop() {
        let tree = tree_with(4000, 100);
        let summary = tree
            .par_visit(VisitFlags::INFIX, |node, _| {
                if *node.value() % 500 == 7 {
                    VisitAction::Stop
                } else {
                    VisitAction::Continue
                }
            })
            .unwrap();
        assert!(summary.stopped);
        assert!(summary.visited < 4000);
    }

    #[test]
    fn test_par_visit_rejects_breadth() {
        let tree = tree_with(10, 1);
        let result = tree.par_visit(VisitFlags::BREADTH, |_, _| VisitAction::Continue);
        assert!(matches!(result, Err(AvlError::InvalidArgument(_))));
    }

    #[test]
    fn test_merge_collects_everything() {
        let tree = tree_with(6000, 200);
        let (collected, summary) = tree
            .par_visit_merge(VisitFlags::INFIX, |node, _, out| {
                match out.push(*node.value()) {
                    Ok(()) => VisitAction::Continue,
                    Err(_) => VisitAction::Abort,
                }
            })
            .unwrap();

        assert!(summary.merges > 0);
        assert_eq!(summary.merges_skipped, 0);

        let mut values = collected.into_vec();
        values.sort_unstable();
        assert_eq!(values, (0..6000).collect::<Vec<_>>());
    }

    #[test]
    fn test_merge_ceiling_falls_back_to_single_job() {
        let config = TreeConfig::new()
            .with_parallel_threshold(10)
            .with_merge_ceiling(Some(100));
        let mut tree = AvlTree::with_config(NaturalOrder, config).unwrap();
        for v in 0..500u32 {
            tree.insert(v).unwrap();
        }

        let (collected, summary) = tree
            .par_visit_merge(VisitFlags::INFIX, |node, _, out| {
                let _ = out.push(*node.value());
                VisitAction::Continue
            })
            .unwrap();

        assert_eq!(summary.merges_skipped, 1);
        assert_eq!(summary.jobs, 0);
        // A single sequential walk keeps infix order.
        assert_eq!(collected.into_vec(), (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_par_visit_empty_tree() {
        let tree: AvlTree<u32> = AvlTree::new();
        let (collected, summary) = tree
            .par_visit_merge(VisitFlags::PREFIX, |node, _, out| {
                let _ = out.push(*node.value());
                VisitAction::Continue
            })
            .unwrap();
        assert!(collected.is_empty());
        assert_eq!(summary, VisitSummary::default());
    }
}

mod scenarios;

pub use scenarios::{registry, run_scenarios, BenchContext, BenchOptions, Registry, RunSummary, Scenario};

use crate::config::{InsertPolicy, TreeConfig};
use crate::error::{AvlError, Result};
use crate::metrics::MetricsReport;
use crate::tree::{AvlTree, NaturalOrder, Node};
use crate::visit::{VisitAction, VisitFlags};
use clap::{Parser, Subcommand};
use dashmap::DashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "avlkit")]
#[command(about = "Benchmark and validation harness for the avlkit tree engine", long_about = None)]
pub struct Command {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a tree configuration file
    InitConfig {
        /// Output file
        #[arg(short, long, default_value = "avlkit.json")]
        path: PathBuf,

        /// Duplicate policy (allow-duplicates, reject-error, return-existing, replace)
        #[arg(long)]
        policy: Option<InsertPolicy>,

        /// Subtree size above which parallel visits fork
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Maximum nested forks per parallel visit
        #[arg(long)]
        max_fork_depth: Option<usize>,

        /// Tree size at which merge visits stop fanning out
        #[arg(long)]
        merge_ceiling: Option<usize>,
    },

    /// Run traversal benchmarks
    Bench {
        /// Number of nodes in the benchmark tree
        #[arg(short, long, default_value = "100000")]
        nodes: usize,

        /// Override the configured parallel threshold
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Jobs for the shared-scratch scenario
        #[arg(short = 'j', long, default_value = "4")]
        threads: usize,

        /// Repetitions of whole-tree scenarios
        #[arg(short, long, default_value = "5")]
        repeat: usize,

        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Tree configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run only these scenarios
        #[arg(long)]
        only: Vec<String>,

        /// Skip these scenarios
        #[arg(long)]
        skip: Vec<String>,

        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Randomised insert/remove rounds with invariant checks
    Check {
        /// Values inserted per round
        #[arg(short, long, default_value = "10000")]
        nodes: usize,

        /// Number of rounds
        #[arg(short, long, default_value = "5")]
        rounds: usize,

        /// Override the configured parallel threshold
        #[arg(short, long)]
        threshold: Option<usize>,

        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Tree configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List benchmark scenarios
    Scenarios,
}

pub fn execute_command(cmd: Command) -> Result<()> {
    match cmd.command {
        Commands::InitConfig {
            path,
            policy,
            threshold,
            max_fork_depth,
            merge_ceiling,
        } => execute_init_config_command(path, policy, threshold, max_fork_depth, merge_ceiling),
        Commands::Bench {
            nodes,
            threshold,
            threads,
            repeat,
            seed,
            config,
            only,
            skip,
            json,
        } => {
            let options = BenchOptions {
                nodes,
                threads,
                seed,
                repeat,
            };
            let report = execute_bench_command(options, threshold, config, &only, &skip)?;
            print_bench_report(&report, json)
        }
        Commands::Check {
            nodes,
            rounds,
            threshold,
            seed,
            config,
        } => {
            let report = execute_check_command(nodes, rounds, threshold, seed, config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Scenarios => {
            for (name, scenario) in registry().iter() {
                let note = if scenario.exclude.is_some() { " (conditional)" } else { "" };
                println!("{}{}", name, note);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>, threshold: Option<usize>) -> Result<TreeConfig> {
    let mut config = match path {
        Some(path) => TreeConfig::load(path)?,
        None => TreeConfig::default(),
    };
    if let Some(threshold) = threshold {
        config = config.with_parallel_threshold(threshold);
    }
    config.validate()?;
    Ok(config)
}

fn execute_init_config_command(
    path: PathBuf,
    policy: Option<InsertPolicy>,
    threshold: Option<usize>,
    max_fork_depth: Option<usize>,
    merge_ceiling: Option<usize>,
) -> Result<()> {
    let mut config = TreeConfig::new().with_merge_ceiling(merge_ceiling);
    if let Some(policy) = policy {
        config = config.with_policy(policy);
    }
    if let Some(threshold) = threshold {
        config = config.with_parallel_threshold(threshold);
    }
    if let Some(depth) = max_fork_depth {
        config = config.with_max_fork_depth(depth);
    }

    config.validate()?;
    config.save(&path)?;

    println!("Wrote configuration to {}", path.display());
    println!("  policy: {:?}", config.policy);
    println!("  parallel threshold: {}", config.parallel_threshold);
    println!("  max fork depth: {}", config.max_fork_depth);
    match config.merge_ceiling {
        Some(ceiling) => println!("  merge ceiling: {}", ceiling),
        None => println!("  merge ceiling: none"),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub nodes: usize,
    pub height: usize,
    pub parallel_threshold: usize,
    pub build_secs: f64,
    pub scenarios: RunSummary,
    pub metrics: MetricsReport,
}

fn execute_bench_command(
    options: BenchOptions,
    threshold: Option<usize>,
    config: Option<PathBuf>,
    only: &[String],
    skip: &[String],
) -> Result<BenchReport> {
    if options.threads == 0 {
        return Err(AvlError::invalid("threads must be at least 1"));
    }
    if options.repeat == 0 {
        return Err(AvlError::invalid("repeat must be at least 1"));
    }

    let config = load_config(config, threshold)?;
    let tree = AvlTree::with_config(NaturalOrder, config)?;

    tracing::info!(nodes = options.nodes, seed = options.seed, "building benchmark tree");
    let start = Instant::now();
    let ctx = BenchContext::prepare(options, tree)?;
    let build_secs = start.elapsed().as_secs_f64();

    let scenarios = run_scenarios(&registry(), &ctx, only, skip)?;

    Ok(BenchReport {
        nodes: ctx.tree.len(),
        height: ctx.tree.depth(),
        parallel_threshold: ctx.tree.config().parallel_threshold,
        build_secs,
        scenarios,
        metrics: ctx.metrics.report(Some(ctx.scratch.stats())),
    })
}

fn print_bench_report(report: &BenchReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("=== avlkit Benchmark ===");
    println!("Tree: {} nodes, height {}", report.nodes, report.height);
    println!("Parallel threshold: {}", report.parallel_threshold);
    println!("Build time: {:.3} s", report.build_secs);
    println!();

    println!("Scenarios run: {}", report.scenarios.ran.join(", "));
    for (name, reason) in &report.scenarios.skipped {
        println!("  skipped {}: {}", name, reason);
    }
    println!();

    println!("Latency Percentiles (microseconds):");
    for (operation, latency) in &report.metrics.operation_latencies {
        println!("  {} ({} samples):", operation, latency.samples);
        println!("    p50: {:.2} µs", latency.p50);
        println!("    p95: {:.2} µs", latency.p95);
        println!("    p99: {:.2} µs", latency.p99);
        println!("    max: {:.2} µs", latency.max);
    }
    println!();

    println!("Traversal Counters:");
    println!("  nodes visited: {}", report.metrics.visited);
    println!("  jobs started: {}", report.metrics.jobs);
    println!("  merges: {}", report.metrics.merges);
    println!("  merges skipped: {}", report.metrics.merges_skipped);
    if let Some(scratch) = &report.metrics.scratch {
        println!(
            "  scratch lends: {} ({} reused, peak capacity {})",
            scratch.lends, scratch.reuses, scratch.peak_capacity
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub rounds: usize,
    pub inserted: usize,
    pub removed: usize,
    pub len: usize,
    pub height: usize,
    pub parallel_visited: usize,
    pub parallel_jobs: usize,
}

/// Grows and shrinks one tree at random, auditing after every round, then
/// checks that a parallel visit reaches every node exactly once.
fn execute_check_command(
    nodes: usize,
    rounds: usize,
    threshold: Option<usize>,
    seed: u64,
    config: Option<PathBuf>,
) -> Result<CheckReport> {
    let config = load_config(config, threshold)?.with_policy(InsertPolicy::AllowDuplicates);
    let mut tree = AvlTree::with_config(NaturalOrder, config)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut live: Vec<u64> = Vec::new();
    let mut inserted = 0;
    let mut removed = 0;
    let upper = (nodes as u64).saturating_mul(4).max(1);

    for round in 0..rounds {
        for _ in 0..nodes {
            let value = rng.gen_range(0..upper);
            tree.insert(value)?;
            live.push(value);
            inserted += 1;
        }
        for _ in 0..live.len() / 2 {
            let index = rng.gen_range(0..live.len());
            let value = live.swap_remove(index);
            tree.remove(&value)?;
            removed += 1;
        }

        let audit = tree.audit()?;
        if audit.nodes != live.len() {
            return Err(AvlError::Corrupted {
                depth: 0,
                reason: format!("expected {} nodes, found {}", live.len(), audit.nodes),
            });
        }
        tracing::info!(round, nodes = audit.nodes, height = audit.height, "round audited");
    }

    let seen: DashSet<usize> = DashSet::new();
    let summary = tree.par_visit(VisitFlags::PREFIX, |node, _| {
        let id = node as *const Node<u64> as usize;
        if seen.insert(id) {
            VisitAction::Continue
        } else {
            VisitAction::Abort
        }
    })?;

    if seen.len() != tree.len() {
        return Err(AvlError::Corrupted {
            depth: 0,
            reason: format!("parallel visit reached {} of {} nodes", seen.len(), tree.len()),
        });
    }

    Ok(CheckReport {
        rounds,
        inserted,
        removed,
        len: tree.len(),
        height: tree.depth(),
        parallel_visited: summary.visited,
        parallel_jobs: summary.jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tree.json");

        execute_init_config_command(
            path.clone(),
            Some(InsertPolicy::Replace),
            Some(256),
            None,
            Some(5000),
        )
        .unwrap();

        let config = TreeConfig::load(&path).unwrap();
        assert_eq!(config.policy, InsertPolicy::Replace);
        assert_eq!(config.parallel_threshold, 256);
        assert_eq!(config.max_fork_depth, 6);
        assert_eq!(config.merge_ceiling, Some(5000));
    }

    #[test]
    fn test_init_config_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tree.json");

        let result = execute_init_config_command(path.clone(), None, Some(0), None, None);
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_check_command() {
        let report = execute_check_command(500, 3, Some(64), 9, None).unwrap();
        assert_eq!(report.rounds, 3);
        assert_eq!(report.len, report.inserted - report.removed);
        assert_eq!(report.parallel_visited, report.len);
        assert!(report.parallel_jobs > 0);
    }

    #[test]
    fn test_bench_command_small() {
        let options = BenchOptions {
            nodes: 2000,
            threads: 2,
            seed: 1,
            repeat: 1,
        };
        let report = execute_bench_command(options, Some(500), None, &[], &[]).unwrap();

        assert_eq!(report.nodes, 2000);
        assert!(report.scenarios.skipped.is_empty());
        assert!(report.metrics.operation_latencies.contains_key("par_merge"));
        assert!(report.metrics.scratch.is_some());
        assert!(serde_json::to_string(&report).is_ok());
    }

    #[test]
    fn test_bench_command_validation() {
        let options = BenchOptions {
            nodes: 10,
            threads: 0,
            seed: 1,
            repeat: 1,
        };
        assert!(execute_bench_command(options, None, None, &[], &[]).is_err());
    }

    #[test]
    fn test_command_parsing() {
        let args = vec!["avlkit", "init-config", "--path", "/tmp/t.json", "--policy", "reject-error"];
        assert!(Command::try_parse_from(args).is_ok());

        let args = vec!["avlkit", "init-config", "--policy", "sometimes"];
        assert!(Command::try_parse_from(args).is_err());

        let args = vec![
            "avlkit", "bench", "--nodes", "5000", "--threshold", "100", "--only", "range", "--json",
        ];
        assert!(Command::try_parse_from(args).is_ok());

        let args = vec!["avlkit", "check", "--nodes", "100", "--rounds", "2"];
        assert!(Command::try_parse_from(args).is_ok());

        let args = vec!["avlkit", "scenarios"];
        assert!(Command::try_parse_from(args).is_ok());
    }
}

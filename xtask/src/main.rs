use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "idcompact workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the compaction suite once per global allocator and compare
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Worker threads per table (0 = one per core)
        #[arg(long, default_value_t = 0)]
        threads: usize,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
}

const ALLOCATORS: &[&str] = &["alloc-system", "alloc-mimalloc", "alloc-snmalloc", "alloc-jemalloc"];
const BASELINE: &str = "system";
const REPORT: &str = "benchmark_results/report.md";

/// `estimates.json` as written by criterion, reduced to what the report needs.
#[derive(Deserialize)]
struct Estimates {
    mean: Estimate,
}

#[derive(Deserialize)]
struct Estimate {
    point_estimate: f64,
}

/// `benchmark.json`, stored next to `estimates.json`; only the element throughput is read.
#[derive(Deserialize)]
struct BenchmarkMeta {
    throughput: Option<ThroughputMeta>,
}

#[derive(Deserialize)]
struct ThroughputMeta {
    #[serde(rename = "Elements")]
    elements: Option<f64>,
}

/// workload -> allocator -> operations (or elements) per second
type Results = BTreeMap<String, BTreeMap<String, f64>>;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, threads, report_only } => {
            if !report_only {
                run_benchmarks(quick, threads)?;
            }
            generate_report(threads)?;
        }
    }

    Ok(())
}

fn baseline_name(feature: &str) -> &str {
    feature.trim_start_matches("alloc-")
}

fn run_benchmarks(quick: bool, threads: usize) -> Result<()> {
    println!("Compiling compaction suite...");
    let status = Command::new("cargo")
        .args(["build", "--bench", "suite", "--release"])
        .status()
        .context("failed to spawn cargo")?;
    if !status.success() {
        anyhow::bail!("Failed to compile benchmarks");
    }

    for feature in ALLOCATORS {
        println!("\n>>> {feature} (threads = {threads})");
        let start = Instant::now();

        let mut cmd = Command::new("cargo");
        cmd.env("CARGO_INCREMENTAL", "0")
            .env("IDCOMPACT_THREADS", threads.to_string())
            .args(["bench", "--bench", "suite", "--no-default-features", "--features", feature])
            .args(["--", "--save-baseline", baseline_name(feature)]);

        if quick {
            cmd.args(["--measurement-time", "0.1", "--sample-size", "10", "--noplot"]);
        }

        let status = cmd.status().with_context(|| format!("failed to run suite with {feature}"))?;
        if status.success() {
            println!("Finished {feature} in {:.2?}", start.elapsed());
        } else {
            eprintln!("Warning: suite failed with {feature}");
        }
    }

    Ok(())
}

fn generate_report(threads: usize) -> Result<()> {
    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    for estimates in find_estimates(criterion_dir)? {
        if let Some((workload, baseline, rate)) = read_rate(&estimates) {
            results.entry(workload).or_default().insert(baseline, rate);
        }
    }

    let report_path = Path::new(REPORT);
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path).with_context(|| format!("cannot create {REPORT}"))?;

    writeln!(file, "# Compaction Benchmark Report")?;
    writeln!(file)?;
    writeln!(file, "Worker threads: {}", if threads == 0 { "all cores".to_string() } else { threads.to_string() })?;
    writeln!(file)?;

    write!(file, "| Workload |")?;
    for feature in ALLOCATORS {
        write!(file, " {} | vs {BASELINE} |", baseline_name(feature))?;
    }
    writeln!(file)?;
    write!(file, "|---|")?;
    for _ in ALLOCATORS {
        write!(file, "---|---|")?;
    }
    writeln!(file)?;

    for (workload, by_alloc) in &results {
        write!(file, "| {workload} |")?;
        let base = by_alloc.get(BASELINE).copied();
        for feature in ALLOCATORS {
            match by_alloc.get(baseline_name(feature)) {
                Some(&rate) => {
                    let rel = base.filter(|b| *b > 0.0).map_or(0.0, |b| rate / b);
                    write!(file, " {} | **{rel:.2}x** |", human_rate(rate))?;
                }
                None => write!(file, " N/A | - |")?,
            }
        }
        writeln!(file)?;
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn human_rate(rate: f64) -> String {
    if rate > 1e6 {
        format!("{:.2}M/s", rate / 1e6)
    } else if rate > 1e3 {
        format!("{:.2}K/s", rate / 1e3)
    } else {
        format!("{rate:.0}/s")
    }
}

/// Every `<workload>/<baseline>/estimates.json` below `dir`.
fn find_estimates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(find_estimates(&path)?);
        } else if path.file_name().is_some_and(|n| n == "estimates.json") {
            found.push(path);
        }
    }
    Ok(found)
}

/// Reads one estimate as (workload, baseline, rate). Skips criterion's own
/// `report`, `new`, `base` and `change` directories.
fn read_rate(estimates: &Path) -> Option<(String, String, f64)> {
    let baseline_dir = estimates.parent()?;
    let workload_dir = baseline_dir.parent()?;
    let baseline = baseline_dir.file_name()?.to_str()?.to_string();
    let workload = workload_dir.file_name()?.to_str()?.to_string();
    if ["report", "new", "base", "change"].contains(&baseline.as_str()) || workload == "report" {
        return None;
    }

    let mean: Estimates = serde_json::from_str(&fs::read_to_string(estimates).ok()?).ok()?;
    let time_ns = mean.mean.point_estimate;
    if time_ns <= 0.0 {
        return None;
    }

    let elements = fs::read_to_string(baseline_dir.join("benchmark.json"))
        .ok()
        .and_then(|s| serde_json::from_str::<BenchmarkMeta>(&s).ok())
        .and_then(|m| m.throughput)
        .and_then(|t| t.elements)
        .unwrap_or(1.0);

    Some((workload, baseline, elements * 1e9 / time_ns))
}

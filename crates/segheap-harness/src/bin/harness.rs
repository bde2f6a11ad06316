//! Command-line workload runner.

use std::process::ExitCode;

use clap::Parser;
use segheap_harness::{Workload, WorkloadSpec};

#[derive(Parser, Debug)]
#[command(name = "harness", about = "Deterministic segheap workload runner")]
struct Args {
    /// Number of trace operations.
    #[arg(long, default_value_t = 10_000)]
    ops: u64,

    /// Trace seed.
    #[arg(long, default_value_t = 0xa5a5_5a5a_dead_beef)]
    seed: u64,

    /// Partition memory limit in bytes.
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    memory_limit: usize,

    /// Segment growth granularity in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    min_segment_size: usize,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Include per-block detail in the partition dump.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut workload = Workload::new(WorkloadSpec {
        ops: args.ops,
        seed: args.seed,
        memory_limit: args.memory_limit,
        min_segment_size: args.min_segment_size,
    });
    let report = match workload.run() {
        Ok(report) => report,
        Err(err) => {
            eprintln!("harness: {err}");
            return ExitCode::FAILURE;
        }
    };
    if args.json {
        match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("harness: report serialization: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", report.summary());
        print!("{}", workload.show(args.verbose));
    }
    ExitCode::SUCCESS
}

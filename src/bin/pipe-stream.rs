//! CLI tool to run a chain of stream operations over integer input.
//!
//! Usage:
//!   pipe-stream <input.data> --op distinct --op sort --op limit=10
//!   cat numbers.txt | pipe-stream --op even --op par-square --count

use clap::Parser;
use pipestream::{OutputMode, PoolConfig, execute_file, execute_ops, parse_ops};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Run stream operations over one integer per line.
#[derive(Parser)]
#[command(name = "pipe-stream")]
struct Cli {
    /// Input data file (reads stdin when omitted)
    input: Option<String>,

    /// Operation to apply, in order (e.g. distinct, sort, limit=5, window=3)
    #[arg(long = "op")]
    ops: Vec<String>,

    /// Print the number of results instead of the results
    #[arg(long, conflicts_with = "sum")]
    count: bool,

    /// Print the sum of the results instead of the results
    #[arg(long)]
    sum: bool,

    /// Worker threads for par-square (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Log stage construction and record counts on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let ops = match parse_ops(&cli.ops) {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    let mode = if cli.count {
        OutputMode::Count
    } else if cli.sum {
        OutputMode::Sum
    } else {
        OutputMode::Lines
    };

    let pool = match cli.workers {
        Some(workers) => PoolConfig::new().workers(workers),
        None => PoolConfig::default(),
    };

    let result = match &cli.input {
        Some(path) => execute_file(Path::new(path), &ops, mode, pool),
        None => {
            let mut input_text = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut input_text) {
                eprintln!("Error reading stdin: {e}");
                process::exit(1);
            }
            execute_ops(&input_text, &ops, mode, pool)
        }
    };

    match result {
        Ok((output, input_count, output_count)) => {
            if let Err(e) = io::stdout().write_all(output.as_bytes()) {
                eprintln!("Error writing output: {e}");
                process::exit(1);
            }
            if !output.is_empty() && !output.ends_with('\n') {
                println!();
            }
            tracing::info!(input_count, output_count, "finished");
        }
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            process::exit(1);
        }
    }
}

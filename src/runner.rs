//! Operation list parser and executor behind the `pipe-stream` binary.
//!
//! Input is one integer per line; blank lines are ignored and lines that
//! do not parse are skipped with a warning. Operations are applied in
//! order:
//!
//! - `distinct` - drop repeated values
//! - `sort` - ascending order
//! - `limit=N` - keep the first N values
//! - `skip=N` - drop the first N values
//!
//! Negative sizes are treated as zero.
//! - `square` - square each value
//! - `par-square` - square each value on the worker pool (unordered)
//! - `even` / `odd` - keep even / odd values
//! - `window=N` - print sliding windows of N values (must be last)

use std::fs;
use std::num::ParseIntError;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::executor::{PoolConfig, WorkerPool};
use crate::pipeline::Pipeline;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("unknown operation '{0}'")]
    UnknownOp(String),

    #[error("operation '{op}' needs a numeric argument, got '{value}'")]
    BadArgument { op: String, value: String },

    #[error("{0} must be the last operation")]
    NotLast(&'static str),

    #[error("sum overflows a 64-bit integer")]
    SumOverflow,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// A value whose square does not fit in an `i64`.
#[derive(Debug, Error)]
#[error("squaring {0} overflows a 64-bit integer")]
pub struct SquareOverflow(pub i64);

fn checked_square(x: i64) -> Result<i64, SquareOverflow> {
    x.checked_mul(x).ok_or(SquareOverflow(x))
}

/// One step of the demo pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Distinct,
    Sort,
    Limit(usize),
    Skip(usize),
    Square,
    ParSquare,
    Even,
    Odd,
    Window(usize),
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Distinct => "distinct",
            Op::Sort => "sort",
            Op::Limit(_) => "limit",
            Op::Skip(_) => "skip",
            Op::Square => "square",
            Op::ParSquare => "par-square",
            Op::Even => "even",
            Op::Odd => "odd",
            Op::Window(_) => "window",
        }
    }
}

/// What to print once the operations have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One value (or window) per line.
    #[default]
    Lines,
    /// The number of values.
    Count,
    /// The sum of the values.
    Sum,
}

/// Parse `name` or `name=N` operation words.
pub fn parse_ops<S: AsRef<str>>(words: &[S]) -> Result<Vec<Op>, RunError> {
    let ops = words
        .iter()
        .map(|word| parse_op(word.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(pos) = ops.iter().position(|op| matches!(op, Op::Window(_)))
        && pos + 1 != ops.len()
    {
        return Err(RunError::NotLast("window"));
    }
    Ok(ops)
}

fn parse_op(word: &str) -> Result<Op, RunError> {
    let (name, arg) = match word.split_once('=') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (word.trim(), None),
    };
    let lowered = name.to_ascii_lowercase();

    let number = |op: &str| -> Result<usize, RunError> {
        let value = arg.unwrap_or("");
        let n: i128 = value.parse().map_err(|_| RunError::BadArgument {
            op: op.to_string(),
            value: value.to_string(),
        })?;
        Ok(usize::try_from(n.max(0)).unwrap_or(usize::MAX))
    };

    match lowered.as_str() {
        "distinct" => Ok(Op::Distinct),
        "sort" => Ok(Op::Sort),
        "limit" => Ok(Op::Limit(number("limit")?)),
        "skip" => Ok(Op::Skip(number("skip")?)),
        "square" => Ok(Op::Square),
        "par-square" => Ok(Op::ParSquare),
        "even" => Ok(Op::Even),
        "odd" => Ok(Op::Odd),
        "window" => Ok(Op::Window(number("window")?)),
        _ => Err(RunError::UnknownOp(word.to_string())),
    }
}

/// Run `ops` over the integers in `input_text`.
///
/// Returns (output_text, input_count, output_count) on success.
pub fn execute_ops(
    input_text: &str,
    ops: &[Op],
    mode: OutputMode,
    pool: PoolConfig,
) -> Result<(String, usize, usize), RunError> {
    let lines: Vec<&str> = input_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let input_count = lines.len();

    let mut pipeline = Pipeline::new(lines)
        .try_map(str::parse::<i64>)
        .catch(|err: ParseIntError| {
            warn!(%err, "skipping unparseable line");
            None
        });

    let mut window = None;
    for op in ops {
        debug!(op = op.name(), "adding stage");
        pipeline = match *op {
            Op::Distinct => pipeline.distinct(),
            Op::Sort => pipeline.sorted(),
            Op::Limit(n) => pipeline.limit(n),
            Op::Skip(n) => pipeline.skip(n),
            Op::Square => pipeline.try_map(checked_square),
            Op::ParSquare => pipeline
                .par_map_on(WorkerPool::new(pool)?, checked_square)
                .try_map(|squared| squared),
            Op::Even => pipeline.filter(|x| x % 2 == 0),
            Op::Odd => pipeline.filter(|x| x % 2 != 0),
            Op::Window(size) => {
                window = Some(size);
                pipeline
            }
        };
    }

    let rows: Pipeline<'_, String> = match window {
        Some(size) => pipeline.window(size).map(|w| {
            w.iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        }),
        None => pipeline.map(|x| x.to_string()),
    };

    let (output_text, output_count) = match mode {
        OutputMode::Lines => {
            let rows: Vec<String> = rows.collect()?;
            (rows.join("\n"), rows.len())
        }
        OutputMode::Count => {
            let count = rows.count()?;
            (count.to_string(), 1)
        }
        OutputMode::Sum => {
            let sum = rows
                .map(|row| {
                    row.split(' ')
                        .filter_map(|v| v.parse::<i64>().ok())
                        .try_fold(0i64, i64::checked_add)
                })
                .fold(Some(0i64), |acc, row| acc?.checked_add(row?))?
                .ok_or(RunError::SumOverflow)?;
            (sum.to_string(), 1)
        }
    };

    Ok((output_text, input_count, output_count))
}

/// Read `path` and run `ops` over its contents.
pub fn execute_file(
    path: &Path,
    ops: &[Op],
    mode: OutputMode,
    pool: PoolConfig,
) -> Result<(String, usize, usize), RunError> {
    let input_text = fs::read_to_string(path)?;
    execute_ops(&input_text, ops, mode, pool)
}

//! # pipestream
//!
//! Lazy, chainable, single-pass sequence pipelines.
//!
//! A [`Pipeline`] wraps a forward-only source. Intermediate operations
//! (`map`, `filter`, `window`, `distinct`, `limit`, `catch`, ...) return a
//! new pipeline without touching the source; a terminal operation (`collect`,
//! `reduce`, `group`, `any_match`, ...) drives the whole chain once, one
//! element at a time, left to right.
//!
//! ## Overview
//!
//! - **Laziness**: nothing is pulled until a terminal operation runs
//! - **Single pass**: an exhausted pipeline stays exhausted
//! - **Element-scoped errors**: a fallible stage yields an error for one
//!   element; `catch` resolves it and iteration carries on
//! - **Short-circuiting**: `first`, `find`, `limit` and the match
//!   operations stop pulling as soon as the answer is known
//!
//! ## Example
//!
//! ```
//! use std::num::ParseIntError;
//! use pipestream::{Grouper, Pipeline};
//!
//! let lines = vec!["3", "1", "x", "4", "1", "5"];
//!
//! let result: Vec<i32> = Pipeline::new(lines)
//!     .try_map(str::parse::<i32>)
//!     .catch(|_: ParseIntError| None)
//!     .distinct()
//!     .sorted()
//!     .collect()
//!     .unwrap();
//!
//! assert_eq!(result, vec![1, 3, 4, 5]);
//!
//! let groups = Pipeline::new(vec!["apple", "banana", "cherry"])
//!     .group(|s| s.len(), |s| s.to_uppercase(), Grouper::appending())
//!     .unwrap();
//!
//! assert_eq!(groups[&6], vec!["BANANA", "CHERRY"]);
//! ```

pub mod compose;
pub mod error;
pub mod executor;
pub mod grouper;
pub mod pipeline;
pub mod runner;
pub mod stage;

pub use compose::compose;
pub use error::{BoxError, PipelineError, Result};
pub use executor::{ParallelExecutor, PoolConfig, WorkerPool};
pub use grouper::{Combined, Grouper};
pub use pipeline::{Pipeline, Producer};
pub use runner::{Op, OutputMode, RunError, execute_ops, execute_file, parse_ops};

//! Pull-based stage adapters.
//!
//! Each stage wraps the producer of the stage before it and pulls from it
//! only when its own `next` is called. Errors on the channel are forwarded
//! in position: stages never count, buffer, deduplicate or test them.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use crate::error::{PipelineError, Result};
use crate::pipeline::Producer;

/// Builds its producer on the first pull and drops it once exhausted.
pub struct Deferred<'a, T> {
    pending: Option<Box<dyn FnOnce() -> Producer<'a, T> + 'a>>,
    running: Option<Producer<'a, T>>,
}

impl<'a, T> Deferred<'a, T> {
    pub fn new(start: impl FnOnce() -> Producer<'a, T> + 'a) -> Self {
        Self {
            pending: Some(Box::new(start)),
            running: None,
        }
    }
}

impl<T> Iterator for Deferred<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(start) = self.pending.take() {
            self.running = Some(start());
        }
        let item = self.running.as_mut()?.next();
        if item.is_none() {
            self.running = None;
        }
        item
    }
}

/// Yields every element of every sub-sequence, in order.
pub struct Flatten<'a, T: IntoIterator> {
    upstream: Producer<'a, T>,
    current: Option<T::IntoIter>,
}

impl<'a, T: IntoIterator> Flatten<'a, T> {
    pub fn new(upstream: Producer<'a, T>) -> Self {
        Self {
            upstream,
            current: None,
        }
    }
}

impl<T: IntoIterator> Iterator for Flatten<'_, T> {
    type Item = Result<T::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(inner) = self.current.as_mut() {
                if let Some(value) = inner.next() {
                    return Some(Ok(value));
                }
                self.current = None;
            }
            match self.upstream.next()? {
                Ok(nested) => self.current = Some(nested.into_iter()),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// First occurrence of each element only.
pub struct Distinct<'a, T> {
    upstream: Producer<'a, T>,
    seen: HashSet<T>,
}

impl<'a, T> Distinct<'a, T> {
    pub fn new(upstream: Producer<'a, T>) -> Self {
        Self {
            upstream,
            seen: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> Iterator for Distinct<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.upstream.next()? {
                Ok(value) => {
                    if self.seen.insert(value.clone()) {
                        return Some(Ok(value));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Sliding window of the last `size` elements, advancing by one.
pub struct Window<'a, T> {
    upstream: Producer<'a, T>,
    size: usize,
    buffer: VecDeque<T>,
}

impl<'a, T> Window<'a, T> {
    pub fn new(upstream: Producer<'a, T>, size: usize) -> Self {
        Self {
            upstream,
            size,
            buffer: VecDeque::new(),
        }
    }
}

impl<T: Clone> Iterator for Window<'_, T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.size == 0 {
            return None;
        }
        loop {
            match self.upstream.next()? {
                Ok(value) => {
                    if self.buffer.len() == self.size {
                        self.buffer.pop_front();
                    }
                    self.buffer.push_back(value);
                    if self.buffer.len() == self.size {
                        return Some(Ok(self.buffer.iter().cloned().collect()));
                    }
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// At most `remaining` values; never pulls upstream once the quota is met.
pub struct Limit<'a, T> {
    upstream: Producer<'a, T>,
    remaining: usize,
}

impl<'a, T> Limit<'a, T> {
    pub fn new(upstream: Producer<'a, T>, n: usize) -> Self {
        Self {
            upstream,
            remaining: n,
        }
    }
}

impl<T> Iterator for Limit<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.upstream.next()?;
        if item.is_ok() {
            self.remaining -= 1;
        }
        Some(item)
    }
}

/// Drops the first `remaining` values.
pub struct Skip<'a, T> {
    upstream: Producer<'a, T>,
    remaining: usize,
}

impl<'a, T> Skip<'a, T> {
    pub fn new(upstream: Producer<'a, T>, n: usize) -> Self {
        Self {
            upstream,
            remaining: n,
        }
    }
}

impl<T> Iterator for Skip<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.upstream.next()?;
            if self.remaining > 0 && item.is_ok() {
                self.remaining -= 1;
                continue;
            }
            return Some(item);
        }
    }
}

pub struct TakeWhile<'a, T, P> {
    upstream: Producer<'a, T>,
    pred: P,
    done: bool,
}

impl<'a, T, P> TakeWhile<'a, T, P> {
    pub fn new(upstream: Producer<'a, T>, pred: P) -> Self {
        Self {
            upstream,
            pred,
            done: false,
        }
    }
}

impl<T, P: FnMut(&T) -> bool> Iterator for TakeWhile<'_, T, P> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.upstream.next()? {
            Ok(value) if (self.pred)(&value) => Some(Ok(value)),
            Ok(_) => {
                self.done = true;
                None
            }
            Err(err) => Some(Err(err)),
        }
    }
}

pub struct SkipWhile<'a, T, P> {
    upstream: Producer<'a, T>,
    pred: P,
    skipping: bool,
}

impl<'a, T, P> SkipWhile<'a, T, P> {
    pub fn new(upstream: Producer<'a, T>, pred: P) -> Self {
        Self {
            upstream,
            pred,
            skipping: true,
        }
    }
}

impl<T, P: FnMut(&T) -> bool> Iterator for SkipWhile<'_, T, P> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.upstream.next()?;
            if self.skipping
                && let Ok(value) = &item
            {
                if (self.pred)(value) {
                    continue;
                }
                self.skipping = false;
            }
            return Some(item);
        }
    }
}

/// Resolves errors through `resolve`, one element at a time.
///
/// `resolve` returns `Ok(Some(v))` to substitute, `Ok(None)` to drop the
/// failed element, or `Err(e)` to forward an error it does not handle.
pub struct Catch<'a, T, H> {
    upstream: Producer<'a, T>,
    resolve: H,
}

impl<'a, T, H> Catch<'a, T, H> {
    pub fn new(upstream: Producer<'a, T>, resolve: H) -> Self {
        Self { upstream, resolve }
    }
}

impl<T, H> Iterator for Catch<'_, T, H>
where
    H: FnMut(PipelineError) -> Result<Option<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.upstream.next()? {
                Ok(value) => return Some(Ok(value)),
                Err(err) => match (self.resolve)(err) {
                    Ok(Some(substitute)) => return Some(Ok(substitute)),
                    Ok(None) => continue,
                    Err(unhandled) => return Some(Err(unhandled)),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn producer<'a, T: 'a>(items: Vec<Result<T>>) -> Producer<'a, T> {
        Box::new(items.into_iter())
    }

    fn oks<'a, T: 'a>(items: Vec<T>) -> Producer<'a, T> {
        Box::new(items.into_iter().map(Ok))
    }

    fn shape<T>(items: impl Iterator<Item = Result<T>>) -> Vec<std::result::Result<T, String>> {
        items.map(|r| r.map_err(|e| e.to_string())).collect()
    }

    #[test]
    fn test_deferred_starts_on_first_pull() {
        let started = Cell::new(false);
        let mut stage = Deferred::new(|| {
            started.set(true);
            oks(vec![1, 2])
        });
        assert!(!started.get());
        assert_eq!(stage.next().unwrap().unwrap(), 1);
        assert!(started.get());
        assert_eq!(stage.next().unwrap().unwrap(), 2);
        assert!(stage.next().is_none());
        assert!(stage.next().is_none());
    }

    #[test]
    fn test_flatten_skips_empty_inner() {
        let stage = Flatten::new(oks(vec![vec![1, 2], vec![], vec![3]]));
        assert_eq!(shape(stage), vec![Ok(1), Ok(2), Ok(3)]);
    }

    #[test]
    fn test_flatten_forwards_error() {
        let stage = Flatten::new(producer(vec![
            Ok(vec![1]),
            Err(PipelineError::element("broken")),
            Ok(vec![2]),
        ]));
        assert_eq!(
            shape(stage),
            vec![Ok(1), Err("broken".to_string()), Ok(2)]
        );
    }

    #[test]
    fn test_distinct_keeps_first_occurrences() {
        let stage = Distinct::new(oks(vec![3, 2, 3, 1, 3, 2, 2]));
        assert_eq!(shape(stage), vec![Ok(3), Ok(2), Ok(1)]);
    }

    #[test]
    fn test_window_slides_by_one() {
        let stage = Window::new(oks(vec![1, 2, 3, 4]), 2);
        assert_eq!(
            shape(stage),
            vec![Ok(vec![1, 2]), Ok(vec![2, 3]), Ok(vec![3, 4])]
        );
    }

    #[test]
    fn test_window_zero_never_pulls() {
        let pulled = Cell::new(0);
        let upstream: Producer<'_, i32> = Box::new((0..5).map(|x| {
            pulled.set(pulled.get() + 1);
            Ok(x)
        }));
        assert_eq!(Window::new(upstream, 0).count(), 0);
        assert_eq!(pulled.get(), 0);
    }

    #[test]
    fn test_window_larger_than_source() {
        let stage = Window::new(oks(vec![1, 2, 3]), usize::MAX);
        assert_eq!(shape(stage), Vec::<std::result::Result<Vec<i32>, String>>::new());
    }

    #[test]
    fn test_window_forwards_error_unbuffered() {
        let stage = Window::new(
            producer(vec![Ok(1), Err(PipelineError::element("e")), Ok(2), Ok(3)]),
            2,
        );
        assert_eq!(
            shape(stage),
            vec![Err("e".to_string()), Ok(vec![1, 2]), Ok(vec![2, 3])]
        );
    }

    #[test]
    fn test_distinct_never_dedups_errors() {
        let stage = Distinct::new(producer(vec![
            Ok(1),
            Err(PipelineError::element("e")),
            Ok(1),
            Err(PipelineError::element("e")),
            Ok(2),
        ]));
        assert_eq!(
            shape(stage),
            vec![Ok(1), Err("e".to_string()), Err("e".to_string()), Ok(2)]
        );
    }

    #[test]
    fn test_limit_stops_pulling() {
        let pulled = Cell::new(0);
        let upstream: Producer<'_, i32> = Box::new((0..100).map(|x| {
            pulled.set(pulled.get() + 1);
            Ok(x)
        }));
        let taken: Vec<_> = shape(Limit::new(upstream, 3));
        assert_eq!(taken, vec![Ok(0), Ok(1), Ok(2)]);
        assert_eq!(pulled.get(), 3);
    }

    #[test]
    fn test_limit_does_not_count_errors() {
        let stage = Limit::new(
            producer(vec![Ok(1), Err(PipelineError::element("e")), Ok(2), Ok(3)]),
            2,
        );
        assert_eq!(shape(stage), vec![Ok(1), Err("e".to_string()), Ok(2)]);
    }

    #[test]
    fn test_skip_forwards_errors_in_prefix() {
        let stage = Skip::new(
            producer(vec![Ok(1), Err(PipelineError::element("e")), Ok(2), Ok(3)]),
            2,
        );
        assert_eq!(shape(stage), vec![Err("e".to_string()), Ok(3)]);
    }

    #[test]
    fn test_take_while_stops_at_first_failure() {
        let stage = TakeWhile::new(oks(vec![1, 2, 5, 1]), |x: &i32| *x < 3);
        assert_eq!(shape(stage), vec![Ok(1), Ok(2)]);
    }

    #[test]
    fn test_skip_while_evaluates_prefix_only() {
        let calls = Cell::new(0);
        let stage = SkipWhile::new(oks(vec![1, 2, 3, 1, 2]), |x: &i32| {
            calls.set(calls.get() + 1);
            *x < 3
        });
        assert_eq!(shape(stage), vec![Ok(3), Ok(1), Ok(2)]);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_take_while_passes_errors_untested() {
        let calls = Cell::new(0);
        let stage = TakeWhile::new(
            producer(vec![Ok(1), Err(PipelineError::element("e")), Ok(2), Ok(5), Ok(1)]),
            |x: &i32| {
                calls.set(calls.get() + 1);
                *x < 3
            },
        );
        assert_eq!(shape(stage), vec![Ok(1), Err("e".to_string()), Ok(2)]);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_skip_while_passes_errors_untested() {
        let calls = Cell::new(0);
        let stage = SkipWhile::new(
            producer(vec![Ok(1), Err(PipelineError::element("e")), Ok(2), Ok(3), Ok(1)]),
            |x: &i32| {
                calls.set(calls.get() + 1);
                *x < 3
            },
        );
        assert_eq!(
            shape(stage),
            vec![Err("e".to_string()), Ok(3), Ok(1)]
        );
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_catch_substitutes_skips_and_forwards() {
        let stage = Catch::new(
            producer(vec![
                Ok(1),
                Err(PipelineError::element("sub")),
                Err(PipelineError::element("skip")),
                Err(PipelineError::element("keep")),
                Ok(2),
            ]),
            |err: PipelineError| match err.to_string().as_str() {
                "sub" => Ok(Some(10)),
                "skip" => Ok(None),
                _ => Err(err),
            },
        );
        assert_eq!(
            shape(stage),
            vec![Ok(1), Ok(10), Err("keep".to_string()), Ok(2)]
        );
    }
}

//! Lazy, single-pass pipeline over a pull-based producer.
//!
//! Intermediate operations return a new `Pipeline` and never pull from the
//! source; terminal operations drive the composed chain exactly once.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::hash::Hash;

use tracing::trace;

use crate::error::{BoxError, PipelineError, Result};
use crate::executor::{ParallelExecutor, WorkerPool};
use crate::grouper::{Combined, Grouper};
use crate::stage::{Catch, Deferred, Distinct, Flatten, Limit, Skip, SkipWhile, TakeWhile, Window};

/// A forward-only source: `Some(Ok(v))` is a value, `Some(Err(e))` an
/// element-scoped error, `None` the end of the sequence.
pub type Producer<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// A lazy, composable, single-pass wrapper over a producer.
///
/// `Pipeline` is itself an iterator of `Result<T>`, so a caller can pull
/// from it by hand instead of using a terminal operation. Once exhausted
/// it stays exhausted.
pub struct Pipeline<'a, T> {
    producer: Producer<'a, T>,
}

impl<'a, T: 'a> Pipeline<'a, T> {
    /// Wrap an infallible source.
    pub fn new<I>(source: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        Self {
            producer: Box::new(source.into_iter().map(Ok).fuse()),
        }
    }

    /// Wrap a source whose elements may fail to be produced.
    pub fn from_results<I, X>(source: I) -> Self
    where
        I: IntoIterator<Item = std::result::Result<T, X>>,
        I::IntoIter: 'a,
        X: Into<BoxError>,
    {
        Self {
            producer: Box::new(
                source
                    .into_iter()
                    .map(|item| item.map_err(PipelineError::element))
                    .fuse(),
            ),
        }
    }

    /// A pipeline that yields nothing.
    pub fn empty() -> Self {
        Self {
            producer: Box::new(std::iter::empty()),
        }
    }

    /// Compose a producer transformation onto this pipeline.
    ///
    /// `f` receives this stage's producer and returns the next stage's.
    /// It is not called until the returned pipeline is first pulled, so an
    /// eager `f` (a full sort, a parallel map) stays deferred too.
    pub fn apply<U, I, F>(self, f: F) -> Pipeline<'a, U>
    where
        U: 'a,
        I: Iterator<Item = Result<U>> + 'a,
        F: FnOnce(Producer<'a, T>) -> I + 'a,
    {
        let upstream = self.producer;
        Pipeline {
            producer: Box::new(Deferred::new(move || {
                Box::new(f(upstream)) as Producer<'a, U>
            })),
        }
    }

    // ------------------------------------------------------------------
    // Stateless intermediate operations
    // ------------------------------------------------------------------

    pub fn map<U, F>(self, mut f: F) -> Pipeline<'a, U>
    where
        U: 'a,
        F: FnMut(T) -> U + 'a,
    {
        self.apply(move |upstream| upstream.map(move |item| item.map(&mut f)))
    }

    /// Map through a fallible function; an `Err` becomes an element error
    /// that a later `catch` can resolve.
    pub fn try_map<U, X, F>(self, mut f: F) -> Pipeline<'a, U>
    where
        U: 'a,
        X: Into<BoxError>,
        F: FnMut(T) -> std::result::Result<U, X> + 'a,
    {
        self.apply(move |upstream| {
            upstream.map(move |item| item.and_then(|value| f(value).map_err(PipelineError::element)))
        })
    }

    pub fn filter<P>(self, mut pred: P) -> Self
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.apply(move |upstream| {
            upstream.filter(move |item| match item {
                Ok(value) => pred(value),
                Err(_) => true,
            })
        })
    }

    /// Yield every element of every sub-sequence, sub-sequence by sub-sequence.
    pub fn flatten(self) -> Pipeline<'a, T::Item>
    where
        T: IntoIterator,
        T::Item: 'a,
        T::IntoIter: 'a,
    {
        self.apply(Flatten::new)
    }

    pub fn flat_map<U, F>(self, f: F) -> Pipeline<'a, U::Item>
    where
        U: IntoIterator + 'a,
        U::Item: 'a,
        U::IntoIter: 'a,
        F: FnMut(T) -> U + 'a,
    {
        self.map(f).flatten()
    }

    /// Run `f` on each element as it passes, interleaved with downstream work.
    pub fn inspect<F>(self, mut f: F) -> Self
    where
        F: FnMut(&T) + 'a,
    {
        self.apply(move |upstream| {
            upstream.inspect(move |item| {
                if let Ok(value) = item {
                    f(value);
                }
            })
        })
    }

    // ------------------------------------------------------------------
    // Stateful intermediate operations
    // ------------------------------------------------------------------

    /// First occurrence of each element, in encounter order.
    ///
    /// Holds every distinct element seen for the life of the pipeline.
    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        self.apply(Distinct::new)
    }

    /// Sliding windows of `size` consecutive elements, oldest first.
    ///
    /// A window is emitted for every element once `size` have been seen;
    /// `size == 0` or a shorter source yields nothing.
    pub fn window(self, size: usize) -> Pipeline<'a, Vec<T>>
    where
        T: Clone,
    {
        self.apply(move |upstream| Window::new(upstream, size))
    }

    /// At most `n` elements; upstream is not pulled again after the `n`th.
    pub fn limit(self, n: usize) -> Self {
        self.apply(move |upstream| Limit::new(upstream, n))
    }

    pub fn skip(self, n: usize) -> Self {
        self.apply(move |upstream| Skip::new(upstream, n))
    }

    /// Elements while `pred` holds. The first failing element is dropped
    /// and nothing after it is pulled.
    pub fn take_while<P>(self, pred: P) -> Self
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.apply(move |upstream| TakeWhile::new(upstream, pred))
    }

    /// Drop the prefix for which `pred` holds, then yield everything.
    pub fn skip_while<P>(self, pred: P) -> Self
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.apply(move |upstream| SkipWhile::new(upstream, pred))
    }

    /// Ascending order. Drains upstream on the first pull.
    pub fn sorted(self) -> Self
    where
        T: Ord,
    {
        self.sorted_by(Ord::cmp)
    }

    pub fn sorted_by_key<K, F>(self, mut key: F) -> Self
    where
        K: Ord,
        F: FnMut(&T) -> K + 'a,
    {
        self.sorted_by(move |a, b| key(a).cmp(&key(b)))
    }

    /// Stable sort by `cmp`. If upstream yields an error while being
    /// drained, that error is yielded and the stage ends.
    pub fn sorted_by<F>(self, mut cmp: F) -> Self
    where
        F: FnMut(&T, &T) -> Ordering + 'a,
    {
        self.apply(move |upstream| -> Producer<'a, T> {
            match upstream.collect::<Result<Vec<T>>>() {
                Ok(mut values) => {
                    values.sort_by(&mut cmp);
                    Box::new(values.into_iter().map(Ok))
                }
                Err(err) => Box::new(std::iter::once(Err(err))),
            }
        })
    }

    /// Resolve element errors whose source is a `K`.
    ///
    /// `handler` returns `Some(v)` to yield `v` in place of the failed
    /// element or `None` to skip it. Other errors pass through.
    pub fn catch<K, H>(self, mut handler: H) -> Self
    where
        K: StdError + 'static,
        H: FnMut(K) -> Option<T> + 'a,
    {
        self.apply(move |upstream| {
            Catch::new(upstream, move |err: PipelineError| -> Result<Option<T>> {
                let kind = err.downcast::<K>()?;
                trace!(kind = std::any::type_name::<K>(), "resolving element error");
                Ok(handler(kind))
            })
        })
    }

    /// Resolve every error on the channel, whatever its kind.
    pub fn catch_all<H>(self, mut handler: H) -> Self
    where
        H: FnMut(PipelineError) -> Option<T> + 'a,
    {
        self.apply(move |upstream| {
            Catch::new(upstream, move |err: PipelineError| -> Result<Option<T>> {
                trace!(error = %err, "resolving element error");
                Ok(handler(err))
            })
        })
    }

    /// `map` on a worker pool sized to the machine.
    ///
    /// Results arrive in completion order, not source order. Worth it only
    /// when `f` is CPU-heavy; dispatch costs more than a cheap `f`.
    pub fn par_map<U, F>(self, f: F) -> Pipeline<'a, U>
    where
        T: Send,
        U: Send + 'a,
        F: Fn(T) -> U + Sync + 'a,
    {
        self.par_map_on(WorkerPool::with_default_size(), f)
    }

    /// `par_map` on a caller-supplied executor.
    pub fn par_map_on<E, U, F>(self, executor: E, f: F) -> Pipeline<'a, U>
    where
        E: ParallelExecutor + 'a,
        T: Send,
        U: Send + 'a,
        F: Fn(T) -> U + Sync + 'a,
    {
        self.apply(move |upstream| executor.execute(upstream, &f).into_iter())
    }

    // ------------------------------------------------------------------
    // Terminal operations
    // ------------------------------------------------------------------

    pub fn first(self) -> Result<Option<T>> {
        self.nth(0)
    }

    /// The element at position `n`, pulling no further than it.
    pub fn nth(self, n: usize) -> Result<Option<T>> {
        let mut remaining = n;
        for item in self.producer {
            let value = item?;
            if remaining == 0 {
                return Ok(Some(value));
            }
            remaining -= 1;
        }
        Ok(None)
    }

    pub fn last(self) -> Result<Option<T>> {
        let mut last = None;
        for item in self.producer {
            last = Some(item?);
        }
        Ok(last)
    }

    /// Drive the pipeline into any `FromIterator` container.
    ///
    /// To keep pulling lazily instead, iterate the pipeline itself.
    pub fn collect<C>(self) -> Result<C>
    where
        C: FromIterator<T>,
    {
        self.producer.collect()
    }

    /// Left fold seeded by the first element; `None` on an empty pipeline.
    pub fn reduce<F>(self, mut f: F) -> Result<Option<T>>
    where
        F: FnMut(T, T) -> T,
    {
        let mut producer = self.producer;
        let mut acc = match producer.next() {
            Some(item) => item?,
            None => return Ok(None),
        };
        for item in producer {
            acc = f(acc, item?);
        }
        Ok(Some(acc))
    }

    /// Left fold from `initial`.
    pub fn fold<U, F>(self, initial: U, mut f: F) -> Result<U>
    where
        F: FnMut(U, T) -> U,
    {
        let mut acc = initial;
        for item in self.producer {
            acc = f(acc, item?);
        }
        Ok(acc)
    }

    pub fn max(self) -> Result<Option<T>>
    where
        T: Ord,
    {
        self.extreme_by(Ord::cmp, Ordering::Greater)
    }

    pub fn min(self) -> Result<Option<T>>
    where
        T: Ord,
    {
        self.extreme_by(Ord::cmp, Ordering::Less)
    }

    /// Element with the greatest key; the first one wins a tie.
    pub fn max_by_key<K, F>(self, key: F) -> Result<Option<T>>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.extreme_by_key(key, Ordering::Greater)
    }

    /// Element with the least key; the first one wins a tie.
    pub fn min_by_key<K, F>(self, key: F) -> Result<Option<T>>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.extreme_by_key(key, Ordering::Less)
    }

    fn extreme_by<F>(self, mut cmp: F, wanted: Ordering) -> Result<Option<T>>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut best: Option<T> = None;
        for item in self.producer {
            let value = item?;
            let replace = match &best {
                Some(current) => cmp(&value, current) == wanted,
                None => true,
            };
            if replace {
                best = Some(value);
            }
        }
        Ok(best)
    }

    fn extreme_by_key<K, F>(self, mut key: F, wanted: Ordering) -> Result<Option<T>>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        let mut best: Option<(K, T)> = None;
        for item in self.producer {
            let value = item?;
            let k = key(&value);
            let replace = match &best {
                Some((current, _)) => k.cmp(current) == wanted,
                None => true,
            };
            if replace {
                best = Some((k, value));
            }
        }
        Ok(best.map(|(_, value)| value))
    }

    pub fn find<P>(self, pred: P) -> Result<Option<T>>
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.filter(pred).first()
    }

    pub fn for_each<F>(self, mut f: F) -> Result<()>
    where
        F: FnMut(T),
    {
        for item in self.producer {
            f(item?);
        }
        Ok(())
    }

    /// Group values by key, folding each group through `grouper`.
    ///
    /// The iteration order of the returned map is unspecified.
    pub fn group<K, V, C, KF, VF, F, G>(
        self,
        mut key_fn: KF,
        mut val_fn: VF,
        mut grouper: Grouper<F, G>,
    ) -> Result<HashMap<K, C>>
    where
        K: Eq + Hash,
        KF: FnMut(&T) -> K,
        VF: FnMut(T) -> V,
        F: Fn() -> C,
        G: FnMut(&mut C, V) -> Combined<C>,
    {
        let mut groups = HashMap::new();
        for item in self.producer {
            let value = item?;
            let key = key_fn(&value);
            let value = val_fn(value);
            let container = groups.entry(key).or_insert_with(|| grouper.fresh());
            grouper.accumulate(container, value);
        }
        Ok(groups)
    }

    /// True unless some element fails `pred`; true when empty.
    pub fn all_match<P>(self, mut pred: P) -> Result<bool>
    where
        P: FnMut(&T) -> bool,
    {
        for item in self.producer {
            if !pred(&item?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True once some element satisfies `pred`; false when empty.
    pub fn any_match<P>(self, mut pred: P) -> Result<bool>
    where
        P: FnMut(&T) -> bool,
    {
        for item in self.producer {
            if pred(&item?) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True unless some element satisfies `pred`; true when empty.
    pub fn no_match<P>(self, pred: P) -> Result<bool>
    where
        P: FnMut(&T) -> bool,
    {
        self.any_match(pred).map(|any| !any)
    }

    pub fn count(self) -> Result<usize> {
        let mut count = 0;
        for item in self.producer {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl<T> Iterator for Pipeline<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.producer.next()
    }
}

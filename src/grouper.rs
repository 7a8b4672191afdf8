//! Per-key accumulation for the `group` terminal operation.

/// What a combine function did with the container it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Combined<C> {
    /// The container was updated in place (e.g. a push) and is kept as-is.
    Mutated,
    /// The container is replaced by this value (e.g. string concatenation).
    Replaced(C),
}

/// Pairs an empty-container factory with a combine function.
///
/// `group` calls the factory once for every newly seen key, then feeds
/// each value for that key through the combine function.
pub struct Grouper<F, G> {
    factory: F,
    combine: G,
}

impl<F, G> Grouper<F, G> {
    pub fn new<C, V>(factory: F, combine: G) -> Self
    where
        F: Fn() -> C,
        G: FnMut(&mut C, V) -> Combined<C>,
    {
        Self { factory, combine }
    }

    /// Fold `value` into `container` according to the combine result.
    pub(crate) fn accumulate<C, V>(&mut self, container: &mut C, value: V)
    where
        G: FnMut(&mut C, V) -> Combined<C>,
    {
        if let Combined::Replaced(next) = (self.combine)(container, value) {
            *container = next;
        }
    }

    pub(crate) fn fresh<C>(&self) -> C
    where
        F: Fn() -> C,
    {
        (self.factory)()
    }
}

impl<V> Grouper<fn() -> Vec<V>, fn(&mut Vec<V>, V) -> Combined<Vec<V>>> {
    /// Collect every value of a key into a `Vec`, in encounter order.
    pub fn appending() -> Self {
        fn push<V>(list: &mut Vec<V>, value: V) -> Combined<Vec<V>> {
            list.push(value);
            Combined::Mutated
        }
        Grouper {
            factory: Vec::new,
            combine: push,
        }
    }
}

impl Grouper<(), ()> {
    /// Start every key at `C::default()` and replace it with `step(acc, v)`.
    pub fn replacing<C, V, S>(
        mut step: S,
    ) -> Grouper<fn() -> C, impl FnMut(&mut C, V) -> Combined<C>>
    where
        C: Default,
        S: FnMut(&C, V) -> C,
    {
        Grouper {
            factory: C::default as fn() -> C,
            combine: move |acc: &mut C, value: V| Combined::Replaced(step(&*acc, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutated_keeps_container() {
        let mut grouper = Grouper::new(Vec::new, |list: &mut Vec<i32>, v: i32| {
            list.push(v);
            Combined::Mutated
        });
        let mut list = grouper.fresh();
        grouper.accumulate(&mut list, 1);
        grouper.accumulate(&mut list, 2);
        assert_eq!(list, vec![1, 2]);
    }

    #[test]
    fn test_replaced_swaps_container() {
        let mut grouper = Grouper::new(String::new, |s: &mut String, v: i32| {
            if s.is_empty() {
                Combined::Replaced(v.to_string())
            } else {
                Combined::Replaced(format!("{s}, {v}"))
            }
        });
        let mut acc = grouper.fresh();
        for v in [20, 30, 40] {
            grouper.accumulate(&mut acc, v);
        }
        assert_eq!(acc, "20, 30, 40");
    }

    // An Option container can legitimately hold None; the tag keeps that
    // distinct from "mutated in place".
    #[test]
    fn test_replaced_with_absent_value() {
        let mut grouper = Grouper::new(|| Some(0), |_: &mut Option<i32>, _: i32| {
            Combined::Replaced(None)
        });
        let mut acc = grouper.fresh();
        grouper.accumulate(&mut acc, 5);
        assert_eq!(acc, None);
    }

    #[test]
    fn test_appending() {
        let mut grouper = Grouper::appending();
        let mut list = grouper.fresh();
        grouper.accumulate(&mut list, "a");
        grouper.accumulate(&mut list, "b");
        assert_eq!(list, vec!["a", "b"]);
    }

    #[test]
    fn test_replacing_sum() {
        let mut grouper = Grouper::replacing(|acc: &i64, v: i64| acc + v);
        let mut total = grouper.fresh();
        grouper.accumulate(&mut total, 4);
        grouper.accumulate(&mut total, 6);
        assert_eq!(total, 10);
    }
}

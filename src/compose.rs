//! Left-to-right composition of unary functions.

/// `compose(f, g)(x) == g(f(x))`.
pub fn compose<A, B, C>(f: impl Fn(A) -> B, g: impl Fn(B) -> C) -> impl Fn(A) -> C {
    move |x| g(f(x))
}

/// Compose functions left to right: `pipe!(f, g, h)(x) == h(g(f(x)))`.
///
/// ```
/// use pipestream::pipe;
///
/// let double = |x: i32| x * 2;
/// let add5 = |x: i32| x + 5;
/// assert_eq!(pipe!(double, add5)(2), 9);
/// ```
#[macro_export]
macro_rules! pipe {
    ($f:expr $(,)?) => {
        $f
    };
    ($f:expr, $($rest:expr),+ $(,)?) => {
        $crate::compose::compose($f, $crate::pipe!($($rest),+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(x: i32) -> i32 {
        x * 2
    }

    fn add5(x: i32) -> i32 {
        x + 5
    }

    #[test]
    fn test_pipe_single() {
        let piped = pipe!(double);
        assert_eq!(piped(2), 4);
    }

    #[test]
    fn test_pipe_two() {
        let piped = pipe!(double, add5);
        assert_eq!(piped(2), 9);
    }

    #[test]
    fn test_pipe_changes_type() {
        let piped = pipe!(double, add5, |x: i32| x.to_string(), |s: String| s.len());
        assert_eq!(piped(50), 3);
    }

    #[test]
    fn test_compose_order() {
        assert_eq!(compose(add5, double)(1), 12);
    }

    #[test]
    fn test_pipe_with_pipeline() {
        let scaled: Vec<i32> = crate::Pipeline::new(vec![1, 2, 3])
            .map(pipe!(double, add5))
            .collect()
            .unwrap();
        assert_eq!(scaled, vec![7, 9, 11]);
    }
}

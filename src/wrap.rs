//! Decorator combinator for callables
//!
//! `after(original, hook)` returns a callable that runs `original`, hands
//! its output to `hook` by reference, then returns the output unchanged.
//! Multi-argument operations pass their arguments as a tuple.
//!
//! # Example
//! ```
//! use reqtime::wrap::after;
//!
//! let mut seen = Vec::new();
//! let mut double = after(|x: i32| x * 2, |out: &i32| seen.push(*out));
//! assert_eq!(double(4), 8);
//! assert_eq!(double(5), 10);
//! drop(double);
//! assert_eq!(seen, vec![8, 10]);
//! ```

/// Run `original`, then `hook` with a reference to its output
pub fn after<A, R, F, H>(mut original: F, mut hook: H) -> impl FnMut(A) -> R
where
    F: FnMut(A) -> R,
    H: FnMut(&R),
{
    move |args| {
        let out = original(args);
        hook(&out);
        out
    }
}

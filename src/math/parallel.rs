//! Group fan-out.
//!
//! Regression groups (gate sets, pooled (day, filter) fits, per-day
//! transformation fits) are independent once aggregation is complete, so they
//! can be evaluated on the rayon pool. Results come back in input order, which
//! keeps records and diagnostics deterministic.

use rayon::prelude::*;

/// Apply `f` to every group, in parallel when `parallel` is set.
pub fn map_groups<T, R, F>(groups: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        groups.par_iter().map(f).collect()
    } else {
        groups.iter().map(f).collect()
    }
}

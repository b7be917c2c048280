//! Bounded parallel iteration.
//!
//! Batches of images are encoded in parallel, but every image allocates
//! several full-size buffers, so the number of items in flight is capped.

use rayon::prelude::*;


/// Maps `f` over `items` in parallel with at most `max_in_flight` items being
/// processed at once, preserving input order.
///
/// Stops after the first chunk that produced an error and returns it.
///
/// # Panics
///
/// Panics if `max_in_flight` is 0.
pub fn try_par_map_limited<T, R, E, F>(items: &[T], max_in_flight: usize, f: F) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    assert!(max_in_flight > 0, "max_in_flight must be > 0");

    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(max_in_flight) {
        let chunk_results: Result<Vec<R>, E> = chunk.par_iter().map(&f).collect();
        results.extend(chunk_results?);
    }
    Ok(results)
}

/// Default cap on items in flight: one per worker thread.
pub fn default_max_in_flight() -> usize {
    rayon::current_num_threads().max(1)
}

//! Fork/join primitives for data-parallel loops over index spaces.
//!
//! Everything in this crate is built on [`std::thread::scope`], so the
//! closures borrow freely from the caller's stack and all workers are joined
//! before the function returns. The worker count is fixed at the number of
//! hardware cores.
//!
//! # Primitives
//!
//! - [`fork_loop`]: strided partition of `0..n`, one index at a time
//! - [`batched_fork_loop`]: contiguous `(lo, hi)` ranges
//! - [`shuffled_fork_loop`]: like `fork_loop` after a random permutation of
//!   the index space (spreads lock contention when neighbouring indices
//!   share state)
//! - [`fork_while`]: workers spin on a predicate until their own invocation
//!   returns false
//! - [`fork_map`]: contiguous ranges, results concatenated in index order
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let sum = AtomicUsize::new(0);
//! tonari_exec::fork_loop(100, |i| {
//!     sum.fetch_add(i, Ordering::Relaxed);
//! });
//! assert_eq!(sum.into_inner(), 4950);
//! ```

use rand::seq::SliceRandom;
use std::panic;
use std::thread;

/// Number of workers used by every fork primitive: the available hardware
/// parallelism, or 1 if it cannot be determined.
pub fn worker_count() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Runs `f(i)` for every `i` in `0..n` across the worker pool.
///
/// Indices are partitioned by stride: worker `w` handles `w, w + W, w + 2W,
/// ...` serially. Calls may run in any order and concurrently, but all have
/// completed when this returns. A panic in `f` propagates to the caller.
pub fn fork_loop<F>(n: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    let threads = worker_count();
    thread::scope(|s| {
        for offset in 0..threads.min(n.max(1)) {
            let f = &f;
            s.spawn(move || {
                let mut i = offset;
                while i < n {
                    f(i);
                    i += threads;
                }
            });
        }
    });
}

/// Runs `f(lo, hi)` over contiguous batches of at most `batch` indices.
///
/// The final batch covers the remainder when `batch` does not divide `n`.
pub fn batched_fork_loop<F>(n: usize, batch: usize, f: F)
where
    F: Fn(usize, usize) + Sync,
{
    assert!(batch > 0, "batch size must be positive");
    let batches = n.div_ceil(batch);
    fork_loop(batches, |b| {
        let lo = b * batch;
        let hi = (lo + batch).min(n);
        f(lo, hi);
    });
}

/// Like [`fork_loop`], but visits `0..n` in a uniformly random order.
pub fn shuffled_fork_loop<F>(n: usize, f: F)
where
    F: Fn(usize) + Sync,
{
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rand::thread_rng());
    fork_loop(n, |i| f(order[i]));
}

/// Spins every worker on `pred` until its own invocation returns false.
///
/// A worker that observes `false` exits; workers currently inside `pred`
/// finish their call before exiting. There is no shared stop flag: each
/// worker decides for itself, which lets a lone worker keep draining a
/// queue after its siblings ran dry.
pub fn fork_while<F>(pred: F)
where
    F: Fn() -> bool + Sync,
{
    let threads = worker_count();
    thread::scope(|s| {
        for _ in 0..threads {
            let pred = &pred;
            s.spawn(move || while pred() {});
        }
    });
}

/// Maps `f` over `0..n` in parallel and returns the results in index order.
///
/// Workers take contiguous ranges so the output can be concatenated without
/// reordering.
pub fn fork_map<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if n == 0 {
        return Vec::new();
    }

    let threads = worker_count().min(n);
    let chunk = n.div_ceil(threads);
    let mut out = Vec::with_capacity(n);

    thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|w| {
                let f = &f;
                let lo = w * chunk;
                let hi = (lo + chunk).min(n);
                s.spawn(move || (lo..hi).map(f).collect::<Vec<T>>())
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(part) => out.extend(part),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
    });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_fork_loop_visits_every_index_once() {
        let n = 1000;
        let counts: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();

        fork_loop(n, |i| {
            counts[i].fetch_add(1, Ordering::Relaxed);
        });

        for (i, c) in counts.iter().enumerate() {
            assert_eq!(c.load(Ordering::Relaxed), 1, "index {} visited", i);
        }
    }

    #[test]
    fn test_fork_loop_empty() {
        fork_loop(0, |_| panic!("must not be called"));
    }

    #[test]
    fn test_batched_fork_loop_covers_tail() {
        let seen = Mutex::new(vec![false; 103]);

        batched_fork_loop(103, 10, |lo, hi| {
            assert!(hi - lo <= 10);
            let mut seen = seen.lock().unwrap();
            for i in lo..hi {
                assert!(!seen[i], "index {} covered twice", i);
                seen[i] = true;
            }
        });

        assert!(seen.into_inner().unwrap().iter().all(|&v| v));
    }

    #[test]
    fn test_shuffled_fork_loop_visits_every_index_once() {
        let n = 512;
        let counts: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();

        shuffled_fork_loop(n, |i| {
            counts[i].fetch_add(1, Ordering::Relaxed);
        });

        assert!(counts.iter().all(|c| c.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_fork_while_drains_work() {
        let remaining = AtomicUsize::new(10_000);

        fork_while(|| {
            let prev = remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                v.checked_sub(1)
            });
            prev.is_ok()
        });

        assert_eq!(remaining.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fork_map_preserves_order() {
        let out = fork_map(1000, |i| i * 2);
        assert_eq!(out.len(), 1000);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, i * 2);
        }
    }

    #[test]
    fn test_fork_map_empty() {
        let out: Vec<usize> = fork_map(0, |i| i);
        assert!(out.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_fork_loop_propagates_panics() {
        fork_loop(8, |i| {
            if i == 3 {
                panic!("boom");
            }
        });
    }
}

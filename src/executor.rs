//! Bounded-worker parallel loop for CPU-bound per-shard evaluation.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Run `job(0..n)` across at most `workers` OS threads. Indices are handed
/// out through a shared counter so uneven jobs balance; the call returns
/// after every index has been processed.
pub fn run_parallel<F>(n: usize, workers: usize, job: F)
where
    F: Fn(usize) + Sync,
{
    if n == 0 {
        return;
    }
    let workers = workers.clamp(1, n);
    if workers == 1 {
        for i in 0..n {
            job(i);
        }
        return;
    }
    let next = AtomicUsize::new(0);
    let next = &next;
    let job = &job;
    std::thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(move || loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= n {
                    break;
                }
                job(i);
            });
        }
    });
}

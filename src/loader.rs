//! Bounded-concurrency fan-out over a batch of records.
//!
//! One pool invocation runs a worker function once per input item with at
//! most `cap` invocations in flight, and reassembles results by originating
//! index regardless of completion order. Callers that do not care about
//! order simply ignore the positions; the index is always carried so no
//! call site can lose track of which result belongs to which record.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::channel;

use tracing::warn;

/// Default cap on concurrently running workers.
pub const DEFAULT_WORKER_CAP: usize = 100;

/// Run `worker` once per item with at most `cap` concurrent invocations.
///
/// The returned vector is addressed by input index: slot `i` holds the
/// result of `worker(i, &items[i])`. A slot is `None` only if that worker
/// panicked; a panic is contained to its own item and logged, it never
/// cancels sibling workers or the batch. Every submitted item is always
/// drained to completion; there is no retry and no mid-run cancellation.
pub fn load_indexed<T, R, F>(items: &[T], cap: usize, worker: F) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    load_indexed_with_progress(items, cap, worker, None)
}

/// [`load_indexed`] with a completion callback, invoked on the submitting
/// thread with `(completed, total)` after each result lands.
pub fn load_indexed_with_progress<T, R, F>(
    items: &[T],
    cap: usize,
    worker: F,
    mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let worker_count = cap.max(1).min(items.len());
    let worker = &worker;
    let cursor = AtomicUsize::new(0);
    let (tx, rx) = channel();

    let mut results: Vec<Option<R>> = Vec::with_capacity(items.len());
    results.resize_with(items.len(), || None);

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let cursor = &cursor;
            scope.spawn(move || {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    if index >= items.len() {
                        break;
                    }
                    let outcome = catch_unwind(AssertUnwindSafe(|| worker(index, &items[index])));
                    if tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut completed = 0usize;
        while let Ok((index, outcome)) = rx.recv() {
            completed += 1;
            match outcome {
                Ok(result) => results[index] = Some(result),
                Err(payload) => {
                    warn!(
                        index,
                        "Worker panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
            if let Some(on_progress) = on_progress.as_mut() {
                on_progress(completed, items.len());
            }
        }
    });

    results
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn results_land_in_their_input_slot() {
        let items: Vec<usize> = (0..64).collect();
        let results = load_indexed(&items, 8, |index, item| {
            // Stagger completions so later items often finish first.
            thread::sleep(Duration::from_millis((index % 7) as u64));
            item * 3
        });
        for (index, result) in results.iter().enumerate() {
            assert_eq!(*result, Some(index * 3));
        }
    }

    #[test]
    fn concurrency_never_exceeds_the_cap() {
        let cap = 4;
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..32).collect();

        load_indexed(&items, cap, |_, _| {
            let running = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(running, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        assert!(peak.load(Ordering::SeqCst) <= cap);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn a_panicking_worker_only_loses_its_own_slot() {
        let items: Vec<usize> = (0..10).collect();
        let results = load_indexed(&items, 3, |index, item| {
            if index == 4 {
                panic!("poisoned record");
            }
            *item
        });
        for (index, result) in results.iter().enumerate() {
            if index == 4 {
                assert_eq!(*result, None);
            } else {
                assert_eq!(*result, Some(index));
            }
        }
    }

    #[test]
    fn cap_larger_than_batch_is_harmless() {
        let items = vec![1, 2, 3];
        let results = load_indexed(&items, DEFAULT_WORKER_CAP, |_, item| item * 10);
        assert_eq!(results, vec![Some(10), Some(20), Some(30)]);
    }

    #[test]
    fn empty_batch_returns_immediately() {
        let items: Vec<u8> = Vec::new();
        let results = load_indexed(&items, 4, |_, item| *item);
        assert!(results.is_empty());
    }

    #[test]
    fn progress_reports_every_completion() {
        let items: Vec<usize> = (0..12).collect();
        let mut seen = Vec::new();
        load_indexed_with_progress(
            &items,
            4,
            |_, item| *item,
            Some(&mut |completed, total| seen.push((completed, total))),
        );
        assert_eq!(seen.len(), 12);
        assert_eq!(seen.last(), Some(&(12, 12)));
    }
}

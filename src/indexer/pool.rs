//! Fixed-size worker pool fed through a bounded queue.

use std::thread;

/// Run `work` on every item using `worker_count` threads.
///
/// The producer blocks while the queue (capacity `worker_count`) is full and
/// returns only after every worker has drained the queue and exited. Returns
/// the number of workers that panicked.
pub fn run_bounded<I, F>(items: I, worker_count: usize, work: F) -> usize
where
    I: IntoIterator,
    I::Item: Send,
    F: Fn(I::Item) + Sync,
{
    let worker_count = worker_count.max(1);
    let (tx, rx) = crossbeam_channel::bounded::<I::Item>(worker_count);

    thread::scope(|scope| {
        let work = &work;
        let workers: Vec<_> = (0..worker_count)
            .map(|_| {
                let rx = rx.clone();
                scope.spawn(move || {
                    for item in rx {
                        work(item);
                    }
                })
            })
            .collect();
        drop(rx);

        for item in items {
            // Only fails once every worker is gone.
            if tx.send(item).is_err() {
                break;
            }
        }
        drop(tx);

        workers
            .into_iter()
            .map(|worker| worker.join())
            .filter(Result::is_err)
            .count()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_every_item_processed_once() {
        let seen = Mutex::new(Vec::new());
        let panicked = run_bounded(0..100, 4, |i| seen.lock().unwrap().push(i));

        assert_eq!(panicked, 0);
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.into_iter().collect::<HashSet<_>>().len(), 100);
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let count = AtomicUsize::new(0);
        run_bounded(0..10, 0, |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_uses_multiple_threads() {
        let threads = Mutex::new(HashSet::new());
        run_bounded(0..64, 3, |_| {
            threads.lock().unwrap().insert(thread::current().id());
            thread::sleep(std::time::Duration::from_millis(2));
        });
        assert!(threads.into_inner().unwrap().len() > 1);
    }

    #[test]
    fn test_panicking_worker_is_reported() {
        let count = AtomicUsize::new(0);
        let panicked = run_bounded(0..10, 2, |i| {
            if i == 3 {
                panic!("boom");
            }
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(panicked, 1);
        assert_eq!(count.load(Ordering::SeqCst), 9);
    }
}

//! Bounded fan-out over scoped worker threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// Run `work` over `items` on at most `limit` threads, handing each result to
/// `collect` on the calling thread.
///
/// Workers pull the next index from a shared counter and send results through
/// one channel, so `collect` is the only writer of whatever it closes over.
/// Results arrive in completion order, not input order.
pub fn for_each_bounded<T, R, W, C>(items: &[T], limit: usize, work: W, mut collect: C)
where
    T: Sync,
    R: Send,
    W: Fn(&T) -> R + Sync,
    C: FnMut(R),
{
    if items.is_empty() {
        return;
    }
    let workers = limit.clamp(1, items.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let work = &work;
            scope.spawn(move || {
                while let Some(item) = items.get(next.fetch_add(1, Ordering::Relaxed)) {
                    if tx.send(work(item)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        for result in rx {
            collect(result);
        }
    });
}

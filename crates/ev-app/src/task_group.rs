//! Fan-out/fan-in over a rayon pool.
//!
//! Jobs report `(index, outcome)` over a channel; a single collector
//! thread waits for all of them and calls the fan-in callback once with
//! outcomes in submission order.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use rayon::ThreadPool;

/// A job or fan-in callback that panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPanic {
    pub message: String,
}

impl TaskPanic {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self { message }
    }
}

impl std::fmt::Display for TaskPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

/// Handle to a running group; dropping it detaches the collector.
#[derive(Debug)]
pub struct TaskGroup {
    collector: JoinHandle<()>,
    size: usize,
}

impl TaskGroup {
    /// Submit every job to `pool`, then run `fan_in` once all have ended.
    ///
    /// A panicking job becomes an `Err(TaskPanic)` in its slot; the other
    /// jobs are unaffected.
    pub fn spawn<J, T, R, F>(pool: &ThreadPool, jobs: Vec<J>, run: R, fan_in: F) -> std::io::Result<Self>
    where
        J: Send + 'static,
        T: Send + 'static,
        R: Fn(usize, J) -> T + Send + Sync + 'static,
        F: FnOnce(Vec<Result<T, TaskPanic>>) + Send + 'static,
    {
        let size = jobs.len();
        let (tx, rx) = mpsc::channel::<(usize, Result<T, TaskPanic>)>();
        let run = Arc::new(run);

        for (index, job) in jobs.into_iter().enumerate() {
            let tx = tx.clone();
            let run = Arc::clone(&run);
            pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| run(index, job)))
                    .map_err(TaskPanic::from_payload);
                // The collector only goes away after receiving everything.
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let collector = thread::Builder::new()
            .name("ev-fan-in".to_string())
            .spawn(move || {
                let mut slots: Vec<Option<Result<T, TaskPanic>>> = (0..size).map(|_| None).collect();
                for (index, outcome) in rx.iter().take(size) {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(outcome);
                    }
                }
                let outcomes = slots
                    .into_iter()
                    .map(|slot| {
                        slot.unwrap_or_else(|| {
                            Err(TaskPanic {
                                message: "job ended without reporting".to_string(),
                            })
                        })
                    })
                    .collect();
                fan_in(outcomes);
            })?;

        Ok(Self { collector, size })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the fan-in callback has returned.
    pub fn is_finished(&self) -> bool {
        self.collector.is_finished()
    }

    /// Block until the fan-in callback has returned.
    pub fn join(self) -> Result<(), TaskPanic> {
        self.collector.join().map_err(TaskPanic::from_payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(threads: usize) -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap()
    }

    #[test]
    fn fan_in_sees_every_outcome_in_order() {
        let pool = pool(4);
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);

        let group = TaskGroup::spawn(
            &pool,
            (0..20u64).collect(),
            |_, n| {
                thread::sleep(std::time::Duration::from_millis(20 - n));
                n * n
            },
            move |outcomes| {
                sink.lock().extend(outcomes.into_iter().map(|o| o.unwrap()));
            },
        )
        .unwrap();
        group.join().unwrap();

        let expected: Vec<u64> = (0..20).map(|n| n * n).collect();
        assert_eq!(*collected.lock(), expected);
    }

    #[test]
    fn panicking_job_does_not_stop_siblings() {
        let pool = pool(2);
        let fan_ins = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (count, out) = (Arc::clone(&fan_ins), Arc::clone(&seen));

        let group = TaskGroup::spawn(
            &pool,
            vec![1, 2, 3],
            |_, n: i32| {
                if n == 2 {
                    panic!("bad input {n}");
                }
                n
            },
            move |outcomes| {
                count.fetch_add(1, Ordering::SeqCst);
                *out.lock() = outcomes;
            },
        )
        .unwrap();
        group.join().unwrap();

        assert_eq!(fan_ins.load(Ordering::SeqCst), 1);
        let outcomes = seen.lock();
        assert_eq!(outcomes[0], Ok(1));
        assert_eq!(outcomes[1], Err(TaskPanic { message: "bad input 2".to_string() }));
        assert_eq!(outcomes[2], Ok(3));
    }

    #[test]
    fn empty_group_still_fans_in() {
        let pool = pool(1);
        let called = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&called);
        let group = TaskGroup::spawn(&pool, Vec::<()>::new(), |_, ()| (), move |outcomes| {
            assert!(outcomes.is_empty());
            flag.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert!(group.is_empty());
        group.join().unwrap();
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }
}

// 🧵 Worker Pool + Completion Barrier
//
// Each phase submits one task per batch to a bounded pool, then blocks on a
// countdown barrier sized to the number of tasks. Tasks hand their result to
// the barrier as they finish, in any order.
//
// The pool is dropped only after its barrier has released, so teardown never
// discards in-flight work.

use crate::error::{ImportError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// COMPLETION BARRIER
// ============================================================================

/// Countdown barrier that also collects each task's outcome
pub struct CompletionBarrier<T> {
    expected: usize,
    sender: Sender<Result<T>>,
    receiver: Receiver<Result<T>>,
}

/// Handed to exactly one task; consumed when the task signals
pub struct CompletionSignal<T> {
    sender: Sender<Result<T>>,
}

impl<T> CompletionBarrier<T> {
    pub fn new(expected: usize) -> Self {
        let (sender, receiver) = unbounded();
        CompletionBarrier {
            expected,
            sender,
            receiver,
        }
    }

    pub fn signal(&self) -> CompletionSignal<T> {
        CompletionSignal {
            sender: self.sender.clone(),
        }
    }

    /// Block until every task has signalled.
    ///
    /// Returns the successful outputs in completion order, or the first error
    /// received. A signal dropped without completing (a panicked task) breaks
    /// the barrier instead of blocking forever.
    pub fn wait(self) -> Result<Vec<T>> {
        let CompletionBarrier {
            expected,
            sender,
            receiver,
        } = self;
        drop(sender);

        let mut outputs = Vec::with_capacity(expected);
        let mut first_error = None;
        let mut signalled = 0;

        while signalled < expected {
            match receiver.recv() {
                Ok(Ok(output)) => outputs.push(output),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        warn!(error = %e, "additional task failure");
                    }
                }
                Err(_) => {
                    return Err(first_error.unwrap_or(ImportError::BarrierBroken {
                        expected,
                        signalled,
                    }));
                }
            }
            signalled += 1;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }
}

impl<T> CompletionSignal<T> {
    pub fn complete(self, outcome: Result<T>) {
        // The barrier only goes away after every signal has arrived
        let _ = self.sender.send(outcome);
    }
}

// ============================================================================
// WORKER POOL
// ============================================================================

/// Bounded pool of worker threads owned by one or more phases
pub struct WorkerPool {
    name: &'static str,
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(name: &'static str, threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(move |idx| format!("{name}-{idx}"))
            .panic_handler(move |_| error!(pool = name, "worker task panicked"))
            .build()?;

        debug!(pool = name, threads = pool.current_num_threads(), "worker pool started");
        Ok(WorkerPool { name, pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `task` once per input on the pool and wait for all of them.
    ///
    /// Fails with the first task error, after every task has finished.
    pub fn run_all<I, T, F>(&self, inputs: Vec<I>, task: F) -> Result<Vec<T>>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Result<T> + Send + Sync + 'static,
    {
        let task = Arc::new(task);
        let barrier = CompletionBarrier::new(inputs.len());

        for input in inputs {
            let signal = barrier.signal();
            let task = Arc::clone(&task);
            self.pool.spawn(move || signal.complete(task(input)));
        }

        barrier.wait()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        debug!(pool = self.name, "worker pool torn down");
    }
}

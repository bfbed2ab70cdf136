//! Worker pool for fan-out to the analyzer and the store.
//!
//! A fixed set of worker threads pulls boxed jobs from one unbounded
//! queue behind a mutex and condvar. Submitters are rate-limited
//! upstream (sampling intervals, the bounded frame ring), so the queue
//! stays shallow in practice. Shutdown lets the workers drain whatever
//! is queued, then joins them.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue:    VecDeque<Job>,
    shutdown: bool,
}

struct PoolInner {
    state:     Mutex<PoolState>,
    available: Condvar,
}

impl PoolInner {
    fn submit(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        if state.shutdown {
            return;
        }

        state.queue.push_back(job);
        drop(state);
        self.available.notify_one();
    }
}

pub struct WorkerPool {
    inner:   Arc<PoolInner>,
    workers: Vec<thread::JoinHandle<()>>,
}

/// Cloneable submission handle, for threads that outlive the scope the
/// pool was created in. Jobs submitted after shutdown are discarded.
#[derive(Clone)]
pub struct PoolHandle {
    inner: Arc<PoolInner>,
}

impl PoolHandle {
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.submit(Box::new(job));
    }
}

impl WorkerPool {
    /// Pool sized to the machine's available parallelism.
    pub fn with_default_threads() -> WorkerPool {
        WorkerPool::new(default_thread_count())
    }

    pub fn new(threads: usize) -> WorkerPool {
        let threads = threads.max(1);
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState { queue: VecDeque::new(), shutdown: false }),
            available: Condvar::new(),
        });

        let workers = (0..threads)
            .map(|_| {
                let inner = Arc::clone(&inner);
                thread::spawn(move || worker_loop(&inner))
            })
            .collect();

        WorkerPool { inner, workers }
    }

    /// Enqueues a job. Jobs submitted after shutdown are discarded.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.submit(Box::new(job));
    }

    /// A handle other threads can submit through.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle { inner: Arc::clone(&self.inner) }
    }

    pub fn queued(&self) -> usize {
        self.inner.state.lock().unwrap().queue.len()
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Signals shutdown, lets the workers drain the queue, and joins
    /// them. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
        }
        self.inner.available.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &PoolInner) {
    loop {
        let job = {
            let mut state = inner.state.lock().unwrap();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    break job;
                }
                if state.shutdown {
                    // Queue drained and no more work is coming.
                    return;
                }
                state = inner.available.wait(state).unwrap();
            }
        };

        job();
    }
}

fn default_thread_count() -> usize {
    thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

use parking_lot::{Condvar, Mutex};
use revkv_common::{
    DeleteOutcome, GetOutcome, ListOutcome, PutOutcome, Revision, RevisionsOutcome, StoreError,
};
use revkv_engine::{Handler, RevisionStore};
use revkv_table::RevisionTable;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crate::request::Request;

/// Queue settings for a `SerializingProxy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Maximum queued requests. Producers block while the queue is full.
    /// `None` means unbounded; `Some(0)` is treated as `Some(1)`.
    pub capacity: Option<usize>,
}

impl ProxyConfig {
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// No new requests; the worker finishes what is queued.
    Draining,
    /// The worker is gone or leaving; queued requests fail.
    Stopped,
}

struct Queue {
    requests: VecDeque<Request>,
    state: State,
}

struct Shared {
    queue: Mutex<Queue>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

/// Runs every operation of a wrapped store on one dedicated worker thread.
///
/// The table only has to be `Send`; the worker is the sole thread touching
/// it. Producers on any thread submit requests with a handler and return
/// immediately (or block while a bounded queue is full). Handlers run on the
/// worker and may submit to the same proxy; those submissions never block.
pub struct SerializingProxy {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl SerializingProxy {
    /// Start a worker for `store` with an unbounded queue.
    pub fn spawn<T>(store: RevisionStore<T>) -> Result<Self, StoreError>
    where
        T: RevisionTable + Send + 'static,
    {
        Self::with_config(store, ProxyConfig::default())
    }

    pub fn with_config<T>(store: RevisionStore<T>, config: ProxyConfig) -> Result<Self, StoreError>
    where
        T: RevisionTable + Send + 'static,
    {
        let capacity = config.capacity.map(|capacity| capacity.max(1));
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                requests: VecDeque::new(),
                state: State::Running,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("revkv-serial".into())
            .spawn(move || run_worker(store, worker_shared))?;
        tracing::debug!(?capacity, "serializing worker started");
        Ok(Self {
            shared,
            worker_id: worker.thread().id(),
            worker: Some(worker),
        })
    }

    pub fn put(
        &self,
        key: impl Into<String>,
        expected: Revision,
        body: impl Into<Vec<u8>>,
        handler: impl Handler<PutOutcome> + Send + 'static,
    ) {
        self.submit(Request::Put {
            key: key.into(),
            expected,
            body: body.into(),
            handler: Box::new(handler),
        });
    }

    pub fn get(&self, key: impl Into<String>, handler: impl Handler<GetOutcome> + Send + 'static) {
        self.submit(Request::Get {
            key: key.into(),
            handler: Box::new(handler),
        });
    }

    pub fn get_revisions(
        &self,
        key: impl Into<String>,
        handler: impl Handler<RevisionsOutcome> + Send + 'static,
    ) {
        self.submit(Request::GetRevisions {
            key: key.into(),
            handler: Box::new(handler),
        });
    }

    pub fn delete(&self, key: impl Into<String>, handler: impl Handler<DeleteOutcome> + Send + 'static) {
        self.submit(Request::Delete {
            key: key.into(),
            handler: Box::new(handler),
        });
    }

    pub fn list(&self, handler: impl Handler<ListOutcome> + Send + 'static) {
        self.submit(Request::List {
            handler: Box::new(handler),
        });
    }

    /// Queued like any other request, so it applies to writes submitted after it.
    pub fn set_auto_purge(&self, enabled: bool) {
        self.submit(Request::SetAutoPurge(enabled));
    }

    /// Requests waiting for the worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().requests.len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.queue.lock().state == State::Running
    }

    /// Stop accepting requests, let the worker finish the queue, and wait for it.
    pub fn shutdown(mut self) {
        self.request_stop(State::Draining);
        self.join_worker();
    }

    /// Stop after the request in flight. Everything still queued resolves
    /// with `StoreError::WorkerStopped`.
    pub fn abort(mut self) {
        self.request_stop(State::Stopped);
        self.join_worker();
    }

    fn submit(&self, request: Request) {
        // Only the worker frees queue slots, so it must never wait for one.
        let on_worker = thread::current().id() == self.worker_id;
        let mut queue = self.shared.queue.lock();
        loop {
            if queue.state != State::Running {
                drop(queue);
                tracing::warn!(operation = request.name(), "rejecting request: worker stopped");
                request.fail(StoreError::WorkerStopped);
                return;
            }
            match self.shared.capacity {
                Some(capacity) if !on_worker && queue.requests.len() >= capacity => {
                    self.shared.not_full.wait(&mut queue);
                }
                _ => break,
            }
        }
        queue.requests.push_back(request);
        drop(queue);
        self.shared.not_empty.notify_one();
    }

    fn request_stop(&self, state: State) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.state == State::Running || state == State::Stopped {
                queue.state = state;
            }
        }
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }

    fn join_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Dropped from inside a handler: the worker exits on its own once
        // the current request returns.
        if thread::current().id() == self.worker_id {
            return;
        }
        if worker.join().is_err() {
            tracing::error!("serializing worker panicked");
        }
    }
}

impl Drop for SerializingProxy {
    fn drop(&mut self) {
        self.request_stop(State::Draining);
        self.join_worker();
    }
}

fn run_worker<T: RevisionTable>(store: RevisionStore<T>, shared: Arc<Shared>) {
    let _exit = WorkerExit { shared: &shared };
    loop {
        let request = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.state == State::Stopped {
                    return;
                }
                if let Some(request) = queue.requests.pop_front() {
                    break request;
                }
                if queue.state == State::Draining {
                    return;
                }
                shared.not_empty.wait(&mut queue);
            }
        };
        shared.not_full.notify_one();
        request.execute(&store);
    }
}

/// Marks the proxy stopped and fails whatever is still queued, however the
/// worker leaves its loop.
struct WorkerExit<'a> {
    shared: &'a Shared,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let pending: Vec<Request> = {
            let mut queue = self.shared.queue.lock();
            queue.state = State::Stopped;
            queue.requests.drain(..).collect()
        };
        self.shared.not_full.notify_all();
        if thread::panicking() {
            tracing::error!("serializing worker is unwinding");
        }
        if !pending.is_empty() {
            tracing::warn!(count = pending.len(), "failing requests left in queue");
        }
        for request in pending {
            request.fail(StoreError::WorkerStopped);
        }
        tracing::debug!("serializing worker stopped");
    }
}

//! The sweep thread of parallel collections.
//!
//! The primary context marks, then hands the sweep to this thread through a channel. The
//! thread answers on a second channel when the shadow gap table is complete, and the primary
//! context publishes it whenever it polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::heap::Heap;
use crate::plan::collector;
use crate::vm::VMBinding;

/// A message from the primary context to the sweep thread.
enum SweepRequest {
    /// Sweep the heap that was just marked.
    Sweep,
}

/// Owns the secondary context of a heap.
///
/// Dropping it closes the request channel and joins the thread, after any sweep that is
/// still running.
pub struct SweepThread<VM: VMBinding> {
    heap: Arc<Heap<VM>>,
    /// The sending end of the request channel. `None` once the thread is told to stop.
    requests: Option<Sender<SweepRequest>>,
    /// Sweep durations, one per finished sweep.
    finished: Receiver<Duration>,
    /// A sweep was requested and its result is not published yet.
    pending: AtomicBool,
    handle: Option<JoinHandle<()>>,
}

impl<VM: VMBinding> SweepThread<VM> {
    pub fn spawn(heap: Arc<Heap<VM>>) -> std::io::Result<Self> {
        let (request_sender, request_receiver) = channel::unbounded::<SweepRequest>();
        let (finished_sender, finished_receiver) = channel::unbounded();
        let worker_heap = heap.clone();
        let handle = std::thread::Builder::new()
            .name("arenagc-sweeper".to_string())
            .spawn(move || {
                debug!("[Sweeper: Waiting for request...]");
                while let Ok(SweepRequest::Sweep) = request_receiver.recv() {
                    let start = Instant::now();
                    collector::run_parallel_sweep(&worker_heap);
                    if finished_sender.send(start.elapsed()).is_err() {
                        break;
                    }
                }
                debug!("[Sweeper: Request channel closed, exiting.]");
            })?;
        Ok(SweepThread {
            heap,
            requests: Some(request_sender),
            finished: finished_receiver,
            pending: AtomicBool::new(false),
            handle: Some(handle),
        })
    }

    pub fn heap(&self) -> &Arc<Heap<VM>> {
        &self.heap
    }

    /// Whether a sweep was requested and not yet published.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Mark on the calling thread and start the sweep on the sweep thread. The caller must
    /// not allocate until the result is published.
    pub fn collect_async(&self) {
        assert!(!self.is_pending(), "A parallel sweep is already running");
        collector::begin_parallel_mark(&self.heap);
        self.pending.store(true, Ordering::SeqCst);
        let sent = self
            .requests
            .as_ref()
            .is_some_and(|requests| requests.send(SweepRequest::Sweep).is_ok());
        assert!(sent, "The sweep thread has stopped");
    }

    /// Publish the sweep result if it is ready. Returns true when no sweep is outstanding
    /// any more.
    pub fn try_finish(&self) -> bool {
        if !self.is_pending() {
            return true;
        }
        match self.finished.try_recv() {
            Ok(elapsed) => {
                self.publish(elapsed);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => panic!("The sweep thread terminated"),
        }
    }

    /// Wait for the outstanding sweep, if any, and publish its result.
    pub fn finish(&self) {
        if !self.is_pending() {
            return;
        }
        match self.finished.recv() {
            Ok(elapsed) => self.publish(elapsed),
            Err(_) => panic!("The sweep thread terminated"),
        }
    }

    fn publish(&self, elapsed: Duration) {
        trace!("Publishing a sweep that took {:?}", elapsed);
        collector::publish_parallel_result(&self.heap);
        self.pending.store(false, Ordering::SeqCst);
    }
}

impl<VM: VMBinding> Drop for SweepThread<VM> {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("The sweep thread panicked");
            }
        }
    }
}

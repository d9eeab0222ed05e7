//! Background packing on a short-lived worker thread.
//!
//! Each bake spawns one worker, sends it a single [`WorkerRequest`], and
//! waits for progress messages followed by exactly one `Complete` or `Error`
//! reply. Chunk buffers move into the request and, on failure, move back in
//! the `Error` reply so the caller can pack them inline instead. Nothing is
//! shared between the threads while a request is outstanding.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{Receiver, SendError, Sender, bounded, unbounded};

use crate::format::WorldHeader;
use crate::pack::{BakeProgress, BakedChunk, pack_world};

/// Name given to the worker thread.
pub const WORKER_THREAD_NAME: &str = "noaworld-pack";

/// Caller → worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Pack `chunks` under `header` into a container.
    Serialize {
        /// Generated chunks, moved into the worker.
        chunks: Vec<BakedChunk>,
        /// Header template (chunk size and bounds).
        header: WorldHeader,
    },
}

/// Worker → caller.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Intermediate progress.
    Progress(BakeProgress),
    /// Packing finished; the buffer moves to the caller.
    Complete {
        /// The packed container.
        buffer: Vec<u8>,
    },
    /// Packing failed; the chunks move back to the caller.
    Error {
        /// Description of the failure.
        message: String,
        /// The chunks from the request, untouched.
        chunks: Vec<BakedChunk>,
    },
}

/// The background packing path could not deliver a buffer.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread could not be started.
    #[error("failed to spawn pack worker: {0}")]
    Spawn(#[source] std::io::Error),
    /// The worker went away without replying.
    #[error("pack worker disconnected before replying")]
    Disconnected,
    /// The worker reported a failure.
    #[error("pack worker failed: {0}")]
    Failed(String),
}

/// A failed worker run, with the chunks if they could be recovered.
#[derive(Debug)]
pub struct WorkerFailure {
    /// What went wrong.
    pub error: WorkerError,
    /// The chunks handed to the worker, when they came back.
    pub chunks: Option<Vec<BakedChunk>>,
}

/// Worker thread body: answers requests until the request channel closes.
///
/// Pack errors and panics are caught and reported as [`WorkerMessage::Error`].
pub fn run_worker(requests: Receiver<WorkerRequest>, replies: Sender<WorkerMessage>) {
    while let Ok(request) = requests.recv() {
        let WorkerRequest::Serialize { chunks, header } = request;
        let progress_tx = replies.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pack_world(&chunks, &header, &mut |p| {
                let _ = progress_tx.send(WorkerMessage::Progress(p));
            })
        }));

        let reply = match outcome {
            Ok(Ok(buffer)) => WorkerMessage::Complete { buffer },
            Ok(Err(e)) => WorkerMessage::Error {
                message: e.to_string(),
                chunks,
            },
            Err(payload) => WorkerMessage::Error {
                message: panic_message(payload.as_ref()),
                chunks,
            },
        };
        if replies.send(reply).is_err() {
            tracing::debug!("pack worker reply dropped, caller is gone");
        }
    }
}

/// Packs `chunks` on a fresh worker thread and waits for the result.
///
/// Progress messages are forwarded to `on_progress` on the calling thread.
/// The worker is joined before returning.
pub fn pack_on_worker(
    chunks: Vec<BakedChunk>,
    header: &WorldHeader,
    on_progress: &mut dyn FnMut(BakeProgress),
) -> Result<Vec<u8>, WorkerFailure> {
    let (request_tx, request_rx) = bounded::<WorkerRequest>(1);
    let (reply_tx, reply_rx) = unbounded::<WorkerMessage>();

    let handle = match thread::Builder::new()
        .name(WORKER_THREAD_NAME.into())
        .spawn(move || run_worker(request_rx, reply_tx))
    {
        Ok(handle) => handle,
        Err(e) => {
            return Err(WorkerFailure {
                error: WorkerError::Spawn(e),
                chunks: Some(chunks),
            });
        }
    };

    let request = WorkerRequest::Serialize {
        chunks,
        header: *header,
    };
    if let Err(SendError(WorkerRequest::Serialize { chunks, .. })) = request_tx.send(request) {
        let _ = handle.join();
        return Err(WorkerFailure {
            error: WorkerError::Disconnected,
            chunks: Some(chunks),
        });
    }
    drop(request_tx);

    let result = loop {
        match reply_rx.recv() {
            Ok(WorkerMessage::Progress(p)) => on_progress(p),
            Ok(WorkerMessage::Complete { buffer }) => break Ok(buffer),
            Ok(WorkerMessage::Error { message, chunks }) => {
                break Err(WorkerFailure {
                    error: WorkerError::Failed(message),
                    chunks: Some(chunks),
                });
            }
            Err(_) => {
                break Err(WorkerFailure {
                    error: WorkerError::Disconnected,
                    chunks: None,
                });
            }
        }
    };

    if handle.join().is_err() {
        tracing::warn!("pack worker panicked outside the packing guard");
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Background pipeline worker for the TUI.
//!
//! The worker thread owns the `Pipeline` (and therefore both stage caches), so
//! there is exactly one writer. The UI sends `Job`s and polls `WorkerMsg`s
//! without blocking. Render jobs carry a generation number. When several render
//! jobs are queued only the newest runs, and the UI drops any result whose
//! generation is not the latest one it asked for.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};

use crate::app::pipeline::{CancelToken, Pipeline, PipelineCacheStats, PreparedEvent};
use crate::domain::DisplayParams;
use crate::error::PipelineError;

pub enum Job {
    ListEvents,
    Render {
        generation: u64,
        event: String,
        params: DisplayParams,
        cancel: CancelToken,
    },
}

pub enum WorkerMsg {
    Events(Result<Vec<String>, PipelineError>),
    Rendered {
        generation: u64,
        result: Result<Rendered, PipelineError>,
    },
}

/// A finished render plus the context the UI shows next to it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub prepared: PreparedEvent,
    pub page_url: Option<String>,
    pub cache: PipelineCacheStats,
}

pub struct WorkerHandle {
    pub jobs: Sender<Job>,
    pub results: Receiver<WorkerMsg>,
    pub thread: JoinHandle<()>,
}

/// Move `pipeline` onto a new thread and return its channels.
///
/// The thread exits when the job sender is dropped.
pub fn spawn_worker(mut pipeline: Pipeline) -> WorkerHandle {
    let (job_tx, job_rx) = channel::<Job>();
    let (msg_tx, msg_rx) = channel::<WorkerMsg>();

    let thread = thread::spawn(move || {
        let mut pending: Option<Job> = None;
        loop {
            let job = match pending.take() {
                Some(job) => job,
                None => match job_rx.recv() {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            let msg = match job {
                Job::ListEvents => WorkerMsg::Events(pipeline.list_events()),
                render @ Job::Render { .. } => {
                    let (latest, deferred) = coalesce(render, &job_rx);
                    pending = deferred;
                    let Job::Render {
                        generation,
                        event,
                        params,
                        cancel,
                    } = latest
                    else {
                        continue;
                    };
                    log::debug!("render #{generation}: {event}");
                    WorkerMsg::Rendered {
                        generation,
                        result: render_event(&mut pipeline, &event, &params, &cancel),
                    }
                }
            };

            if msg_tx.send(msg).is_err() {
                break;
            }
        }
        log::debug!("pipeline worker stopped");
    });

    WorkerHandle {
        jobs: job_tx,
        results: msg_rx,
        thread,
    }
}

/// Drain queued jobs, keeping only the newest render.
///
/// A non-render job found while draining is returned so it runs next.
fn coalesce(first: Job, rx: &Receiver<Job>) -> (Job, Option<Job>) {
    let mut latest = first;
    loop {
        match rx.try_recv() {
            Ok(next @ Job::Render { .. }) => {
                if let Job::Render { generation, .. } = &latest {
                    log::debug!("render #{generation} superseded");
                }
                latest = next;
            }
            Ok(other) => return (latest, Some(other)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return (latest, None),
        }
    }
}

/// One full render on the worker: resolve, prepare, collect display context.
pub fn render_event(
    pipeline: &mut Pipeline,
    name: &str,
    params: &DisplayParams,
    cancel: &CancelToken,
) -> Result<Rendered, PipelineError> {
    let event = pipeline.resolve_event(name)?;
    let prepared = pipeline.prepare(&event, params, cancel)?;
    Ok(Rendered {
        page_url: pipeline.event_page_url(&event.name),
        cache: pipeline.cache_stats(),
        prepared,
    })
}

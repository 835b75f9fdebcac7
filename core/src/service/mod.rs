//! Async driver for a [`NotificationPipeline`].
//!
//! The pipeline itself is synchronous and clock-free. The service owns it on
//! one tokio task, maps tokio's monotonic clock onto epoch millis, and sleeps
//! until the next timer deadline between commands.

mod handler;

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

use crate::context::NotificationPipeline;
use crate::scheduler::QueuedNotification;
use crate::state::OverlayState;
use crate::template::RenderOutput;

pub use handler::ServiceHandle;

const COMMAND_BUFFER: usize = 256;

/// Commands sent to the service task
#[derive(Debug)]
pub enum ServiceCommand {
    /// Raw provider payload
    Ingest(Value),
    Skip,
    Render {
        template: String,
        reply: oneshot::Sender<RenderOutput>,
    },
    Snapshot(oneshot::Sender<PipelineSnapshot>),
    FlushAll,
    Shutdown,
}

/// Published by the service task
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// The display slot changed; `None` when it emptied
    Display(Option<QueuedNotification>),
}

/// Point-in-time copy of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub now_ms: i64,
    pub state: OverlayState,
    pub current: Option<QueuedNotification>,
    pub queued: Vec<QueuedNotification>,
    pub active_buffers: usize,
}

pub struct PipelineService {
    pipeline: NotificationPipeline,
    cmd_rx: mpsc::Receiver<ServiceCommand>,
    started: Instant,
    epoch_ms: i64,
}

impl PipelineService {
    /// Wrap `pipeline`, treating the current tokio instant as `epoch_ms`.
    ///
    /// Returns the service (spawn [`run`](Self::run)), a handle for sending
    /// commands, and the receiver for display events.
    pub fn new(
        mut pipeline: NotificationPipeline,
        epoch_ms: i64,
    ) -> (Self, ServiceHandle, mpsc::UnboundedReceiver<ServiceEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        pipeline.add_display_sink(move |current: Option<&QueuedNotification>| {
            // Receiver gone just means nobody is watching
            let _ = event_tx.send(ServiceEvent::Display(current.cloned()));
        });

        let service = Self {
            pipeline,
            cmd_rx,
            started: Instant::now(),
            epoch_ms,
        };
        (service, ServiceHandle::new(cmd_tx), event_rx)
    }

    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.started.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }

    fn instant_for(&self, deadline_ms: i64) -> Instant {
        let offset = u64::try_from(deadline_ms.saturating_sub(self.epoch_ms)).unwrap_or(0);
        self.started + Duration::from_millis(offset)
    }

    /// Process commands and timers until shutdown or every handle is dropped.
    /// The pipeline is shut down on exit and returned for inspection.
    pub async fn run(mut self) -> NotificationPipeline {
        tracing::info!(epoch_ms = self.epoch_ms, "Pipeline service started");

        loop {
            let deadline = self.pipeline.next_deadline().map(|d| self.instant_for(d));

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                _ = sleep_until_opt(deadline) => {
                    let now = self.now_ms();
                    self.pipeline.advance_to(now);
                }
            }
        }

        let now = self.now_ms();
        self.pipeline.shutdown(now);
        tracing::info!(now_ms = now, "Pipeline service stopped");
        self.pipeline
    }

    /// Returns false when the loop should stop
    fn handle(&mut self, cmd: ServiceCommand) -> bool {
        let now = self.now_ms();
        match cmd {
            ServiceCommand::Ingest(raw) => {
                self.pipeline.ingest(&raw, now);
            }
            ServiceCommand::Skip => {
                self.pipeline.skip_current(now);
            }
            ServiceCommand::Render { template, reply } => {
                self.pipeline.advance_to(now);
                let _ = reply.send(self.pipeline.render_current(&template));
            }
            ServiceCommand::Snapshot(reply) => {
                self.pipeline.advance_to(now);
                let _ = reply.send(self.snapshot(now));
            }
            ServiceCommand::FlushAll => {
                self.pipeline.flush_all(now);
            }
            ServiceCommand::Shutdown => return false,
        }
        true
    }

    fn snapshot(&self, now_ms: i64) -> PipelineSnapshot {
        PipelineSnapshot {
            now_ms,
            state: self.pipeline.state().clone(),
            current: self.pipeline.current().cloned(),
            queued: self.pipeline.queued().to_vec(),
            active_buffers: self.pipeline.aggregator().active_buffers(),
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

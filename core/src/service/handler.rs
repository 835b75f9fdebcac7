use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::{PipelineSnapshot, ServiceCommand};
use crate::error::ServiceError;
use crate::template::RenderOutput;

/// Cloneable handle for talking to a running [`PipelineService`](super::PipelineService)
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    cmd_tx: mpsc::Sender<ServiceCommand>,
}

impl ServiceHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<ServiceCommand>) -> Self {
        Self { cmd_tx }
    }

    async fn send(&self, cmd: ServiceCommand) -> Result<(), ServiceError> {
        self.cmd_tx.send(cmd).await.map_err(|_| ServiceError::Closed)
    }

    /// Queue a raw provider payload
    pub async fn ingest(&self, raw: Value) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Ingest(raw)).await
    }

    /// End the displayed notification early
    pub async fn skip(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Skip).await
    }

    /// Close all gift-bomb buffers now
    pub async fn flush_all(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::FlushAll).await
    }

    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.send(ServiceCommand::Shutdown).await
    }

    /// Render a template against what is on screen now
    pub async fn render(&self, template: impl Into<String>) -> Result<RenderOutput, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServiceCommand::Render {
            template: template.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServiceError::NoReply)
    }

    pub async fn snapshot(&self) -> Result<PipelineSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServiceCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| ServiceError::NoReply)
    }
}

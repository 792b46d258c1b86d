//! Client for submitting jobs to a running worker.

use super::protocol::{read_frame, write_frame, Job, JobAck};
use crate::config::IntakeConfig;
use crate::error::{Result, TableError};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::debug;

/// A connection to a job server.
#[derive(Debug)]
pub struct JobClient {
    stream: TcpStream,
    addr: SocketAddr,
}

impl JobClient {
    /// Connect within `IntakeConfig::CONNECT_TIMEOUT`.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let failed = |message: String| TableError::Connection {
            host: addr.ip().to_string(),
            port: addr.port(),
            message,
        };
        let stream = tokio::time::timeout(IntakeConfig::CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| failed("timed out".to_string()))?
            .map_err(|e| failed(e.to_string()))?;

        debug!("Job client connected to {}", addr);
        Ok(Self { stream, addr })
    }

    /// Send one job and wait until it is queued.
    pub async fn submit(&mut self, job: &Job) -> Result<()> {
        let payload = serde_json::to_vec(job)?;
        let (mut reader, mut writer) = self.stream.split();

        write_frame(&mut writer, &payload).await?;
        let reply = read_frame(&mut reader)
            .await?
            .ok_or_else(|| TableError::protocol("job server closed the connection"))?;
        let ack: JobAck = serde_json::from_slice(&reply)?;

        if ack.accepted {
            Ok(())
        } else {
            Err(TableError::protocol(
                ack.error.unwrap_or_else(|| "job rejected".to_string()),
            ))
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

//! TCP job server and worker pool.
//!
//! Connections are handled one task each. Every parsed job is acknowledged
//! once it is on the queue; a fixed number of workers drain the queue, each
//! running one job to completion before taking the next.

use super::protocol::{read_frame, write_frame, Job, JobAck};
use crate::config::IntakeConfig;
use crate::error::{Result, TableError};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runs queued jobs.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle_job(&self, job: Job);
}

/// Handle to a running job server.
pub struct JobServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting jobs and close client connections. Workers finish the
    /// job in hand and whatever is already queued.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.conn_shutdown_tx.send(true);
    }

    /// Shut down and wait for the workers to drain the queue.
    pub async fn join(mut self) {
        self.shutdown();
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
        let workers = std::mem::take(&mut self.workers);
        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                error!("Job worker panicked: {}", e);
            }
        }
        info!("Job server stopped");
    }
}

impl Drop for JobServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

pub struct JobServer;

impl JobServer {
    /// Bind `addr` and start `workers` workers feeding jobs to `handler`.
    pub async fn start<H: JobHandler>(
        addr: SocketAddr,
        handler: Arc<H>,
        workers: usize,
    ) -> Result<JobServerHandle> {
        if workers == 0 {
            return Err(TableError::Config {
                message: "at least one job worker is required".to_string(),
            });
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TableError::Config {
                message: format!("cannot listen on {}: {}", addr, e),
            })?;
        let addr = listener.local_addr()?;
        info!(%addr, workers, "Job server listening");

        let (job_tx, job_rx) = mpsc::channel::<Job>(IntakeConfig::QUEUE_DEPTH);
        let queue: JobQueue = Arc::new(Mutex::new(job_rx));
        let worker_tasks = (0..workers)
            .map(|id| tokio::spawn(Self::worker(id, queue.clone(), handler.clone())))
            .collect();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(Self::accept_loop(
            listener,
            job_tx,
            shutdown_rx,
            conn_shutdown_rx,
            Arc::new(AtomicUsize::new(0)),
        ));

        Ok(JobServerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            accept_task: Some(accept_task),
            workers: worker_tasks,
        })
    }

    async fn worker<H: JobHandler>(id: usize, queue: JobQueue, handler: Arc<H>) {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(job) = next else {
                debug!(worker = id, "Job queue closed");
                return;
            };
            debug!(worker = id, request = %job.request, match_id = %job.match_id, "Running job");
            handler.handle_job(job).await;
        }
    }

    async fn accept_loop(
        listener: TcpListener,
        job_tx: mpsc::Sender<Job>,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
        active_connections: Arc<AtomicUsize>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Job server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let current = active_connections.load(Ordering::Relaxed);
                            if current >= IntakeConfig::MAX_CONNECTIONS {
                                warn!(
                                    "Rejecting job connection from {}: at max capacity ({})",
                                    peer_addr,
                                    IntakeConfig::MAX_CONNECTIONS
                                );
                                continue;
                            }

                            active_connections.fetch_add(1, Ordering::Relaxed);
                            let job_tx = job_tx.clone();
                            let conns = active_connections.clone();
                            let mut conn_shutdown = conn_shutdown_rx.clone();

                            tokio::spawn(async move {
                                debug!("Job connection from {}", peer_addr);
                                if let Err(e) = Self::handle_connection(stream, &job_tx, &mut conn_shutdown).await {
                                    debug!("Job connection {} ended: {}", peer_addr, e);
                                }
                                conns.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!("Job accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        job_tx: &mpsc::Sender<Job>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.split();

        loop {
            let frame = tokio::select! {
                result = read_frame(&mut reader) => {
                    match result? {
                        Some(f) => f,
                        None => return Ok(()),
                    }
                }
                _ = shutdown_rx.changed() => {
                    return Ok(());
                }
            };

            let ack = match serde_json::from_slice::<Job>(&frame) {
                Ok(job) => match job_tx.send(job).await {
                    Ok(()) => JobAck::accepted(),
                    Err(_) => JobAck::rejected("job queue is closed"),
                },
                Err(e) => {
                    warn!("Rejecting malformed job: {}", e);
                    JobAck::rejected(format!("malformed job: {}", e))
                }
            };

            write_frame(&mut writer, &serde_json::to_vec(&ack)?).await?;
        }
    }
}

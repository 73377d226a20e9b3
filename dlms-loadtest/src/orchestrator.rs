//! Bounded-parallelism session driver
//!
//! One task per endpoint; at most `concurrency` of them hold a permit and
//! run a session at any time. Every task writes exactly one record:
//!
//! - `Ok` when open, initialization, the reads and close all completed
//! - `Error` with the endpoint and an error chain otherwise, panics included
//! - `Cancelled` when the run was cancelled before the task got its permit
//!
//! Cancellation is only observed while waiting for a permit; sessions in
//! flight finish normally.

use crate::config::{ReadSpec, RunConfig};
use crate::endpoint::{derive_endpoint, endpoint_name};
use crate::factory::{DefaultSessionFactory, SessionFactory};
use crate::report::{Outcome, ReportCollector, RunReport, SessionRecord};
use anyhow::{anyhow, Context};
use dlms_client::{ClientSettings, Session};
use dlms_core::{DlmsError, DlmsResult};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Drives the sessions of one run
pub struct Orchestrator<F = DefaultSessionFactory> {
    config: RunConfig,
    factory: Arc<F>,
    cancel: CancellationToken,
}

impl Orchestrator<DefaultSessionFactory> {
    pub fn new(config: RunConfig) -> Self {
        Self::with_factory(config, DefaultSessionFactory)
    }
}

impl<F> Orchestrator<F>
where
    F: SessionFactory + 'static,
{
    pub fn with_factory(config: RunConfig, factory: F) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelling the tasks that have not started yet
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the run on Ctrl-C
    ///
    /// The returned task ends with the run's token; abort it if the run
    /// finishes first.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        warn!("Interrupt received, cancelling sessions that have not started");
                        cancel.cancel();
                    }
                    Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
                },
                _ = cancel.cancelled() => {}
            }
        })
    }

    /// Run every session and collect one record per endpoint
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();
        let collector = ReportCollector::new();
        let session_count = self.config.session_count;

        if let Err(e) = self.config.validate() {
            error!("Invalid run configuration: {}", e);
            for index in 0..session_count {
                collector.append(SessionRecord::new(
                    index,
                    endpoint_name(&self.config.base, index),
                    Outcome::Error(format!("invalid configuration: {}", e)),
                ));
            }
            return collector.report();
        }

        info!(
            "Starting {} session(s) from {}, at most {} at once",
            session_count,
            self.config.base.endpoint(),
            self.config.concurrency
        );

        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let reads: Arc<[ReadSpec]> = self.config.reads.clone().into();
        let mut tasks = Vec::with_capacity(session_count);

        for index in 0..session_count {
            let endpoint = endpoint_name(&self.config.base, index);
            let settings = derive_endpoint(&self.config.base, index);
            let task = SessionTask {
                index,
                endpoint,
                factory: self.factory.clone(),
                reads: reads.clone(),
                warm_up: self.config.warm_up,
            };
            let permits = permits.clone();
            let cancel = self.cancel.clone();
            let collector = collector.clone();

            tasks.push(tokio::spawn(async move {
                let outcome = match acquire_permit(permits, &cancel).await {
                    Err(DlmsError::Cancelled) => Outcome::Cancelled,
                    Err(e) => Outcome::Error(format!("{}: {}", task.endpoint, e)),
                    Ok(permit) => {
                        let outcome = match settings {
                            Ok(settings) => task.run(settings).await,
                            Err(e) => Outcome::Error(format!("{}: {}", task.endpoint, e)),
                        };
                        drop(permit);
                        outcome
                    }
                };
                collector.append(SessionRecord::new(task.index, task.endpoint, outcome));
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!("Session task lost: {}", e);
            }
        }

        let report = collector.report();
        info!(
            "Run finished in {:?}: {} ok, {} failed, {} cancelled",
            started.elapsed(),
            report.succeeded(),
            report.failed(),
            report.cancelled()
        );
        report
    }
}

/// Wait for a run permit unless the run is cancelled first
///
/// # Errors
///
/// `Cancelled` once `cancel` fires, also when a permit is free at the same time.
async fn acquire_permit(
    permits: Arc<Semaphore>,
    cancel: &CancellationToken,
) -> DlmsResult<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DlmsError::Cancelled),
        permit = permits.acquire_owned() => permit.map_err(|_| {
            DlmsError::InvalidData("Concurrency limiter closed".to_string())
        }),
    }
}

struct SessionTask<F> {
    index: usize,
    endpoint: String,
    factory: Arc<F>,
    reads: Arc<[ReadSpec]>,
    warm_up: bool,
}

impl<F> SessionTask<F>
where
    F: SessionFactory + 'static,
{
    /// Run the session in its own task so a panic stays contained
    async fn run(&self, settings: ClientSettings) -> Outcome {
        let factory = self.factory.clone();
        let reads = self.reads.clone();
        let warm_up = self.warm_up;
        let started = Instant::now();

        let result = tokio::spawn(async move {
            if warm_up {
                warm_up_session(factory.as_ref(), &settings)
                    .await
                    .context("warm-up")?;
            }
            measured_session(factory.as_ref(), &settings, &reads).await
        })
        .await
        .unwrap_or_else(|e| Err(panic_error(e)));

        match result {
            Ok(()) => {
                info!("#{} {}: ok in {:?}", self.index, self.endpoint, started.elapsed());
                Outcome::Ok
            }
            Err(e) => {
                let message = format!("{}: {:#}", self.endpoint, e);
                warn!("#{} {}", self.index, message);
                Outcome::Error(message)
            }
        }
    }
}

fn panic_error(e: JoinError) -> anyhow::Error {
    if !e.is_panic() {
        return anyhow!("session task cancelled");
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    anyhow!("session panicked: {}", message)
}

async fn warm_up_session<F: SessionFactory>(factory: &F, settings: &ClientSettings) -> anyhow::Result<()> {
    let mut session = factory.create(settings).context("creating session")?;
    let result = connect(&mut session).await;
    session.close().await;
    debug!("{}: warm-up done", settings.endpoint());
    result
}

async fn measured_session<F: SessionFactory>(
    factory: &F,
    settings: &ClientSettings,
    reads: &[ReadSpec],
) -> anyhow::Result<()> {
    let mut session = factory.create(settings).context("creating session")?;
    let result = drive(&mut session, reads).await;
    session.close().await;
    result
}

async fn connect(session: &mut Session) -> anyhow::Result<()> {
    session.open().await.context("opening transport")?;
    session
        .initialize_connection()
        .await
        .context("initializing connection")?;
    Ok(())
}

async fn drive(session: &mut Session, reads: &[ReadSpec]) -> anyhow::Result<()> {
    connect(session).await?;
    for read in reads {
        let mut object = read.object();
        let value = session
            .read(&mut object, read.attribute)
            .await
            .with_context(|| format!("reading {} attribute {}", read.logical_name, read.attribute))?;
        debug!(
            "{}: {} attribute {} = {:?}",
            session.describe(),
            read.logical_name,
            read.attribute,
            value
        );
    }
    Ok(())
}

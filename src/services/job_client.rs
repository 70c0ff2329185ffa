use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClientConfig, PollPolicy};
use crate::error::ClientError;
use crate::models::analysis::{AnalysisStatus, AnalyzeRequest, HealthReport};
use crate::models::filter::FilterPartition;
use crate::models::image::ImageUpload;
use crate::models::job::{FailureReason, Job};
use crate::services::analysis::{AnalysisService, HttpAnalysisService, ServiceError};
use crate::services::filters::FilterSelection;

/// Drives one analysis job at a time through upload → analyze → poll →
/// results against an [`AnalysisService`].
///
/// The client is the only writer of its [`Job`]. Presentation code reads
/// snapshots or subscribes to every transition. Submitting a new image or
/// calling [`reset`](Self::reset) cancels whatever the previous job had in
/// flight, and any response that still arrives for it is dropped.
#[derive(Clone)]
pub struct AnalysisJobClient {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<dyn AnalysisService>,
    policy: PollPolicy,
    slot: Mutex<Slot>,
    updates: watch::Sender<Job>,
    /// Revision of the snapshot currently held by `updates`.
    published: AtomicU64,
}

struct Slot {
    job: Job,
    cancel: CancellationToken,
    next_generation: u64,
    revision: u64,
}

impl Slot {
    /// Snapshot the job under the lock; it is sent once the lock is released.
    fn update(&mut self) -> Update {
        self.revision += 1;
        Update {
            revision: self.revision,
            job: self.job.clone(),
        }
    }
}

/// Job snapshot tagged with the slot revision it was taken at.
struct Update {
    revision: u64,
    job: Job,
}

/// Identifies the job an in-flight operation was started for.
struct Ticket {
    generation: u64,
    trace_id: Uuid,
    cancel: CancellationToken,
}

impl AnalysisJobClient {
    pub fn new(service: Arc<dyn AnalysisService>, policy: PollPolicy) -> Self {
        let job = Job::idle(0);
        let (updates, _) = watch::channel(job.clone());
        Self {
            inner: Arc::new(Inner {
                service,
                policy,
                slot: Mutex::new(Slot {
                    job,
                    cancel: CancellationToken::new(),
                    next_generation: 1,
                    revision: 0,
                }),
                updates,
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Client talking HTTP to the service named in `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ServiceError> {
        let service = HttpAnalysisService::new(&config.api_base_url, config.request_timeout())?;
        Ok(Self::new(Arc::new(service), config.poll_policy()))
    }

    pub fn policy(&self) -> PollPolicy {
        self.inner.policy
    }

    /// Copy of the current job.
    pub fn snapshot(&self) -> Job {
        self.inner.slot.lock().job.clone()
    }

    /// Receive every job transition as it happens.
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.inner.updates.subscribe()
    }

    /// Passed and failed filters of the completed job.
    pub fn results(&self) -> Result<FilterPartition, ClientError> {
        self.inner.slot.lock().job.partition()
    }

    pub async fn health(&self) -> Result<HealthReport, ServiceError> {
        self.inner.service.health().await
    }

    /// Discard the current job and cancel anything it has in flight.
    pub fn reset(&self) -> Job {
        let update = {
            let mut slot = self.inner.slot.lock();
            slot.cancel.cancel();
            let generation = slot.next_generation;
            slot.next_generation += 1;
            slot.job = Job::idle(generation);
            slot.cancel = CancellationToken::new();
            slot.update()
        };
        info!(generation = update.job.generation(), "Job reset");
        let job = update.job.clone();
        self.publish(update);
        job
    }

    /// Start a new job from raw image bytes and upload them.
    ///
    /// Empty bytes are rejected with [`ClientError::InvalidInput`] and leave
    /// the current job untouched.
    pub async fn submit_image(&self, bytes: Vec<u8>, mime_type: &str) -> Result<Job, ClientError> {
        let image = ImageUpload::new(bytes, mime_type)?;
        self.submit_upload(image).await
    }

    /// Start a new job for `image`, replacing any previous one, and upload it.
    ///
    /// Resolves to the job in `Ready` with its extracted ingredients. An
    /// empty ingredient list is a successful upload.
    pub async fn submit_upload(&self, image: ImageUpload) -> Result<Job, ClientError> {
        let upload = image.clone();
        let ticket = self.start_job(image);
        metrics::counter!("sift_jobs_submitted_total").increment(1);
        info!(
            trace_id = %ticket.trace_id,
            generation = ticket.generation,
            bytes = upload.len(),
            mime_type = upload.mime_type(),
            "Uploading label image"
        );

        let reply = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => return Err(self.discarded(&ticket, "upload")),
            reply = self.inner.service.upload(&upload) => reply,
        };

        match reply {
            Ok(response) => {
                let job = self.with_job(&ticket, |job| {
                    job.upload_succeeded(response.job_id, response.ingredients)?;
                    Ok(job.clone())
                })?;
                info!(
                    trace_id = %ticket.trace_id,
                    job_id = job.job_id().unwrap_or_default(),
                    ingredients = job.ingredients().len(),
                    "Ingredients extracted"
                );
                Ok(job)
            }
            Err(e) => {
                self.fail(&ticket, FailureReason::UploadFailed, e.to_string())?;
                Err(ClientError::UploadFailed(e))
            }
        }
    }

    /// Evaluate the checked filters against the current job's ingredients,
    /// waiting until the service settles or the polling budget runs out.
    ///
    /// The selection is captured on entry. `NoFilterSelected` and
    /// `NoIngredients` leave the job in `Ready`.
    pub async fn request_analysis(&self, selection: &FilterSelection) -> Result<Job, ClientError> {
        let started = Instant::now();
        let (ticket, request) = self.start_analysis(selection)?;
        info!(
            trace_id = %ticket.trace_id,
            job_id = %request.job_id,
            filters = ?request.filters,
            "Requesting analysis"
        );

        let reply = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => return Err(self.discarded(&ticket, "analyze")),
            reply = self.inner.service.analyze(&request) => reply,
        };
        if let Err(e) = reply {
            self.fail(&ticket, FailureReason::AnalysisRequestFailed, e.to_string())?;
            return Err(ClientError::AnalysisRequestFailed(e));
        }
        self.with_job(&ticket, |job| job.analysis_accepted())?;

        let budget = self.inner.policy.timeout;
        match timeout(budget, self.poll_until_settled(&ticket, &request.job_id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                self.fail(
                    &ticket,
                    FailureReason::Timeout,
                    format!("no result after {:?}", budget),
                )?;
                return Err(ClientError::Timeout(budget));
            }
        }

        let reply = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => return Err(self.discarded(&ticket, "results")),
            reply = self.inner.service.results(&request.job_id) => reply,
        };
        match reply {
            Ok(outcome) => {
                let job = self.with_job(&ticket, |job| {
                    job.complete(outcome)?;
                    Ok(job.clone())
                })?;
                let elapsed = started.elapsed();
                metrics::counter!("sift_jobs_completed_total").increment(1);
                metrics::histogram!("sift_analysis_duration_seconds").record(elapsed.as_secs_f64());
                info!(
                    trace_id = %ticket.trace_id,
                    job_id = %request.job_id,
                    polls = job.polls(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Analysis complete"
                );
                Ok(job)
            }
            Err(e) => {
                let message = format!("results unavailable: {}", e);
                self.fail(&ticket, FailureReason::AnalysisFailed, message.clone())?;
                Err(ClientError::AnalysisFailed(message))
            }
        }
    }

    /// Poll status until the service reports `complete` (Ok) or `error`.
    /// A new poll is only sent after the previous one answered.
    async fn poll_until_settled(&self, ticket: &Ticket, job_id: &str) -> Result<(), ClientError> {
        loop {
            tokio::select! {
                biased;
                _ = ticket.cancel.cancelled() => return Err(self.discarded(ticket, "poll")),
                _ = sleep(self.inner.policy.interval) => {}
            }

            let reply = tokio::select! {
                biased;
                _ = ticket.cancel.cancelled() => return Err(self.discarded(ticket, "poll")),
                reply = self.inner.service.status(job_id) => reply,
            };
            metrics::counter!("sift_status_polls_total").increment(1);

            match reply {
                Ok(response) => {
                    let status = response.status;
                    let detail = response.error;
                    let job = self.with_job(ticket, |job| {
                        job.record_poll(status, detail)?;
                        Ok(job.clone())
                    })?;
                    debug!(trace_id = %ticket.trace_id, %status, polls = job.polls(), "Status polled");

                    match status {
                        AnalysisStatus::Error => {
                            self.record_failure(ticket, FailureReason::AnalysisFailed, job.error());
                            return Err(ClientError::AnalysisFailed(
                                job.error().unwrap_or_default().to_string(),
                            ));
                        }
                        _ if status.is_settled() => return Ok(()),
                        _ => {}
                    }
                }
                Err(e) => {
                    let message = format!("status check failed: {}", e);
                    self.fail(ticket, FailureReason::AnalysisFailed, message.clone())?;
                    return Err(ClientError::AnalysisFailed(message));
                }
            }
        }
    }

    fn start_job(&self, image: ImageUpload) -> Ticket {
        let (ticket, update) = {
            let mut slot = self.inner.slot.lock();
            if slot.job.phase().is_in_flight() {
                debug!(
                    previous = slot.job.generation(),
                    phase = %slot.job.phase(),
                    "New image replaces in-flight job"
                );
            }
            slot.cancel.cancel();

            let generation = slot.next_generation;
            slot.next_generation += 1;
            let mut job = Job::idle(generation);
            // A fresh job is always Idle
            let _ = job.begin_upload(image);
            slot.job = job;
            slot.cancel = CancellationToken::new();

            let ticket = Ticket {
                generation,
                trace_id: slot.job.trace_id(),
                cancel: slot.cancel.clone(),
            };
            (ticket, slot.update())
        };
        self.publish(update);
        ticket
    }

    fn start_analysis(
        &self,
        selection: &FilterSelection,
    ) -> Result<(Ticket, AnalyzeRequest), ClientError> {
        let filters = selection.selected();
        let (ticket, request, update) = {
            let mut slot = self.inner.slot.lock();
            let request = slot.job.analysis_request(&filters)?;
            slot.job.begin_analysis(filters)?;

            let ticket = Ticket {
                generation: slot.job.generation(),
                trace_id: slot.job.trace_id(),
                cancel: slot.cancel.clone(),
            };
            (ticket, request, slot.update())
        };
        self.publish(update);
        Ok((ticket, request))
    }

    /// Apply `f` to the job the ticket belongs to, then publish the result.
    /// A ticket for a replaced job gets [`ClientError::Superseded`] and the
    /// current job is left alone.
    fn with_job<T>(
        &self,
        ticket: &Ticket,
        f: impl FnOnce(&mut Job) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let (result, update) = {
            let mut slot = self.inner.slot.lock();
            if slot.job.generation() != ticket.generation {
                debug!(
                    stale = ticket.generation,
                    current = slot.job.generation(),
                    "Discarding response for replaced job"
                );
                return Err(ClientError::Superseded);
            }
            let result = f(&mut slot.job);
            (result, slot.update())
        };
        self.publish(update);
        result
    }

    fn fail(
        &self,
        ticket: &Ticket,
        reason: FailureReason,
        message: String,
    ) -> Result<(), ClientError> {
        let message = self.with_job(ticket, |job| {
            job.fail(reason, message)?;
            Ok(job.error().map(str::to_string))
        })?;
        self.record_failure(ticket, reason, message.as_deref());
        Ok(())
    }

    fn record_failure(&self, ticket: &Ticket, reason: FailureReason, message: Option<&str>) {
        let label: &'static str = reason.into();
        metrics::counter!("sift_jobs_failed_total", "reason" => label).increment(1);
        warn!(
            trace_id = %ticket.trace_id,
            reason = label,
            error = message.unwrap_or_default(),
            "Job failed"
        );
    }

    fn discarded(&self, ticket: &Ticket, operation: &'static str) -> ClientError {
        debug!(trace_id = %ticket.trace_id, operation, "Operation cancelled");
        ClientError::Superseded
    }

    /// Send a snapshot to subscribers. Call with the slot unlocked: a
    /// subscriber may hold a borrow while calling back into the client.
    /// Snapshots older than the one already sent are dropped.
    fn publish(&self, update: Update) {
        let Update { revision, job } = update;
        self.inner.updates.send_if_modified(|current| {
            if revision <= self.inner.published.load(Ordering::Acquire) {
                return false;
            }
            self.inner.published.store(revision, Ordering::Release);
            *current = job;
            true
        });
    }
}

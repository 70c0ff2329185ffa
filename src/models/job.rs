use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, IntoStaticStr};
use uuid::Uuid;

use crate::error::ClientError;
use crate::models::analysis::{AnalysisOutcome, AnalysisStatus, AnalyzeRequest};
use crate::models::filter::{Filter, FilterPartition};
use crate::models::image::ImageUpload;
use crate::services::partition;

/// Why a job ended up in [`Phase::Errored`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    UploadFailed,
    AnalysisRequestFailed,
    AnalysisFailed,
    Timeout,
}

/// Where a job is in the upload → analyze → poll → results protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Idle,
    Uploading,
    Ready,
    Analyzing,
    Polling,
    Complete,
    Errored(FailureReason),
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Errored(_))
    }

    /// A request to the service is (or may be) outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Uploading | Phase::Analyzing | Phase::Polling)
    }
}

/// One attempt to extract ingredients from a label image and evaluate
/// dietary filters against them.
///
/// Only the analysis client mutates a job; everyone else sees snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    trace_id: Uuid,
    generation: u64,
    phase: Phase,
    #[serde(skip)]
    image: Option<ImageUpload>,
    job_id: Option<String>,
    ingredients: Vec<String>,
    selected_filters: Vec<Filter>,
    outcome: Option<AnalysisOutcome>,
    error: Option<String>,
    polls: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh job with no image.
    pub fn idle(generation: u64) -> Self {
        let now = Utc::now();
        Self {
            trace_id: Uuid::new_v4(),
            generation,
            phase: Phase::Idle,
            image: None,
            job_id: None,
            ingredients: Vec::new(),
            selected_filters: Vec::new(),
            outcome: None,
            error: None,
            polls: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn selected_filters(&self) -> &[Filter] {
        &self.selected_filters
    }

    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        self.outcome.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.phase {
            Phase::Errored(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Passed and failed filters of a completed job.
    pub fn partition(&self) -> Result<FilterPartition, ClientError> {
        match (&self.phase, &self.outcome) {
            (Phase::Complete, Some(outcome)) => {
                partition::partition(outcome, &self.selected_filters)
            }
            _ => Err(self.reject("read results")),
        }
    }

    pub(crate) fn begin_upload(&mut self, image: ImageUpload) -> Result<(), ClientError> {
        self.expect(Phase::Idle, "upload an image")?;
        self.image = Some(image);
        self.enter(Phase::Uploading);
        Ok(())
    }

    pub(crate) fn upload_succeeded(
        &mut self,
        job_id: String,
        ingredients: Vec<String>,
    ) -> Result<(), ClientError> {
        self.expect(Phase::Uploading, "accept an upload")?;
        if self.job_id.is_some() {
            return Err(self.reject("assign a second job id"));
        }
        self.job_id = Some(job_id);
        self.ingredients = ingredients;
        // The service owns the image from here on
        self.image = None;
        self.enter(Phase::Ready);
        Ok(())
    }

    /// Validate an analysis request without changing state.
    ///
    /// Filters are checked before ingredients, so an empty selection is
    /// reported even when nothing was extracted.
    pub(crate) fn analysis_request(&self, filters: &[Filter]) -> Result<AnalyzeRequest, ClientError> {
        self.expect(Phase::Ready, "request analysis")?;
        if filters.is_empty() {
            return Err(ClientError::NoFilterSelected);
        }
        if self.ingredients.is_empty() {
            return Err(ClientError::NoIngredients);
        }
        let job_id = self
            .job_id
            .clone()
            .ok_or_else(|| self.reject("request analysis without a job id"))?;

        Ok(AnalyzeRequest {
            job_id,
            ingredients: self.ingredients.clone(),
            filters: filters.iter().map(|f| f.key.to_string()).collect(),
        })
    }

    pub(crate) fn begin_analysis(&mut self, filters: Vec<Filter>) -> Result<(), ClientError> {
        self.expect(Phase::Ready, "request analysis")?;
        self.selected_filters = filters;
        self.enter(Phase::Analyzing);
        Ok(())
    }

    pub(crate) fn analysis_accepted(&mut self) -> Result<(), ClientError> {
        self.expect(Phase::Analyzing, "start polling")?;
        self.enter(Phase::Polling);
        Ok(())
    }

    /// Record one status poll. `pending`, `analyzing` and `complete` keep the
    /// job polling (results are fetched separately); `error` fails it.
    pub(crate) fn record_poll(
        &mut self,
        status: AnalysisStatus,
        detail: Option<String>,
    ) -> Result<(), ClientError> {
        self.expect(Phase::Polling, "record a status poll")?;
        self.polls += 1;
        match status {
            AnalysisStatus::Pending | AnalysisStatus::Analyzing | AnalysisStatus::Complete => {
                self.updated_at = Utc::now();
            }
            AnalysisStatus::Error => {
                let message = detail.unwrap_or_else(|| "Analysis failed on server".to_string());
                self.fail(FailureReason::AnalysisFailed, message)?;
            }
        }
        Ok(())
    }

    pub(crate) fn complete(&mut self, outcome: AnalysisOutcome) -> Result<(), ClientError> {
        self.expect(Phase::Polling, "store results")?;
        self.outcome = Some(outcome);
        self.enter(Phase::Complete);
        Ok(())
    }

    /// Move a non-terminal job to `Errored`.
    pub(crate) fn fail(
        &mut self,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> Result<(), ClientError> {
        if self.phase.is_terminal() || self.phase == Phase::Idle {
            return Err(self.reject("fail"));
        }
        self.error = Some(message.into());
        self.enter(Phase::Errored(reason));
        Ok(())
    }

    fn expect(&self, phase: Phase, action: &'static str) -> Result<(), ClientError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(self.reject(action))
        }
    }

    fn reject(&self, action: &'static str) -> ClientError {
        ClientError::InvalidTransition {
            phase: self.phase,
            action,
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }
}

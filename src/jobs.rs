/*!
 * Job tracking for polling clients.
 *
 * Every orchestration run owns exactly one `Job`, keyed by the deterministic
 * job id. A job entry carries the `run_id` of the run that created it; updates
 * and scheduled removals from any other run are ignored, so a replaced job is
 * never touched by the run it replaced.
 *
 * Every applied transition is also broadcast as a `JobEvent` to subscribers.
 */

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::artifact_cache::ArtifactRef;
use crate::request::CacheKey;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Starting,
    FetchingImdb,
    SearchingSubs,
    Downloading,
    Translating,
    Finalizing,
    Converting,
    /// Artifact persisted
    Complete,
    /// An attempt failed and another will follow
    Retrying,
    /// All attempts failed
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// States that reset progress to zero
    fn resets_progress(&self) -> bool {
        matches!(self, JobState::Retrying | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Starting => "starting",
            JobState::FetchingImdb => "fetching_imdb",
            JobState::SearchingSubs => "searching_subs",
            JobState::Downloading => "downloading",
            JobState::Translating => "translating",
            JobState::Finalizing => "finalizing",
            JobState::Converting => "converting",
            JobState::Complete => "complete",
            JobState::Retrying => "retrying",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A tracked orchestration run
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Run that owns this entry
    pub run_id: Uuid,
    pub language: String,
    pub language_name: String,
    pub state: JobState,
    pub message: String,
    /// 0-100
    pub progress: u8,
    /// Provider that supplied the source text, once known
    pub source: Option<String>,
    /// Providers consulted, reported on failure
    pub sources_tried: Vec<String>,
    pub artifact: Option<ArtifactRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot returned to polling clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub state: JobState,
    pub message: String,
    pub progress: u8,
    pub language: String,
    pub language_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sources_tried: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobStatus {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            state: job.state,
            message: job.message.clone(),
            progress: job.progress,
            language: job.language.clone(),
            language_name: job.language_name.clone(),
            source: job.source.clone(),
            sources_tried: job.sources_tried.clone(),
            artifact: job.artifact.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Buffered transitions per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 1024;

/// A transition applied to a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub job_id: String,
    pub state: JobState,
    /// Progress after clamping
    pub progress: u8,
    pub message: String,
}

impl From<&Job> for JobEvent {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            state: job.state,
            progress: job.progress,
            message: job.message.clone(),
        }
    }
}

/// Result of registering a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new job was created and the caller owns it
    Started(Uuid),
    /// A job with the same id is already in flight
    InFlight,
    /// A run for the same id already finished with this artifact
    Completed(ArtifactRef),
}

/// Registry of live and recently finished jobs
#[derive(Clone)]
pub struct JobTracker {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    grace_period: Duration,
    events: broadcast::Sender<JobEvent>,
}

impl JobTracker {
    /// Create a tracker that keeps terminal jobs for `grace_period`
    pub fn new(grace_period: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            grace_period,
            events,
        }
    }

    /// Receive every transition applied from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Create a job for `key` unless one is already in flight or complete.
    ///
    /// A failed job under the same id is replaced by the new run.
    pub fn register(&self, key: &CacheKey) -> Registration {
        let id = key.job_id();
        let mut jobs = self.jobs.write();

        if let Some(existing) = jobs.get(&id) {
            if !existing.state.is_terminal() {
                debug!("[{}] already in flight ({})", id, existing.state);
                return Registration::InFlight;
            }
            if let (JobState::Complete, Some(artifact)) = (existing.state, &existing.artifact) {
                debug!("[{}] already complete", id);
                return Registration::Completed(artifact.clone());
            }
        }

        let now = Utc::now();
        let run_id = Uuid::new_v4();
        let language_name = key.language_name();
        let message = format!("Initializing subtitle fetch for {}...", language_name);
        let job = Job {
            id: id.clone(),
            run_id,
            language: key.language.clone(),
            language_name,
            state: JobState::Starting,
            message,
            progress: 0,
            source: None,
            sources_tried: Vec::new(),
            artifact: None,
            created_at: now,
            updated_at: now,
        };
        info!("[{}] {}: {} ({}%)", id, job.state, job.message, job.progress);
        self.publish(&job);
        jobs.insert(id, job);

        Registration::Started(run_id)
    }

    /// Publish a state transition. Ignored unless `run_id` still owns the job.
    ///
    /// Progress never decreases within a run except on `retrying` and
    /// `failed`, which reset it to zero.
    pub fn update(&self, job_id: &str, run_id: Uuid, state: JobState, message: impl Into<String>, progress: u8) -> bool {
        self.with_owned_job(job_id, run_id, |job| {
            let message = message.into();
            job.progress = if state.resets_progress() {
                0
            } else {
                progress.min(100).max(job.progress)
            };
            job.state = state;
            job.message = message;
            job.updated_at = Utc::now();

            info!("[{}] {}: {} ({}%)", job.id, job.state, job.message, job.progress);
            self.publish(job);
        })
    }

    /// Record the provider that supplied the source text
    pub fn set_source(&self, job_id: &str, run_id: Uuid, source: &str) -> bool {
        self.with_owned_job(job_id, run_id, |job| {
            job.source = Some(source.to_string());
            job.updated_at = Utc::now();
        })
    }

    /// Mark the job complete with its artifact
    pub fn complete(&self, job_id: &str, run_id: Uuid, artifact: ArtifactRef) -> bool {
        let message = format!("Subtitle in {} ready!", self.language_name(job_id).unwrap_or_default());
        let updated = self.with_owned_job(job_id, run_id, |job| {
            job.artifact = Some(artifact);
        });
        updated && self.update(job_id, run_id, JobState::Complete, message, 100)
    }

    /// Mark the job failed
    pub fn fail(&self, job_id: &str, run_id: Uuid, message: impl Into<String>, sources_tried: Vec<String>) -> bool {
        let updated = self.with_owned_job(job_id, run_id, |job| {
            job.sources_tried = sources_tried;
        });
        updated && self.update(job_id, run_id, JobState::Failed, message, 0)
    }

    /// Current status of a job, `None` if unknown or expired
    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().get(job_id).map(JobStatus::from)
    }

    /// Run that currently owns the job id
    pub fn owner(&self, job_id: &str) -> Option<Uuid> {
        self.jobs.read().get(job_id).map(|job| job.run_id)
    }

    /// Remove the job after the grace period, unless another run has taken
    /// the id over in the meantime
    pub fn schedule_removal(&self, job_id: &str, run_id: Uuid) -> JoinHandle<()> {
        let jobs = Arc::clone(&self.jobs);
        let grace_period = self.grace_period;
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;

            let mut jobs = jobs.write();
            let owned = jobs.get(&job_id).map(|job| job.run_id == run_id).unwrap_or(false);
            if owned {
                jobs.remove(&job_id);
                debug!("Cleaned up job: {}", job_id);
            }
        })
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    fn publish(&self, job: &Job) {
        // No subscribers is the common case
        let _ = self.events.send(JobEvent::from(job));
    }

    fn language_name(&self, job_id: &str) -> Option<String> {
        self.jobs.read().get(job_id).map(|job| job.language_name.clone())
    }

    fn with_owned_job(&self, job_id: &str, run_id: Uuid, apply: impl FnOnce(&mut Job)) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id) {
            Some(job) if job.run_id == run_id => {
                apply(job);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTracker")
            .field("jobs", &self.len())
            .field("grace_period", &self.grace_period)
            .finish()
    }
}

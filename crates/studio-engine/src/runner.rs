use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use serde_json::{json, Value};
use studio_contracts::events::{CampaignEvent, EventWriter};
use studio_contracts::jobs::{Job, JobName, JobSchema};
use studio_contracts::runs::{AssetStatus, CampaignResult, ImageRecord, JobFailure};
use tracing::{info, warn};

use crate::{error_chain_text, map_object};
use crate::providers::InferenceProvider;

/// Longest error text kept per failed job.
pub const MAX_JOB_ERROR_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Run the image jobs on scoped threads. Video and audio stay ordered
    /// after them.
    pub parallel_images: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { reference: String },
    Failed { error: String },
    Skipped { reason: String },
}

impl JobOutcome {
    pub fn status(&self) -> AssetStatus {
        match self {
            Self::Completed { .. } => AssetStatus::Completed,
            Self::Failed { .. } => AssetStatus::Failed,
            Self::Skipped { .. } => AssetStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: JobName,
    pub model: String,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone)]
pub struct CampaignRun {
    pub result: CampaignResult,
    pub reports: Vec<JobReport>,
}

impl CampaignRun {
    pub fn outcome(&self, job: JobName) -> Option<&JobOutcome> {
        self.reports
            .iter()
            .find(|report| report.job == job)
            .map(|report| &report.outcome)
    }

    /// Status of `job`, `NotRequested` when the schema had no such job.
    pub fn status(&self, job: JobName) -> AssetStatus {
        self.outcome(job)
            .map(JobOutcome::status)
            .unwrap_or(AssetStatus::NotRequested)
    }

    pub fn completed(&self) -> Vec<JobName> {
        self.reports
            .iter()
            .filter(|report| matches!(report.outcome, JobOutcome::Completed { .. }))
            .map(|report| report.job)
            .collect()
    }
}

/// Executes a compiled schema against one provider.
///
/// Order is fixed: image jobs in schema order, then the video, then the
/// soundtrack. Every job is attempted once; a failure is recorded and the
/// run moves on.
pub struct CampaignRunner<'a> {
    provider: &'a dyn InferenceProvider,
    events: Option<EventWriter>,
    options: RunnerOptions,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(provider: &'a dyn InferenceProvider) -> Self {
        Self {
            provider,
            events: None,
            options: RunnerOptions::default(),
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run(&self, schema: &JobSchema, timestamp: i64) -> CampaignRun {
        let mut result = CampaignResult::new(&schema.meta, timestamp);
        let mut reports = Vec::with_capacity(schema.jobs.len());

        let images: Vec<(JobName, &Job)> = schema.image_jobs().collect();
        let outcomes = if self.options.parallel_images && images.len() > 1 {
            self.run_images_parallel(&images)
        } else {
            images
                .iter()
                .map(|(name, job)| self.execute(*name, job))
                .collect()
        };
        for ((name, job), outcome) in images.iter().zip(outcomes) {
            match &outcome {
                JobOutcome::Completed { reference } => result.images.push(ImageRecord {
                    url: reference.clone(),
                    job: *name,
                    prompt: job.prompt().unwrap_or_default().to_string(),
                }),
                JobOutcome::Failed { error } => result.failures.push(JobFailure {
                    job: *name,
                    error: error.clone(),
                }),
                JobOutcome::Skipped { .. } => {}
            }
            reports.push(JobReport {
                job: *name,
                model: job.model.clone(),
                outcome,
            });
        }

        if let Some(job) = schema.get(JobName::HeroVideo) {
            let outcome = if job.needs_image_reference() {
                match result.first_image() {
                    Some(image) => {
                        let conditioned = job.with_image_reference(&image.url);
                        self.execute(JobName::HeroVideo, &conditioned)
                    }
                    None => self.skip(
                        JobName::HeroVideo,
                        "no image completed; image-conditioned video needs a still",
                    ),
                }
            } else {
                self.execute(JobName::HeroVideo, job)
            };
            self.record(&mut result, &mut reports, JobName::HeroVideo, job, outcome);
        }

        if let Some(job) = schema.get(JobName::Soundtrack) {
            let outcome = self.execute(JobName::Soundtrack, job);
            self.record(&mut result, &mut reports, JobName::Soundtrack, job, outcome);
        }

        CampaignRun { result, reports }
    }

    /// One slot per image job, filled by scoped threads and merged in order.
    fn run_images_parallel(&self, images: &[(JobName, &Job)]) -> Vec<JobOutcome> {
        thread::scope(|scope| {
            let handles: Vec<_> = images
                .iter()
                .map(|(name, job)| {
                    let name = *name;
                    let job = *job;
                    scope.spawn(move || self.execute(name, job))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect()
        })
    }

    fn record(
        &self,
        result: &mut CampaignResult,
        reports: &mut Vec<JobReport>,
        name: JobName,
        job: &Job,
        outcome: JobOutcome,
    ) {
        match &outcome {
            JobOutcome::Completed { reference } => match name {
                JobName::HeroVideo => result.video = Some(reference.clone()),
                JobName::Soundtrack => result.audio = Some(reference.clone()),
                _ => {}
            },
            JobOutcome::Failed { error } => result.failures.push(JobFailure {
                job: name,
                error: error.clone(),
            }),
            JobOutcome::Skipped { .. } => {}
        }
        reports.push(JobReport {
            job: name,
            model: job.model.clone(),
            outcome,
        });
    }

    fn execute(&self, name: JobName, job: &Job) -> JobOutcome {
        info!(job = %name, model = %job.model, "starting job");
        self.emit(
            CampaignEvent::JobStarted,
            name,
            json!({ "model": job.model, "family": job.family }),
        );
        // A panicking provider fails its job like any other error.
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            self.provider.invoke(&job.model, &job.input)
        }))
        .unwrap_or_else(|payload| {
            Err(anyhow::anyhow!(
                "{} panicked: {}",
                self.provider.name(),
                panic_message(payload.as_ref())
            ))
        });
        match invoked {
            Ok(reference) => {
                let reference = reference.into_string();
                info!(job = %name, %reference, "job completed");
                self.emit(
                    CampaignEvent::JobCompleted,
                    name,
                    json!({ "model": job.model, "reference": reference }),
                );
                JobOutcome::Completed { reference }
            }
            Err(err) => {
                let error = error_chain_text(&err, MAX_JOB_ERROR_CHARS);
                warn!(job = %name, model = %job.model, "job failed: {error}");
                self.emit(
                    CampaignEvent::JobFailed,
                    name,
                    json!({ "model": job.model, "error": error }),
                );
                JobOutcome::Failed { error }
            }
        }
    }

    fn skip(&self, name: JobName, reason: &str) -> JobOutcome {
        warn!(job = %name, "skipping job: {reason}");
        self.emit(CampaignEvent::JobSkipped, name, json!({ "reason": reason }));
        JobOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    fn emit(&self, event: CampaignEvent, job: JobName, payload: Value) {
        let Some(events) = &self.events else {
            return;
        };
        let mut fields = map_object(payload);
        fields.insert("job".to_string(), Value::String(job.as_str().to_string()));
        events.emit_quiet(event, fields);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

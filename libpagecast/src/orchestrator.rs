//! Job orchestrator: drains pending post jobs and fans each one out to
//! its targets concurrently.
//!
//! A job is taken with a conditional lease so concurrent workers never
//! publish it twice, runs every target in parallel, and settles in a
//! single terminal write regardless of how the individual targets fared.
//! Orchestration failures that prevent any target from running settle the
//! job with one synthetic result attributed to `"system"`.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::db::{Database, JobWithTargets};
use crate::error::{PagecastError, Result};
use crate::publisher::{PublishRequest, PublisherFactory};
use crate::types::{JobStatus, OutcomeStatus, PostJob, TargetResult};

/// Seconds a worker may hold a job before another worker can reclaim it
pub const LEASE_DURATION_SECS: i64 = 300;

/// Rejection reason for targets whose connection is read-only
pub const MISSING_TOKEN_MESSAGE: &str = "Missing Page Access Token";

pub struct JobProcessor {
    db: Database,
    factory: Arc<dyn PublisherFactory>,
    worker_id: String,
}

impl JobProcessor {
    pub fn new(db: Database, factory: Arc<dyn PublisherFactory>, worker_id: String) -> Self {
        Self {
            db,
            factory,
            worker_id,
        }
    }

    /// Process every pending job for a user, oldest first.
    ///
    /// Returns the number of jobs this worker actually settled; jobs held
    /// by other workers are skipped, not counted.
    pub async fn process_pending_jobs(&self, user_id: &str) -> Result<usize> {
        let pending = self.db.list_pending_jobs(user_id).await?;
        let mut processed = 0;

        for job in pending {
            if self.process_job(user_id, &job.id).await?.is_some() {
                processed += 1;
            }
        }

        Ok(processed)
    }

    /// Take one job to completion.
    ///
    /// Returns `None` when the job is already settled or another worker
    /// holds its lease; an unknown job id is a loud `NotFound`. Otherwise
    /// the job ends either completed or failed; publish errors never
    /// propagate out of here, they become rejected target results, and an
    /// orchestration-level failure settles the job with one synthetic
    /// `"system"` rejection rather than dropping the terminal write.
    #[instrument(skip(self), fields(worker = %self.worker_id))]
    pub async fn process_job(&self, user_id: &str, job_id: &str) -> Result<Option<JobWithTargets>> {
        if !self
            .db
            .try_acquire_job_lease(user_id, job_id, &self.worker_id, LEASE_DURATION_SECS)
            .await?
        {
            // A refused lease covers a held or settled job; a job that
            // does not exist at all is the caller's mistake
            if self.db.get_post_job(user_id, job_id).await?.is_none() {
                return Err(PagecastError::NotFound(format!("Job {}", job_id)));
            }
            return Ok(None);
        }

        let loaded = match self.db.get_job_with_targets(user_id, job_id).await {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return Err(PagecastError::NotFound(format!("Job {}", job_id))),
            Err(e) => {
                warn!(job_id, error = %e, "Job unreadable after lease");
                return self
                    .settle_with_system_failure(user_id, job_id, e.to_string())
                    .await;
            }
        };

        let results = if loaded.targets.is_empty() {
            // Nothing to fan out to; settle rather than report success
            vec![TargetResult::rejected(
                job_id.to_string(),
                0,
                "system".to_string(),
                "No targets".to_string(),
            )]
        } else {
            self.run_job(&loaded).await
        };

        let failure_count = results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Rejected)
            .count();
        let status = if failure_count > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        if let Err(e) = self
            .db
            .finalize_post_job(user_id, job_id, status, &results)
            .await
        {
            warn!(job_id, error = %e, "Terminal write failed");
            return self
                .settle_with_system_failure(user_id, job_id, e.to_string())
                .await;
        }

        info!(
            job_id,
            successes = results.len() - failure_count,
            failures = failure_count,
            "Job settled"
        );

        self.db.get_job_with_targets(user_id, job_id).await
    }

    /// Last-resort terminal write: one synthetic rejection attributed to
    /// `"system"`, job failed.
    async fn settle_with_system_failure(
        &self,
        user_id: &str,
        job_id: &str,
        reason: String,
    ) -> Result<Option<JobWithTargets>> {
        let results = vec![TargetResult::rejected(
            job_id.to_string(),
            0,
            "system".to_string(),
            reason,
        )];
        self.db
            .finalize_post_job(user_id, job_id, JobStatus::Failed, &results)
            .await?;
        self.db.get_job_with_targets(user_id, job_id).await
    }

    /// Fan the job out to all targets concurrently and collect one result
    /// per target, in target order.
    async fn run_job(&self, loaded: &JobWithTargets) -> Vec<TargetResult> {
        let futures = loaded.targets.iter().map(|target| {
            self.publish_to_target(
                &loaded.job,
                target.position,
                target.account_id.clone(),
            )
        });

        join_all(futures).await
    }

    /// One target's publish attempt. Never errors; every failure mode maps
    /// to a rejected result so one bad target cannot take down the job.
    async fn publish_to_target(
        &self,
        job: &PostJob,
        position: i64,
        account_id: String,
    ) -> TargetResult {
        let account = match self.db.get_social_account(&job.user_id, &account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                return TargetResult::rejected(
                    job.id.clone(),
                    position,
                    account_id,
                    "Account not found".to_string(),
                );
            }
            Err(e) => {
                return TargetResult::rejected(job.id.clone(), position, account_id, e.to_string());
            }
        };

        // Read-only connections are refused before any network call
        let token = match account.page_access_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return TargetResult::rejected(
                    job.id.clone(),
                    position,
                    account_id,
                    MISSING_TOKEN_MESSAGE.to_string(),
                );
            }
        };

        let publisher = self.factory.for_account(&account);
        let request = PublishRequest {
            target_id: account.account_id.clone(),
            media_url: job.media_url.clone(),
            media_type: job.media_type,
            caption: job.caption.clone(),
            publish_at: None,
            access_token: token,
        };

        match publisher.publish(&request).await {
            Ok(post_id) => {
                TargetResult::fulfilled(job.id.clone(), position, account_id, post_id)
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    account_id = %account_id,
                    platform = %publisher.name(),
                    error = %e,
                    "Target publish failed"
                );
                TargetResult::rejected(job.id.clone(), position, account_id, e.to_string())
            }
        }
    }
}

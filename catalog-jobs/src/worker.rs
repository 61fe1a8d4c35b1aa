//! Refresh job worker pool (spec.md §4.6). Claim loop and exponential
//! backoff are grounded in
//! `riptide-persistence::adapters::outbox_publisher::OutboxPublisher`,
//! adapted from "publish an outbox row" to "run a plugin's Loader".

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::JobsConfig;
use catalog_db::RefreshJobRepo;
use catalog_loader::Loader;
use chrono::Utc;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct WorkerPool {
    repo: Arc<RefreshJobRepo>,
    loaders: BTreeMap<String, Arc<Loader>>,
    config: JobsConfig,
    namespace: String,
}

impl WorkerPool {
    pub fn new(
        repo: Arc<RefreshJobRepo>,
        loaders: BTreeMap<String, Arc<Loader>>,
        config: JobsConfig,
        namespace: String,
    ) -> Self {
        Self {
            repo,
            loaders,
            config,
            namespace,
        }
    }

    /// Runs the claim loop until `cancel` fires (spec.md §4.6, §5
    /// cancellation). Only call this on the elected leader replica, or on
    /// every replica when row-locking alone is the chosen concurrency
    /// strategy (SPEC_FULL.md §9). Each claimed job is spawned onto its own
    /// task so the concurrency caps `poll_once` checks actually bound how
    /// much work is in flight, rather than just how often the queue is
    /// polled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(poll_interval = ?self.config.poll_interval, "starting refresh job worker pool");
        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("refresh job worker pool shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "error polling refresh job queue");
                    }
                }
            }
        }
    }

    async fn poll_once(self: &Arc<Self>) -> catalog_core::Result<()> {
        let running_global = self.repo.count_running(None, None).await?;
        if running_global as usize >= self.config.global_concurrency {
            return Ok(());
        }
        let running_ns = self.repo.count_running(Some(&self.namespace), None).await?;
        if running_ns as usize >= self.config.per_namespace_concurrency {
            return Ok(());
        }

        let Some(job) = self.repo.claim_next(&self.namespace).await? else {
            return Ok(());
        };

        let running_plugin = self.repo.count_running(None, Some(&job.plugin_name)).await?;
        if running_plugin as usize > self.config.per_plugin_concurrency {
            // Claimed past the per-plugin cap; give it back immediately.
            self.repo
                .mark_attempt_failed(job.id, "per-plugin concurrency cap reached", u32::MAX, Some(Utc::now()))
                .await?;
            return Ok(());
        }

        let worker = Arc::clone(self);
        let job_id = job.id;
        tokio::spawn(async move {
            if let Err(e) = worker.run_job(job).await {
                error!(job_id = %job_id, error = %e, "error running refresh job");
            }
        });

        Ok(())
    }

    async fn run_job(&self, job: catalog_db::RefreshJob) -> catalog_core::Result<()> {
        let Some(loader) = self.loaders.get(&job.plugin_name) else {
            warn!(plugin = %job.plugin_name, "no loader registered for plugin, failing job");
            self.repo
                .mark_attempt_failed(
                    job.id,
                    &format!("no loader registered for plugin {}", job.plugin_name),
                    self.config.max_attempts,
                    None,
                )
                .await?;
            return Ok(());
        };

        let outcome_error = match &job.source_id {
            Some(source_id) => match loader.reload_source(source_id).await {
                Ok(outcome) => outcome.error,
                Err(e) => Some(e.to_string()),
            },
            None => {
                let outcomes = loader.reload_all().await;
                outcomes.into_iter().find_map(|o| o.error)
            }
        };

        match outcome_error {
            None => {
                self.repo.mark_succeeded(job.id).await?;
            }
            Some(message) => {
                let next_attempt = backoff_deadline(&self.config, job.attempt_count as u32 + 1);
                self.repo
                    .mark_attempt_failed(job.id, &message, self.config.max_attempts, Some(next_attempt))
                    .await?;
            }
        }

        Ok(())
    }
}

/// `base * 2^attempt`, capped at `max_backoff`, with up to 20% jitter —
/// the same shape as `OutboxPublisher::calculate_backoff`.
fn backoff_deadline(config: &JobsConfig, attempt: u32) -> chrono::DateTime<Utc> {
    let exp = config.base_backoff.as_secs_f64() * 2f64.powi(attempt as i32);
    let capped = exp.min(config.max_backoff.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(0.0..0.2) * capped;
    Utc::now() + chrono::Duration::milliseconds(((capped + jitter) * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let config = JobsConfig {
            global_concurrency: 1,
            per_namespace_concurrency: 1,
            per_plugin_concurrency: 1,
            max_attempts: 5,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            refresh_cooldown: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
        };

        let now = Utc::now();
        let small = backoff_deadline(&config, 1);
        let large = backoff_deadline(&config, 10);

        assert!(small > now);
        assert!(large - now <= chrono::Duration::seconds(37));
    }
}

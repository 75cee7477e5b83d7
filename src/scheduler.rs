use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::CycleReport;
use crate::repricer::Repricer;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub completed_cycles: u64,
    pub failed_cycles: u64,
    /// Ticks dropped because the previous cycle was still running.
    pub skipped_ticks: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
    pub uptime_seconds: u64,
}

/// Fires a repricing cycle every `interval_secs`. Ticks never overlap.
pub struct RepricingScheduler {
    scheduler: JobScheduler,
    repricer: Arc<Repricer>,
    stats: Arc<RwLock<SchedulerStats>>,
    config: SchedulerConfig,
    start_time: DateTime<Utc>,
    job_id: Option<Uuid>,
    startup_run: Option<JoinHandle<()>>,
}

impl RepricingScheduler {
    pub async fn new(repricer: Arc<Repricer>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            repricer,
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            config,
            start_time: Utc::now(),
            job_id: None,
            startup_run: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let repricer = Arc::clone(&self.repricer);
        let stats = Arc::clone(&self.stats);

        let job = Job::new_repeated_async(self.config.interval(), move |_uuid, _lock| {
            let repricer = Arc::clone(&repricer);
            let stats = Arc::clone(&stats);

            Box::pin(async move {
                Self::tick(&repricer, &stats).await;
            })
        })?;

        self.job_id = Some(self.scheduler.add(job).await?);
        self.scheduler.start().await?;

        tracing::info!(
            interval_secs = self.config.interval_secs,
            "Repricing scheduler started"
        );

        if self.config.run_on_startup {
            let repricer = Arc::clone(&self.repricer);
            let stats = Arc::clone(&self.stats);
            self.startup_run = Some(tokio::spawn(async move {
                Self::tick(&repricer, &stats).await;
            }));
        }

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(job_id) = self.job_id.take() {
            self.scheduler.remove(&job_id).await?;
        }
        self.scheduler.shutdown().await?;

        if let Some(startup_run) = self.startup_run.take() {
            if let Err(e) = startup_run.await {
                tracing::warn!(error = %e, "Startup repricing run did not finish cleanly");
            }
        }

        tracing::info!("Repricing scheduler shutdown");
        Ok(())
    }

    /// Runs a cycle outside the schedule, waiting for a running one first.
    pub async fn run_now(&self) -> Result<CycleReport> {
        tracing::info!("Running immediate repricing cycle");
        let result = self.repricer.run_cycle().await;
        Self::record(&self.stats, &result).await;
        Ok(result?)
    }

    pub async fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.read().await.clone();
        let uptime = Utc::now().signed_duration_since(self.start_time);
        stats.uptime_seconds = uptime.num_seconds().max(0) as u64;
        stats
    }

    async fn tick(repricer: &Repricer, stats: &RwLock<SchedulerStats>) {
        match repricer.try_run_cycle().await {
            Some(result) => Self::record(stats, &result).await,
            None => {
                tracing::warn!("Previous repricing cycle still running, skipping tick");
                counter!("repricer_scheduler_skipped_ticks_total").increment(1);
                stats.write().await.skipped_ticks += 1;
            }
        }
    }

    async fn record(stats: &RwLock<SchedulerStats>, result: &crate::Result<CycleReport>) {
        let mut stats = stats.write().await;
        stats.last_run = Some(Utc::now());

        match result {
            Ok(report) => {
                stats.completed_cycles += 1;
                stats.last_error = None;
                stats.last_report = Some(report.clone());
            }
            Err(e) => {
                tracing::error!(error = %e, "Repricing cycle failed");
                stats.failed_cycles += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }
}

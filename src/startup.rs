//! Application Startup
//!
//! Relay wiring and the job runner that drives relay ticks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::services::{
    KafkaToMongo, KafkaToMongoConfig, RedisToKafka, RedisToKafkaConfig, RelayService, TickSummary,
};
use crate::config::{SchedulerSettings, Settings};
use crate::infrastructure::cache::{self, RedisOutbox};
use crate::infrastructure::messaging::BrokerTransport;
use crate::infrastructure::metrics;
use crate::infrastructure::repositories::MongoMessageRepository;
use crate::shared::error::RelayError;

/// Exponential backoff between failed job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base: Duration::from_secs(settings.backoff_base_secs),
            max: Duration::from_secs(settings.backoff_max_secs),
        }
    }

    /// `min(base * 2^attempt, max)`, with `attempt` counted from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_secs(60),
            max: Duration::from_secs(300),
        }
    }
}

/// Result of a successful job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Ticks completed in the successful attempt
    pub ticks: u32,
    /// Failed attempts before the successful one
    pub retries: u32,
    pub totals: TickSummary,
}

/// Runs `start`, `ticks` × `process`, `stop` on a relay, retrying the whole
/// run with backoff when a step fails. `stop` runs after every attempt.
pub async fn run_job<R>(relay: &mut R, ticks: u32, policy: &RetryPolicy) -> Result<JobReport, RelayError>
where
    R: RelayService + ?Sized,
{
    let mut attempt = 0;
    loop {
        let outcome = run_once(relay, ticks).await;
        relay.stop().await;

        match outcome {
            Ok((ticks, totals)) => {
                return Ok(JobReport {
                    ticks,
                    retries: attempt,
                    totals,
                })
            }
            Err(err) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(relay = relay.name(), attempt, ?delay, error = %err, "Relay job failed; retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(relay = relay.name(), attempts = attempt + 1, error = %err, "Relay job failed");
                return Err(err);
            }
        }
    }
}

async fn run_once<R>(relay: &mut R, ticks: u32) -> Result<(u32, TickSummary), RelayError>
where
    R: RelayService + ?Sized,
{
    relay.start().await?;

    let mut totals = TickSummary::default();
    for tick in 0..ticks {
        let summary = relay.process().await?;
        totals.handled += summary.handled;
        totals.failed += summary.failed;
        totals.skipped += summary.skipped;
        if summary.is_idle() {
            tracing::trace!(relay = relay.name(), tick, "Idle tick");
        }
    }
    Ok((ticks, totals))
}

/// Application instance
pub struct Application {
    redis_to_kafka: RedisToKafka,
    kafka_to_mongo: KafkaToMongo,
    scheduler: SchedulerSettings,
}

impl Application {
    /// Build the relays from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let redis = cache::create_redis_client(&settings.redis).await?;
        let outbox = Arc::new(RedisOutbox::new(redis, settings.redis.namespace.clone()));

        let repository = Arc::new(MongoMessageRepository::connect(&settings.mongo).await?);
        tracing::info!("MongoDB repository ready");

        let transport = Arc::new(BrokerTransport::kafka(&settings)?);

        let redis_to_kafka = RedisToKafka::new(
            transport.clone(),
            outbox,
            RedisToKafkaConfig::new(
                settings.kafka.topic.clone(),
                settings.redis.scan_count,
                settings.redis.batch_size,
            ),
        );
        let kafka_to_mongo = KafkaToMongo::new(
            transport,
            repository,
            KafkaToMongoConfig::new(
                settings.kafka.topic.clone(),
                settings.consumer.max_records,
                settings.consumer.batch_timeout(),
            ),
        );

        Ok(Self {
            redis_to_kafka,
            kafka_to_mongo,
            scheduler: settings.scheduler,
        })
    }

    /// Run both relays on their schedule until Ctrl-C
    pub async fn run_until_stopped(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = RetryPolicy::from_settings(&self.scheduler);
        let interval = self.scheduler.interval();

        let handles = vec![
            spawn_relay(
                self.redis_to_kafka,
                self.scheduler.max_iterations,
                policy,
                interval,
                shutdown_rx.clone(),
            ),
            spawn_relay(
                self.kafka_to_mongo,
                self.scheduler.max_batches,
                policy,
                interval,
                shutdown_rx,
            ),
        ];

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);

        for handle in handles {
            handle.await?;
        }
        info!("Relays stopped");
        debug!(metrics = %metrics::gather_metrics(), "Final metrics snapshot");
        Ok(())
    }
}

fn spawn_relay<R>(
    mut relay: R,
    ticks: u32,
    policy: RetryPolicy,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    R: RelayService + 'static,
{
    tokio::spawn(async move {
        loop {
            match run_job(&mut relay, ticks, &policy).await {
                Ok(report) => info!(
                    relay = relay.name(),
                    ticks = report.ticks,
                    retries = report.retries,
                    handled = report.totals.handled,
                    failed = report.totals.failed,
                    "Relay job finished"
                ),
                Err(err) => error!(relay = relay.name(), error = %err, "Relay job gave up"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }
    })
}

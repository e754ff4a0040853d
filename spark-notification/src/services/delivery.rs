use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use rand::Rng;

use spark_shared::clients::email::{EmailClient, EmailError};
use spark_shared::types::event::payloads::NotificationJob;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &NotificationJob) -> Result<(), EmailError>;
}

#[async_trait]
impl Mailer for EmailClient {
    async fn send(&self, job: &NotificationJob) -> Result<(), EmailError> {
        self.send_notification(&job.recipient_email, &job.subject, &job.message).await
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Ceiling for the wait before re-queuing after failed attempt `attempt`:
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
    }

    /// A random wait between half the ceiling and the ceiling.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let floor = ceiling / 2;
        if ceiling <= floor {
            return ceiling;
        }
        rand::thread_rng().gen_range(floor..=ceiling)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Delivered,
    Retry { job: NotificationJob, delay: Duration },
    GiveUp,
}

/// Sends one job and decides what happens to it next.
pub async fn process_job<M: Mailer + ?Sized>(
    mailer: &M,
    policy: &RetryPolicy,
    job: NotificationJob,
) -> Disposition {
    match mailer.send(&job).await {
        Ok(()) => {
            counter!("notifications_delivered_total").increment(1);
            tracing::info!(recipient_id = %job.recipient_id, attempt = job.attempt, "notification delivered");
            Disposition::Delivered
        }
        Err(e) if e.is_permanent() || job.attempt >= policy.max_attempts => {
            counter!("notifications_failed_total").increment(1);
            tracing::error!(
                error = %e,
                recipient_id = %job.recipient_id,
                attempt = job.attempt,
                max_attempts = policy.max_attempts,
                "notification dropped"
            );
            Disposition::GiveUp
        }
        Err(e) => {
            let delay = policy.backoff(job.attempt);
            tracing::warn!(
                error = %e,
                recipient_id = %job.recipient_id,
                attempt = job.attempt,
                delay_ms = delay.as_millis() as u64,
                "notification delivery failed, will retry"
            );
            Disposition::Retry { job: job.next_attempt(), delay }
        }
    }
}

use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use spark_shared::types::event::{payloads::NotificationJob, routing_keys, Event};

use crate::services::delivery::{process_job, Disposition};
use crate::AppState;

const SOURCE: &str = "spark-notification";

/// Consumes email jobs until the broker closes the consumer. Each delivery is handled on its own
/// task; the channel prefetch bounds how many are in flight.
pub async fn listen_notification_jobs(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        &state.config.queue_name,
        &[routing_keys::NOTIFICATION_EMAIL_REQUESTED],
        state.config.prefetch,
    ).await?;

    tracing::info!(queue = %state.config.queue_name, "listening for notification jobs");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let state = state.clone();
                tokio::spawn(async move {
                    handle_delivery(&state, delivery).await;
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "notification consumer error");
            }
        }
    }

    tracing::warn!("notification consumer closed");
    Ok(())
}

async fn handle_delivery(state: &AppState, delivery: Delivery) {
    let event = match serde_json::from_slice::<Event<NotificationJob>>(&delivery.data) {
        Ok(event) => event,
        Err(e) => {
            // Malformed payloads can never succeed; drop them.
            tracing::error!(error = %e, "failed to deserialize notification job");
            ack(&delivery).await;
            return;
        }
    };

    let correlation_id = event.correlation_id.unwrap_or(event.id);

    match process_job(&state.email, &state.policy, event.data).await {
        Disposition::Delivered | Disposition::GiveUp => ack(&delivery).await,
        Disposition::Retry { job, delay } => {
            tokio::time::sleep(delay).await;

            let mut retry = Event::new(SOURCE, routing_keys::NOTIFICATION_EMAIL_REQUESTED, job)
                .with_correlation(correlation_id);
            retry.user_id = event.user_id;

            match state.rabbitmq.publish(routing_keys::NOTIFICATION_EMAIL_REQUESTED, &retry).await {
                Ok(()) => ack(&delivery).await,
                Err(e) => {
                    tracing::error!(error = %e, "failed to re-queue notification job, returning it to the broker");
                    if let Err(e) = delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await {
                        tracing::error!(error = %e, "failed to nack notification delivery");
                    }
                }
            }
        }
    }
}

async fn ack(delivery: &Delivery) {
    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
        tracing::error!(error = %e, "failed to ack notification delivery");
    }
}

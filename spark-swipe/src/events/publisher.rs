use metrics::counter;

use spark_shared::clients::rabbitmq::RabbitMQClient;
use spark_shared::types::event::{payloads::NotificationJob, routing_keys, Event};

/// Hands a notification job to the broker. Failures are logged and counted; the match that
/// triggered the job is already committed and stays that way.
pub async fn publish_notification(rabbitmq: &RabbitMQClient, job: NotificationJob) -> bool {
    let recipient_id = job.recipient_id;
    let event = Event::new(
        "spark-swipe",
        routing_keys::NOTIFICATION_EMAIL_REQUESTED,
        job,
    )
    .with_user(recipient_id);

    match rabbitmq
        .publish(routing_keys::NOTIFICATION_EMAIL_REQUESTED, &event)
        .await
    {
        Ok(()) => {
            tracing::debug!(recipient_id = %recipient_id, event_id = %event.id, "notification enqueued");
            true
        }
        Err(e) => {
            counter!("match_notifications_failed_total").increment(1);
            tracing::error!(error = %e, recipient_id = %recipient_id, "failed to enqueue notification");
            false
        }
    }
}

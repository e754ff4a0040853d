use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ envelope wrapping every message published on the `spark.events` exchange.
///
/// Routing key format: `spark.{domain}.{entity}.{action}`
/// Example: `spark.notification.email.requested`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const NOTIFICATION_EMAIL_REQUESTED: &str = "spark.notification.email.requested";
}

pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    /// A unit of work for the notification service. `attempt` starts at 1 and is bumped
    /// every time a failed delivery is re-queued.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct NotificationJob {
        pub recipient_id: Uuid,
        pub recipient_email: String,
        pub subject: String,
        pub message: String,
        #[serde(default = "first_attempt")]
        pub attempt: u32,
    }

    fn first_attempt() -> u32 {
        1
    }

    impl NotificationJob {
        pub fn new(
            recipient_id: Uuid,
            recipient_email: impl Into<String>,
            subject: impl Into<String>,
            message: impl Into<String>,
        ) -> Self {
            Self {
                recipient_id,
                recipient_email: recipient_email.into(),
                subject: subject.into(),
                message: message.into(),
                attempt: first_attempt(),
            }
        }

        pub fn next_attempt(&self) -> Self {
            Self {
                attempt: self.attempt + 1,
                ..self.clone()
            }
        }
    }
}

use futures::StreamExt;
use models::{Id, ProgressEvent};
use redis::AsyncCommands;
use std::time::Duration;

/// Global fanout topic carrying terminal job events and schedule runs.
pub const GLOBAL_TOPIC: &str = "events:global";

/// Control topic carrying best-effort task revoke signals to workers.
pub const CONTROL_TOPIC: &str = "jobs:control";

/// Per-job progress topic.
pub fn job_topic(job_id: Id) -> String {
    format!("job:{job_id}")
}

/// Process-singleton handle to the message bus. Publishes share one managed
/// connection; each subscription owns a dedicated pub/sub connection.
///
/// The bus is ephemeral by contract: delivery is at-most-once and publish
/// failures are logged at debug level and swallowed; a job must never fail
/// because Redis is down.
#[derive(Clone)]
pub struct EventBus {
    client: redis::Client,
    publisher: redis::aio::ConnectionManager,
}

impl EventBus {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let publisher = redis::aio::ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, publisher })
    }

    async fn publish(&self, topic: &str, payload: String) {
        let mut conn = self.publisher.clone();
        if let Err(error) = conn.publish::<_, _, ()>(topic, payload).await {
            tracing::debug!(%topic, %error, "event publish skipped, bus unavailable");
        }
    }

    /// Publish a progress event on `job:{id}`. Terminal statuses fan out an
    /// additional `{type: "job_{status}"}` message on the global topic.
    pub async fn publish_progress(&self, event: &ProgressEvent) {
        let Ok(payload) = serde_json::to_string(event) else {
            return;
        };
        self.publish(&job_topic(event.job_id), payload).await;

        if event.status.is_terminal() {
            let global = serde_json::json!({
                "type": format!("job_{}", event.status),
                "job_id": event.job_id,
                "message": event.message,
            });
            self.publish(GLOBAL_TOPIC, global.to_string()).await;
        }
    }

    /// Broadcast a job-log line to the job's live listeners.
    pub async fn publish_log(&self, job_id: Id, level: &str, message: &str) {
        let payload = serde_json::json!({
            "type": "log",
            "job_id": job_id,
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now(),
        });
        self.publish(&job_topic(job_id), payload.to_string()).await;
    }

    pub async fn publish_global(&self, payload: serde_json::Value) {
        self.publish(GLOBAL_TOPIC, payload.to_string()).await;
    }

    /// Best-effort revoke for a dispatched task; the worker holding it will
    /// cancel cooperatively if the signal arrives in time.
    pub async fn publish_revoke(&self, task_id: uuid::Uuid) {
        let payload = serde_json::json!({ "revoke": task_id });
        self.publish(CONTROL_TOPIC, payload.to_string()).await;
    }

    /// Subscribe to one topic with a dedicated connection.
    pub async fn subscribe(&self, topic: &str) -> redis::RedisResult<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;
        Ok(Subscription { pubsub })
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> redis::RedisResult<()> {
        let mut conn = self.publisher.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// A single-topic subscription. Dropping it tears down the underlying
/// connection, which is how unsubscription happens.
pub struct Subscription {
    pubsub: redis::aio::PubSub,
}

impl Subscription {
    /// Wait up to `timeout` for the next message payload; None on timeout or
    /// on an unreadable payload.
    pub async fn next_message(&mut self, timeout: Duration) -> Option<String> {
        let mut stream = self.pubsub.on_message();
        match tokio::time::timeout(timeout, stream.next()).await {
            Ok(Some(message)) => message.get_payload().ok(),
            Ok(None) | Err(_) => None,
        }
    }

    /// Block until the next message; None once the connection is gone.
    pub async fn recv(&mut self) -> Option<String> {
        let mut stream = self.pubsub.on_message();
        stream.next().await.and_then(|m| m.get_payload().ok())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn job_topic_format() {
        let id: Id = "a3bb189e-8bf9-3888-9912-ace4e6543002".parse().unwrap();
        assert_eq!(
            job_topic(id),
            "job:a3bb189e-8bf9-3888-9912-ace4e6543002"
        );
    }
}

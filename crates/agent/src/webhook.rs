//! Outbound webhook notifications, driven by the optional `webhook_url`
//! setting. Failures are logged and never affect the job.

use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn send(pool: &sqlx::PgPool, message: &str) {
    let settings = catalog::settings::load(pool).await;
    let Some(url) = settings.webhook_url else {
        return;
    };

    let client = match reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            tracing::warn!(%error, "webhook client construction failed");
            return;
        }
    };

    let result = client
        .post(&url)
        .json(&serde_json::json!({ "content": message }))
        .send()
        .await
        .and_then(|response| response.error_for_status());

    if let Err(error) = result {
        tracing::warn!(%error, "webhook notification failed");
    }
}

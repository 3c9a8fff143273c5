//! Live events bridge: pub/sub subscriptions fanned out to WebSocket
//! clients. The bridge is a pure forwarder; producers own topic semantics.

use crate::App;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use futures::{SinkExt, StreamExt};
use models::Id;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Poll granularity on the pub/sub subscription.
const SUBSCRIPTION_POLL: Duration = Duration::from_millis(500);

/// Application close codes, mirrored by the web client.
const CLOSE_UNAUTHORIZED: u16 = 4401;
const CLOSE_TOO_MANY_CONNECTIONS: u16 = 4429;

pub fn router() -> Router<Arc<App>> {
    Router::new()
        .route("/ws/jobs/{job_id}", any(job_socket))
        .route("/ws/events", any(events_socket))
        .route("/ws/status", any(status_socket))
}

#[derive(Debug, serde::Deserialize, Default)]
struct WsAuth {
    api_key: Option<String>,
}

fn authenticated(app: &App, auth: &WsAuth, headers: &HeaderMap) -> bool {
    let Some(expected) = app.api_key.as_deref() else {
        return true;
    };
    let presented = auth
        .api_key
        .as_deref()
        .or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
        .unwrap_or("");
    presented == expected
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

enum Stream {
    /// Forward one job's topic; ends on the first terminal event.
    Job(Id),
    /// Forward the global events topic.
    Global,
    /// Heartbeat only.
    Status,
}

/// WebSocket endpoint for real-time job progress.
async fn job_socket(
    State(app): State<Arc<App>>,
    Path(job_id): Path<Id>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(auth): Query<WsAuth>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authed = authenticated(&app, &auth, &headers);
    ws.on_upgrade(move |socket| serve(app, socket, addr.ip(), authed, Stream::Job(job_id)))
}

/// WebSocket for global events: terminal jobs, schedule runs.
async fn events_socket(
    State(app): State<Arc<App>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(auth): Query<WsAuth>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authed = authenticated(&app, &auth, &headers);
    ws.on_upgrade(move |socket| serve(app, socket, addr.ip(), authed, Stream::Global))
}

/// Lightweight heartbeat socket used by connection indicators.
async fn status_socket(
    State(app): State<Arc<App>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(auth): Query<WsAuth>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authed = authenticated(&app, &auth, &headers);
    ws.on_upgrade(move |socket| serve(app, socket, addr.ip(), authed, Stream::Status))
}

fn is_terminal_event(value: &serde_json::Value) -> bool {
    matches!(
        value.get("status").and_then(|s| s.as_str()),
        Some("completed") | Some("completed_partial") | Some("failed") | Some("cancelled")
    )
}

async fn serve(app: Arc<App>, socket: WebSocket, ip: IpAddr, authed: bool, stream: Stream) {
    if !authed {
        close_with(socket, CLOSE_UNAUTHORIZED, "Invalid or missing API key").await;
        return;
    }
    if !app.ws_connect(ip) {
        close_with(socket, CLOSE_TOO_MANY_CONNECTIONS, "Too many connections").await;
        return;
    }

    // Dropping the subscription at the end of this function is what
    // unsubscribes; each subscription owns its connection.
    let subscription = match &stream {
        Stream::Job(job_id) => match app.bus.subscribe(&events::job_topic(*job_id)).await {
            Ok(subscription) => Some(subscription),
            Err(error) => {
                tracing::debug!(%error, "pub/sub subscribe failed, closing socket");
                app.ws_disconnect(ip);
                return;
            }
        },
        Stream::Global => match app.bus.subscribe(events::GLOBAL_TOPIC).await {
            Ok(subscription) => Some(subscription),
            Err(error) => {
                tracing::debug!(%error, "pub/sub subscribe failed, closing socket");
                app.ws_disconnect(ip);
                return;
            }
        },
        Stream::Status => None,
    };

    run_loops(socket, &stream, subscription).await;
    app.ws_disconnect(ip);
}

/// The reader/writer/pinger race: client messages are read and discarded
/// until disconnect, pub/sub payloads are forwarded, and a ping goes out
/// every 30 s. Any loop ending tears the others down.
async fn run_loops(
    socket: WebSocket,
    stream: &Stream,
    mut subscription: Option<events::Subscription>,
) {
    let (mut sender, mut receiver) = socket.split();

    let connected = match stream {
        Stream::Job(job_id) => serde_json::json!({ "type": "connected", "job_id": job_id }),
        _ => serde_json::json!({ "type": "connected" }),
    };
    if sender
        .send(Message::Text(connected.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping.reset();

    loop {
        tokio::select! {
            // Reader: the client disconnecting is the ground-truth signal.
            received = receiver.next() => {
                match received {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {} // Discard client messages.
                }
            }
            // Pinger.
            _ = ping.tick() => {
                let ping_frame = serde_json::json!({ "type": "ping" }).to_string();
                if sender.send(Message::Text(ping_frame.into())).await.is_err() {
                    return;
                }
            }
            // Writer: forward parseable JSON; exit after the first terminal
            // status. The bridge never invents events.
            payload = poll_subscription(&mut subscription) => {
                let Some(payload) = payload else { continue };
                let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&payload) else {
                    continue;
                };
                if let Some(object) = value.as_object_mut() {
                    object
                        .entry("type")
                        .or_insert_with(|| serde_json::Value::String("progress".to_string()));
                }
                if sender.send(Message::Text(value.to_string().into())).await.is_err() {
                    return;
                }
                if is_terminal_event(&value) {
                    return;
                }
            }
        }
    }
}

async fn poll_subscription(subscription: &mut Option<events::Subscription>) -> Option<String> {
    match subscription {
        Some(subscription) => subscription.next_message(SUBSCRIPTION_POLL).await,
        // Heartbeat-only sockets never produce payloads.
        None => {
            futures::future::pending::<()>().await;
            unreachable!()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn terminal_detection_covers_all_terminal_statuses() {
        for status in ["completed", "completed_partial", "failed", "cancelled"] {
            let value = serde_json::json!({ "status": status });
            assert!(is_terminal_event(&value), "{status} should be terminal");
        }
        assert!(!is_terminal_event(&serde_json::json!({ "status": "processing" })));
        assert!(!is_terminal_event(&serde_json::json!({ "type": "log" })));
    }
}

//! Display connections: drain a private delivery queue onto the socket.
//!
//! Each display gets its own [`Subscriber`] and bounded queue. The hub
//! fills the queue; this adapter is the only reader. A display that stops
//! accepting writes is unregistered by its own adapter, never by the hub.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use laptrack_core::{HubHandle, Subscriber, TeamDirectory};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::state::{AppState, DisplaySettings};

/// Why a display connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayExit {
    /// The hub was not running when the display connected.
    HubUnavailable,
    /// The hub shut down and closed the delivery queue.
    HubClosed,
    /// The viewer closed the connection or the inbound half failed.
    Disconnected,
    /// A frame write returned an error.
    WriteFailed,
    /// A frame write did not finish within the write timeout.
    WriteTimedOut,
}

/// Upgrade a display connection.
///
/// # Route
///
/// `GET /notify`
pub async fn ws_notify<D: TeamDirectory>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<D>>>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let settings = state.display;
    ws.on_failed_upgrade(|e| warn!(error = %e, "display upgrade failed"))
        .on_upgrade(move |socket| async move {
            let (writer, reader) = socket.split();
            run_notification_sink(writer, reader, hub, settings).await;
        })
}

/// Register with the hub and forward every queued notification as a JSON
/// text frame until the display or the hub goes away.
///
/// Every write (including pongs) is bounded by
/// [`DisplaySettings::write_timeout`]. On any exit other than the hub
/// closing the queue, the subscriber is unregistered before returning.
pub async fn run_notification_sink<W, R, E>(
    mut writer: W,
    mut reader: R,
    hub: HubHandle,
    settings: DisplaySettings,
) -> DisplayExit
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (subscriber, mut queue) = Subscriber::channel(settings.queue_capacity);
    let id = subscriber.id();
    if hub.register(subscriber).await.is_err() {
        warn!(subscriber = %id, "broadcast hub is not running, refusing display");
        let _ = timeout(settings.write_timeout, writer.close()).await;
        return DisplayExit::HubUnavailable;
    }
    info!(subscriber = %id, "display registered");

    let exit = loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(notification) = next else {
                    break DisplayExit::HubClosed;
                };
                let json = match serde_json::to_string(&*notification) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(subscriber = %id, error = %e, "failed to encode notification");
                        continue;
                    }
                };
                if let Err(exit) = write_frame(&mut writer, Message::Text(json.into()), settings.write_timeout).await {
                    break exit;
                }
            }
            inbound = reader.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break DisplayExit::Disconnected,
                Some(Ok(Message::Ping(data))) => {
                    if let Err(exit) = write_frame(&mut writer, Message::Pong(data), settings.write_timeout).await {
                        break exit;
                    }
                }
                Some(Err(e)) => {
                    debug!(subscriber = %id, error = %e, "display read failed");
                    break DisplayExit::Disconnected;
                }
                // Viewers have nothing to say.
                Some(Ok(_)) => {}
            },
        }
    };

    if exit != DisplayExit::HubClosed && hub.unregister(id).await.is_err() {
        debug!(subscriber = %id, "hub already gone at unregister");
    }
    let _ = timeout(settings.write_timeout, writer.close()).await;
    info!(subscriber = %id, reason = ?exit, "display disconnected");
    exit
}

async fn write_frame<W>(writer: &mut W, frame: Message, limit: Duration) -> Result<(), DisplayExit>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match timeout(limit, writer.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "display write failed");
            Err(DisplayExit::WriteFailed)
        }
        Err(_) => {
            warn!(timeout_ms = limit.as_millis(), "display write timed out");
            Err(DisplayExit::WriteTimedOut)
        }
    }
}

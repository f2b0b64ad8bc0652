//! Reader connections: decode tag ids and feed the ingestion channel.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Stream, StreamExt};
use laptrack_core::TeamDirectory;
use laptrack_types::TagId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// What a reader connection did before it ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderSummary {
    /// Tag ids handed to the ingestion channel.
    pub accepted: u64,
    /// Frames that did not parse as a tag id.
    pub malformed: u64,
}

/// Upgrade a reader connection.
///
/// # Route
///
/// `GET /laps`
pub async fn ws_laps<D: TeamDirectory>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<D>>>,
) -> impl IntoResponse {
    let tags = state.tags.clone();
    ws.on_failed_upgrade(|e| warn!(error = %e, "reader upgrade failed"))
        .on_upgrade(move |socket| async move {
            run_tag_source(socket, tags).await;
        })
}

/// Read frames until the reader goes away, pushing every well-formed tag
/// id into `tags`.
///
/// Text frames and UTF-8 binary frames are parsed as decimal integers
/// after trimming whitespace. Anything else that fails to parse is logged
/// and skipped. The send into `tags` waits when the channel is full, which
/// is the only backpressure a reader sees. The loop ends on a close frame,
/// a transport error, or when the ingestion channel has no receiver left.
pub async fn run_tag_source<S, E>(mut frames: S, tags: mpsc::Sender<TagId>) -> ReaderSummary
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    info!("reader connected");
    let mut summary = ReaderSummary::default();

    while let Some(frame) = frames.next().await {
        let parsed = match &frame {
            Ok(Message::Text(text)) => text.as_str().parse::<TagId>(),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(bytes) {
                Ok(text) => text.parse::<TagId>(),
                Err(e) => {
                    warn!(error = %e, len = bytes.len(), "binary tag frame is not UTF-8");
                    summary.malformed = summary.malformed.saturating_add(1);
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            // Ping/pong are answered by the socket layer.
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "reader read failed");
                break;
            }
        };

        match parsed {
            Ok(tag_id) => {
                if tags.send(tag_id).await.is_err() {
                    warn!(%tag_id, "lap ingestion is not running, closing reader");
                    break;
                }
                summary.accepted = summary.accepted.saturating_add(1);
            }
            Err(e) => {
                warn!(error = %e, "ignoring malformed tag frame");
                summary.malformed = summary.malformed.saturating_add(1);
            }
        }
    }

    info!(
        accepted = summary.accepted,
        malformed = summary.malformed,
        "reader disconnected"
    );
    summary
}

//! Client session: one read loop and one write loop per connection.
//!
//! Lifecycle is `Connecting → Active → Closing → Closed`:
//!
//! - **Connecting**: a [`SessionHandle`] is created and registered in the
//!   [`crate::domain::Hub`], closing any previous session of the user.
//! - **Active**: the read loop decodes inbound frames and runs each one
//!   through the [`DeliveryService`]; a spawned write loop drains the
//!   outbound queue to the transport in FIFO order.
//! - **Closing / Closed**: either loop exiting, or a replacement, flips the
//!   shutdown flag. The read loop then releases the hub entry and waits for
//!   the write loop to close the transport.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message as WsMessage};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};

use super::messages::{InboundFrame, OutboundFrame};
use crate::domain::{Message, SessionHandle, SessionState, UserId};
use crate::service::DeliveryService;

/// Close code sent to a session evicted by a newer connection.
pub const CLOSE_REPLACED: u16 = 4000;
/// Close code for an ordinary shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Upper bound on sending the close frame to the peer.
const CLOSE_GRACE: Duration = Duration::from_secs(1);
/// Upper bound on waiting for the write loop during teardown.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Runs a session for `user_id` over an already-upgraded transport until
/// the peer disconnects, a frame fails to decode, a write fails, or a newer
/// session of the same user replaces it.
///
/// `sink` and `stream` are the two halves of the transport; the write loop
/// takes exclusive ownership of `sink`.
pub async fn run_session<S, R, E>(
    sink: S,
    stream: R,
    user_id: UserId,
    delivery: Arc<DeliveryService>,
    queue_capacity: usize,
) where
    S: Sink<WsMessage> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let (handle, outbound) = SessionHandle::new(user_id, queue_capacity);
    let handle = Arc::new(handle);
    let hub = Arc::clone(delivery.hub());

    hub.register(Arc::clone(&handle)).await;
    handle.advance(SessionState::Active);
    tracing::info!(
        user_id = %handle.user_id(),
        connection_id = %handle.connection_id(),
        "session active"
    );

    let mut writer = tokio::spawn(write_loop(sink, outbound, Arc::clone(&handle)));

    read_loop(stream, &handle, &delivery).await;

    // Teardown runs only here, once per session.
    handle.close();
    hub.release(handle.user_id(), handle.connection_id()).await;
    match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "session writer task failed"),
        Err(_) => {
            tracing::warn!(
                connection_id = %handle.connection_id(),
                "session writer did not stop, aborting"
            );
            writer.abort();
        }
    }
    handle.advance(SessionState::Closed);
    tracing::info!(
        user_id = %handle.user_id(),
        connection_id = %handle.connection_id(),
        replaced = handle.was_replaced(),
        "session closed"
    );
}

/// Resolves once the shutdown flag is set (or its sender is gone).
async fn shutdown_requested(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|closed| *closed).await;
}

async fn read_loop<R, E>(mut stream: R, handle: &SessionHandle, delivery: &DeliveryService)
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let mut shutdown = handle.shutdown_signal();
    loop {
        tokio::select! {
            frame = stream.next() => {
                let keep_going = match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(text.as_str().as_bytes(), handle, delivery).await
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        handle_frame(bytes.as_ref(), handle, delivery).await
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => true,
                    Some(Ok(WsMessage::Close(_))) | None => false,
                    Some(Err(e)) => {
                        tracing::debug!(
                            connection_id = %handle.connection_id(),
                            error = %e,
                            "transport read failed"
                        );
                        false
                    }
                };
                if !keep_going {
                    break;
                }
            }
            () = shutdown_requested(&mut shutdown) => break,
        }
    }
}

/// Decodes one inbound frame and runs it through the pipeline.
///
/// Returns `false` when the frame cannot be decoded, which ends the
/// session. Pipeline failures are logged and the loop continues.
async fn handle_frame(raw: &[u8], handle: &SessionHandle, delivery: &DeliveryService) -> bool {
    let frame = match serde_json::from_slice::<InboundFrame>(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(
                connection_id = %handle.connection_id(),
                error = %e,
                "malformed inbound frame, closing session"
            );
            return false;
        }
    };

    if let Err(e) = delivery
        .send(handle.user_id(), &frame.receiver_number, frame.message)
        .await
    {
        tracing::warn!(
            user_id = %handle.user_id(),
            receiver_number = %frame.receiver_number,
            error = %e,
            "socket send failed"
        );
    }
    true
}

async fn write_loop<S>(mut sink: S, mut outbound: mpsc::Receiver<Message>, handle: Arc<SessionHandle>)
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let mut shutdown = handle.shutdown_signal();
    let mut transport_failed = false;
    loop {
        tokio::select! {
            biased;
            queued = outbound.recv() => {
                let Some(message) = queued else { break };
                let json = match serde_json::to_string(&OutboundFrame::from(&message)) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(message_id = %message.id, error = %e, "frame encoding failed");
                        continue;
                    }
                };
                // A peer that stops reading must not hold the loop past shutdown.
                let written = tokio::select! {
                    biased;
                    () = shutdown_requested(&mut shutdown) => break,
                    written = sink.send(WsMessage::text(json)) => written,
                };
                if let Err(e) = written {
                    tracing::debug!(
                        connection_id = %handle.connection_id(),
                        error = %e,
                        "transport write failed"
                    );
                    transport_failed = true;
                    break;
                }
            }
            () = shutdown_requested(&mut shutdown) => break,
        }
    }

    // Wake the read loop if the write side ended first.
    handle.close();
    if transport_failed {
        return;
    }

    let (code, reason) = if handle.was_replaced() {
        (CLOSE_REPLACED, "session replaced")
    } else {
        (CLOSE_NORMAL, "closing")
    };
    let farewell = async {
        let _ = sink
            .send(WsMessage::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await;
        let _ = sink.close().await;
    };
    if tokio::time::timeout(CLOSE_GRACE, farewell).await.is_err() {
        tracing::debug!(
            connection_id = %handle.connection_id(),
            "close frame not flushed in time"
        );
    }
}

//! Driver streams with a guaranteed terminal value.
//!
//! A plain channel simply ends when the sender goes away. Task runners need
//! to tell "the driver crashed" from "nothing more to say", so every driver
//! stream is forwarded through a pump that substitutes a value carrying
//! [`DriverError::ChannelClosed`] when the driver closes its side without
//! having sent a terminal value. The consumer then observes the end of the
//! stream on the following read.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use taskdriver_core::{DriverError, StreamItem};

/// Buffered values between the pump and the consumer.
const STREAM_BUFFER: usize = 8;

/// Consumer side of a driver stream.
///
/// Cancelling the token (or dropping the stream) stops delivery right away
/// and releases the driver's side of the channel.
pub struct DriverStream<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T: StreamItem> DriverStream<T> {
    /// Forward `upstream` on its own task, applying the closure rules.
    ///
    /// `cancel` should be dedicated to this stream; it is cancelled on drop.
    pub fn forward(
        upstream: mpsc::Receiver<T>,
        cancel: CancellationToken,
        name: &'static str,
    ) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(pump(upstream, tx, cancel.clone(), name));
        Self { rx, cancel }
    }

    /// Receive the next value, or `None` once the stream ended or was cancelled.
    pub async fn recv(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }
}

impl<T> DriverStream<T> {
    /// Stop the stream. No further values are delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the stream was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Drop for DriverStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T: StreamItem> Stream for DriverStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Move values from the driver to the consumer until a terminal value,
/// closure or cancellation.
async fn pump<T: StreamItem>(
    mut upstream: mpsc::Receiver<T>,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
    name: &'static str,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(stream = name, "Stream cancelled");
                return;
            }
            next = upstream.recv() => next,
        };

        let (item, last) = match next {
            Some(item) => {
                let last = item.is_terminal();
                (item, last)
            }
            None => {
                warn!(stream = name, "Driver closed stream without a terminal value");
                (T::from_error(DriverError::ChannelClosed), true)
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(stream = name, "Stream cancelled");
                return;
            }
            sent = tx.send(item) => {
                if sent.is_err() {
                    debug!(stream = name, "Stream consumer dropped");
                    return;
                }
            }
        }

        if last {
            return;
        }
    }
}

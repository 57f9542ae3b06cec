//! Chunked media streaming.
//!
//! Decrypted audio is sent as fixed-size chunks through a bounded
//! channel, with the pacer deciding the sleep between chunks. A dropped
//! receiver means the client went away; the producer stops quietly.

use crate::throttle::{DeliveryConfig, DeliveryMode, Pacer};
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

/// Chunks buffered ahead of the client.
const CHANNEL_DEPTH: usize = 4;

/// Streams a decrypted buffer as paced chunks.
///
/// The returned stream yields `Result<Bytes, io::Error>` items and plugs
/// straight into an HTTP body. Errors are never produced; the item type
/// exists for the body contract.
pub fn stream_chunks(
    data: Vec<u8>,
    config: &DeliveryConfig,
    mode: DeliveryMode,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send {
    let chunk_size = config.chunk_size.max(1);
    let mut pacer = Pacer::new(config, mode);
    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);

    tokio::spawn(async move {
        let total = data.len();
        let started = Instant::now();
        for chunk in data.chunks(chunk_size) {
            if tx.send(Bytes::copy_from_slice(chunk)).await.is_err() {
                debug!(
                    sent = pacer.bytes_sent(),
                    total, "client disconnected mid-stream"
                );
                return;
            }
            pacer.record(chunk.len());
            let delay = pacer.next_delay(started.elapsed());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        debug!(
            sent = pacer.bytes_sent(),
            mode = mode.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stream complete"
        );
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok(chunk), rx))
    })
}

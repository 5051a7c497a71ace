//! Typed view over a store subscription.

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::document::Document;

/// Converts a raw document into a domain value; `None` skips the document.
pub type Decoder<T> = fn(&Document) -> Option<T>;

/// A live query result decoded into `T`.
///
/// Dropping the `LiveQuery` ends the subscription.
pub struct LiveQuery<T> {
    rx: watch::Receiver<Vec<Document>>,
    decode: Decoder<T>,
}

impl<T> LiveQuery<T> {
    pub fn new(rx: watch::Receiver<Vec<Document>>, decode: Decoder<T>) -> Self {
        Self { rx, decode }
    }

    /// The latest snapshot, without marking it as seen.
    pub fn current(&self) -> Vec<T> {
        decode_all(&self.rx.borrow(), self.decode)
    }

    /// The latest snapshot if one arrived since the last call.
    pub fn take_pending(&mut self) -> Option<Vec<T>> {
        match self.rx.has_changed() {
            Ok(true) => Some(decode_all(&self.rx.borrow_and_update(), self.decode)),
            _ => None,
        }
    }

    /// Wait for the next snapshot. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Vec<T>> {
        self.rx.changed().await.ok()?;
        Some(decode_all(&self.rx.borrow_and_update(), self.decode))
    }
}

impl<T: 'static> LiveQuery<T> {
    /// Stream of snapshots, starting with the current one.
    pub fn into_stream(self) -> impl Stream<Item = Vec<T>> {
        let decode = self.decode;
        WatchStream::new(self.rx).map(move |docs| decode_all(&docs, decode))
    }
}

fn decode_all<T>(docs: &[Document], decode: Decoder<T>) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| {
            let value = decode(doc);
            if value.is_none() {
                debug!(id = %doc.id, "Skipping undecodable document");
            }
            value
        })
        .collect()
}

//! Output channels for collected records and errors.
//!
//! Collection writes into a [`RecordSink`]; the consumer drains the matching
//! [`RecordStream`]. Both channels are bounded, so a consumer that stops
//! draining eventually blocks the producers. A sink can be cloned to fan in
//! results from many nodes polled concurrently.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::types::MetricRecord;

/// Default capacity of each channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Create a connected sink/stream pair with `capacity` slots per channel.
pub fn channel(capacity: usize) -> (RecordSink, RecordStream) {
    let (records_tx, records_rx) = mpsc::channel(capacity);
    let (errors_tx, errors_rx) = mpsc::channel(capacity);

    (
        RecordSink {
            records: records_tx,
            errors: errors_tx,
        },
        RecordStream {
            records: records_rx,
            errors: errors_rx,
        },
    )
}

/// The record receiver was dropped; the undelivered record is returned.
#[derive(Debug, Error)]
#[error("record sink closed")]
pub struct SinkClosed(pub MetricRecord);

/// Producer half: where records and errors are sent.
#[derive(Debug, Clone)]
pub struct RecordSink {
    records: mpsc::Sender<MetricRecord>,
    errors: mpsc::Sender<ClientError>,
}

impl RecordSink {
    /// Send one record, waiting for capacity.
    ///
    /// Fails when the record receiver is gone.
    pub async fn emit(&self, record: MetricRecord) -> Result<(), SinkClosed> {
        self.records.send(record).await.map_err(|e| SinkClosed(e.0))
    }

    /// Report an error.
    ///
    /// Reports to a closed error channel are logged and dropped.
    pub async fn report(&self, error: ClientError) {
        if let Err(e) = self.errors.send(error).await {
            tracing::warn!(error = %e.0, "Error sink closed, dropping error");
        }
    }

    /// Whether the record receiver is gone.
    pub fn is_closed(&self) -> bool {
        self.records.is_closed()
    }
}

/// Consumer half: the two streams to drain.
#[derive(Debug)]
pub struct RecordStream {
    /// Successfully collected records.
    pub records: mpsc::Receiver<MetricRecord>,
    /// Collection failures.
    pub errors: mpsc::Receiver<ClientError>,
}

impl RecordStream {
    /// Split into the record and error receivers.
    pub fn split(self) -> (mpsc::Receiver<MetricRecord>, mpsc::Receiver<ClientError>) {
        (self.records, self.errors)
    }
}

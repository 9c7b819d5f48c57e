//! Munin node client library.
//!
//! This crate implements the client side of the Munin node protocol. It can be
//! used as a library, or run as the standalone `munin-poll` binary that polls
//! a set of nodes and prints their values as JSON lines.
//!
//! # Architecture
//!
//! - **Protocol**: line and multiline-block framing, commands, reply parsing
//! - **Client**: connection lifecycle, plugin enumeration and fetching
//! - **Sink**: bounded record and error channels between producer and consumer
//! - **Collector**: scheduled per-node polling with a cycle deadline
//! - **Config**: YAML description of the nodes to poll
//!
//! # Example
//!
//! ```rust,no_run
//! use munin_client::{MuninClient, NodeEndpoint, sink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (sink, mut stream) = sink::channel(256);
//!     let mut client = MuninClient::new(NodeEndpoint::new("localhost", 4949));
//!     client.connect().await?;
//!
//!     let collection = tokio::spawn(async move {
//!         let summary = client.fetch_all(&sink).await;
//!         let _ = client.close().await;
//!         summary
//!     });
//!
//!     while let Some(record) = stream.records.recv().await {
//!         println!("{} {} = {}", record.name, record.metric_type, record.value);
//!     }
//!     let summary = collection.await?;
//!     println!("{} plugins, {} failures", summary.plugins, summary.failures);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sink;
pub mod types;

pub use client::{CollectionSummary, MuninClient};
pub use collector::{NodeCollector, NodeConfig};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use protocol::ReadMode;
pub use sink::{RecordSink, RecordStream};
pub use types::{DEFAULT_PORT, MetricRecord, MetricType, NodeEndpoint};

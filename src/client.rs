//! Munin node client.
//!
//! [`MuninClient`] owns at most one connection to a node and issues strictly
//! paired request/response commands on it. Every command method takes
//! `&mut self`, so commands can never overlap on one connection.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::{ClientError, ClientResult};
use crate::protocol::parse::{self, FetchLine};
use crate::protocol::{Command, LineReader, ReadError, ReadMode};
use crate::sink::RecordSink;
use crate::types::{MetricRecord, NodeEndpoint};

/// Outcome of one [`MuninClient::fetch_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Plugins enumerated.
    pub plugins: usize,
    /// Records emitted across all plugins.
    pub records: usize,
    /// Plugins whose fetch failed, plus a failed enumeration.
    pub failures: usize,
}

struct Connection {
    reader: LineReader<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn send(&mut self, command: Command<'_>) -> std::io::Result<()> {
        self.writer.write_all(command.to_wire().as_bytes()).await?;
        self.writer.flush().await
    }
}

/// Client for a single Munin node.
pub struct MuninClient {
    endpoint: NodeEndpoint,
    node: String,
    read_mode: ReadMode,
    connect_timeout: Option<Duration>,
    conn: Option<Connection>,
    banner: Option<String>,
}

impl MuninClient {
    /// Create a disconnected client for `endpoint`.
    pub fn new(endpoint: NodeEndpoint) -> Self {
        let node = endpoint.to_string();
        Self {
            endpoint,
            node,
            read_mode: ReadMode::default(),
            connect_timeout: None,
            conn: None,
            banner: None,
        }
    }

    /// Set how a block cut short by a clean stream close is treated.
    pub fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    /// Bound the TCP dial in [`connect`](Self::connect).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// The node this client talks to.
    pub fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    /// Whether a connection is open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Welcome banner of the current connection.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Open the connection and consume the welcome banner.
    ///
    /// An existing connection is dropped first.
    pub async fn connect(&mut self) -> ClientResult<()> {
        self.conn = None;
        self.banner = None;

        let dial = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port));
        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, dial).await.unwrap_or_else(|_| {
                Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no connection after {limit:?}"),
                ))
            }),
            None => dial.await,
        }
        .map_err(|source| ClientError::Connect {
            node: self.node.clone(),
            source,
        })?;

        let (read_half, writer) = stream.into_split();
        let mut reader = LineReader::new(BufReader::new(read_half)).with_mode(self.read_mode);

        let banner = reader
            .read_line()
            .await
            .map_err(|e| ClientError::Handshake {
                node: self.node.clone(),
                source: e.into(),
            })?;
        tracing::debug!(node = %self.node, banner = %banner, "Connected to node");

        self.banner = Some(banner);
        self.conn = Some(Connection { reader, writer });
        Ok(())
    }

    /// Shut down and release the connection.
    ///
    /// The connection is released even when the shutdown itself fails.
    /// Closing a client that is not connected returns
    /// [`ClientError::NotConnected`].
    pub async fn close(&mut self) -> ClientResult<()> {
        let mut conn = self.conn.take().ok_or_else(|| ClientError::NotConnected {
            node: self.node.clone(),
        })?;
        self.banner = None;

        conn.writer
            .shutdown()
            .await
            .map_err(|source| ClientError::Io {
                node: self.node.clone(),
                command: "close".to_string(),
                source,
            })?;
        tracing::debug!(node = %self.node, "Connection closed");
        Ok(())
    }

    /// Enumerate the node's plugins, in the order the node lists them.
    pub async fn list_plugins(&mut self) -> ClientResult<Vec<String>> {
        let line = self.request_line(Command::List).await?;
        let plugins = parse::parse_plugin_list(&line);
        tracing::debug!(node = %self.node, count = plugins.len(), "Listed plugins");
        Ok(plugins)
    }

    /// Fetch one plugin's values into `sink`.
    ///
    /// Field types come from the plugin's `config` reply; undeclared fields
    /// are gauges. A malformed `fetch` line aborts the plugin with
    /// [`ClientError::MalformedLine`], a `#` diagnostic line with
    /// [`ClientError::NodeDiagnostic`]; records emitted before it stay emitted.
    ///
    /// Returns the number of records emitted.
    pub async fn fetch_plugin(&mut self, plugin: &str, sink: &RecordSink) -> ClientResult<usize> {
        let config = self.request_block(Command::Config(plugin)).await?;
        let types = parse::parse_value_types(&config);

        let command = Command::Fetch(plugin);
        let values = self.request_block(command).await?;

        let mut emitted = 0;
        for line in &values {
            if parse::is_comment(line) {
                return Err(ClientError::NodeDiagnostic {
                    node: self.node.clone(),
                    command: command.to_string(),
                    line: line.clone(),
                });
            }
            let Some(FetchLine { field, value }) = parse::parse_fetch_line(line) else {
                return Err(ClientError::MalformedLine {
                    node: self.node.clone(),
                    command: command.to_string(),
                    line: line.clone(),
                });
            };

            let record = MetricRecord {
                name: format!("{plugin}.{field}"),
                metric_type: types.get(field).cloned().unwrap_or_default(),
                value: value.to_string(),
                host: self.endpoint.host.clone(),
            };
            sink.emit(record)
                .await
                .map_err(|_| ClientError::SinkClosed {
                    node: self.node.clone(),
                })?;
            emitted += 1;
        }

        tracing::debug!(node = %self.node, plugin = %plugin, records = emitted, "Fetched plugin");
        Ok(emitted)
    }

    /// Fetch every plugin the node lists.
    ///
    /// A failed enumeration is reported and ends the run. Per-plugin failures
    /// are reported and the run moves on to the next plugin; only a closed
    /// sink stops it early.
    pub async fn fetch_all(&mut self, sink: &RecordSink) -> CollectionSummary {
        let mut summary = CollectionSummary::default();

        let plugins = match self.list_plugins().await {
            Ok(plugins) => plugins,
            Err(e) => {
                tracing::warn!(node = %self.node, error = %e, "Plugin enumeration failed");
                summary.failures += 1;
                sink.report(e).await;
                return summary;
            }
        };
        summary.plugins = plugins.len();

        for plugin in &plugins {
            match self.fetch_plugin(plugin, sink).await {
                Ok(n) => summary.records += n,
                Err(e @ ClientError::SinkClosed { .. }) => {
                    tracing::warn!(node = %self.node, error = %e, "Stopping collection");
                    summary.failures += 1;
                    sink.report(e).await;
                    break;
                }
                Err(e) => {
                    tracing::warn!(node = %self.node, plugin = %plugin, error = %e, "Plugin fetch failed");
                    summary.failures += 1;
                    sink.report(e).await;
                }
            }
        }

        summary
    }

    async fn request_line(&mut self, command: Command<'_>) -> ClientResult<String> {
        let conn = open(&mut self.conn, &self.node)?;
        conn.send(command)
            .await
            .map_err(|source| io_error(&self.node, command, source))?;
        conn.reader
            .read_line()
            .await
            .map_err(|e| read_error(&self.node, command, e))
    }

    async fn request_block(&mut self, command: Command<'_>) -> ClientResult<Vec<String>> {
        let conn = open(&mut self.conn, &self.node)?;
        conn.send(command)
            .await
            .map_err(|source| io_error(&self.node, command, source))?;
        conn.reader
            .read_multiline()
            .await
            .map_err(|e| read_error(&self.node, command, e))
    }
}

impl std::fmt::Debug for MuninClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuninClient")
            .field("endpoint", &self.endpoint)
            .field("read_mode", &self.read_mode)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

fn open<'a>(conn: &'a mut Option<Connection>, node: &str) -> ClientResult<&'a mut Connection> {
    conn.as_mut().ok_or_else(|| ClientError::NotConnected {
        node: node.to_string(),
    })
}

fn io_error(node: &str, command: Command<'_>, source: std::io::Error) -> ClientError {
    ClientError::Io {
        node: node.to_string(),
        command: command.to_string(),
        source,
    }
}

fn read_error(node: &str, command: Command<'_>, err: ReadError) -> ClientError {
    match err {
        ReadError::Truncated { received } => ClientError::Truncated {
            node: node.to_string(),
            command: command.to_string(),
            received,
        },
        ReadError::Io { source, .. } => io_error(node, command, source),
    }
}

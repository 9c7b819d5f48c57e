//! Scheduled polling of one node.
//!
//! A [`NodeCollector`] runs one collection cycle per interval: connect, fetch
//! every plugin, close. Each cycle uses a fresh connection and is bounded by
//! the configured timeout. Many collectors can share one [`RecordSink`] to fan
//! in results from several nodes.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, timeout};

use crate::client::{CollectionSummary, MuninClient};
use crate::error::ClientError;
use crate::protocol::ReadMode;
use crate::sink::RecordSink;
use crate::types::{DEFAULT_PORT, NodeEndpoint};

/// Default collection interval (5 minutes, the usual munin-update period).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Default timeout of one collection cycle (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum allowed interval (1 second).
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Configuration for polling one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique name for this node.
    pub name: String,
    /// Node host name or IP address.
    pub host: String,
    /// Node port (default: 4949).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Enable polling (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Collection interval (default: 5m).
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Timeout of one collection cycle (default: 30s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Treat a block cut short by a clean close as an error.
    #[serde(default)]
    pub strict: bool,
}

impl NodeConfig {
    /// Create a node configuration with default schedule.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            enabled: true,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            strict: false,
        }
    }

    /// Set the collection interval.
    ///
    /// Interval is clamped to a minimum of 1 second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Interval duration is less than minimum allowed. Using minimum duration."
            );
            self.interval = MIN_INTERVAL;
        } else {
            self.interval = interval;
        }
        self
    }

    /// Set the cycle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set strict block termination.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Endpoint of the node.
    pub fn endpoint(&self) -> NodeEndpoint {
        NodeEndpoint::new(&self.host, self.port)
    }

    fn read_mode(&self) -> ReadMode {
        if self.strict {
            ReadMode::Strict
        } else {
            ReadMode::Lenient
        }
    }
}

/// Periodic collector for one node.
pub struct NodeCollector {
    config: NodeConfig,
    sink: RecordSink,
}

impl NodeCollector {
    /// Create a collector sending into `sink`.
    pub fn new(config: NodeConfig, sink: RecordSink) -> Self {
        Self { config, sink }
    }

    /// The collector's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run one collection cycle.
    ///
    /// Per-plugin failures are reported to the sink by the client and counted
    /// in the summary. Connection failures and an elapsed timeout are returned.
    pub async fn collect(&self) -> Result<CollectionSummary, ClientError> {
        let endpoint = self.config.endpoint();
        let node = endpoint.to_string();
        let mut client = MuninClient::new(endpoint)
            .with_read_mode(self.config.read_mode())
            .with_connect_timeout(self.config.timeout);

        let start = Instant::now();
        let result = timeout(self.config.timeout, async {
            client.connect().await?;
            let summary = client.fetch_all(&self.sink).await;
            if let Err(e) = client.close().await {
                tracing::debug!(node = %node, error = %e, "Close after collection failed");
            }
            Ok::<_, ClientError>(summary)
        })
        .await;
        let elapsed_ms = duration_ms(start.elapsed());

        match result {
            Ok(Ok(summary)) => {
                tracing::debug!(
                    name = %self.config.name,
                    node = %node,
                    plugins = summary.plugins,
                    records = summary.records,
                    failures = summary.failures,
                    elapsed_ms,
                    "Collection cycle complete"
                );
                Ok(summary)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(name = %self.config.name, node = %node, timeout_ms = self.config.timeout.as_millis(), "Collection cycle timed out");
                Err(ClientError::Timeout {
                    node,
                    operation: "collection cycle".to_string(),
                })
            }
        }
    }

    /// Run one collection cycle, reporting a cycle failure to the sink.
    pub async fn collect_and_report(&self) -> Option<CollectionSummary> {
        match self.collect().await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(name = %self.config.name, error = %e, "Collection cycle failed");
                self.sink.report(e).await;
                None
            }
        }
    }

    /// Collect on every interval tick until `shutdown` turns true or its
    /// sender is dropped.
    ///
    /// The first cycle starts immediately. Cycle failures are reported to the
    /// sink and polling continues on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(name = %self.config.name, node = %self.config.endpoint(), interval = ?self.config.interval, "Node collector started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.collect_and_report().await;
                    if self.sink.is_closed() {
                        tracing::info!(name = %self.config.name, "Record sink closed, stopping");
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(name = %self.config.name, "Node collector stopped");
    }
}

fn duration_ms(elapsed: Duration) -> u32 {
    elapsed.as_millis().min(u32::MAX as u128) as u32
}

impl std::fmt::Debug for NodeCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCollector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sink;

    #[test]
    fn test_node_config_defaults() {
        let config = NodeConfig::new("web-01", "10.0.0.5", DEFAULT_PORT);

        assert_eq!(config.name, "web-01");
        assert_eq!(config.endpoint().to_string(), "10.0.0.5:4949");
        assert!(config.enabled);
        assert!(!config.strict);
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.read_mode(), ReadMode::Lenient);
    }

    #[test]
    fn test_node_config_builder() {
        let config = NodeConfig::new("db-01", "10.0.0.6", 4950)
            .with_interval(Duration::from_secs(60))
            .with_timeout(Duration::from_secs(10))
            .with_strict(true)
            .with_enabled(false);

        assert!(!config.enabled);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.read_mode(), ReadMode::Strict);
    }

    #[test]
    fn test_interval_minimum() {
        let config =
            NodeConfig::new("fast", "127.0.0.1", DEFAULT_PORT).with_interval(Duration::from_millis(100));
        assert_eq!(config.interval, MIN_INTERVAL);
    }

    #[test]
    fn test_node_config_deserialize() {
        let config: NodeConfig = serde_json::from_value(serde_json::json!({
            "name": "web-01",
            "host": "web-01.example.org",
            "interval": "1m",
            "timeout": "5s",
        }))
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.enabled);
    }

    #[test]
    fn test_duration_ms_clamped() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u32::MAX);
    }

    #[tokio::test]
    async fn test_collect_and_report_failure() {
        let (sink, mut stream) = sink::channel(8);
        let config = NodeConfig::new("refused", "127.0.0.1", 59999)
            .with_timeout(Duration::from_millis(500));
        let collector = NodeCollector::new(config, sink);

        assert!(collector.collect_and_report().await.is_none());
        let err = stream.errors.recv().await.unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_collect_connection_refused() {
        // Port that is very likely to have no listener
        let (sink, _stream) = sink::channel(8);
        let config = NodeConfig::new("refused", "127.0.0.1", 59999)
            .with_timeout(Duration::from_millis(500));
        let collector = NodeCollector::new(config, sink);

        let err = collector.collect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_collect_timeout() {
        // Non-routable address, the dial hangs until the deadline
        let (sink, _stream) = sink::channel(8);
        let config = NodeConfig::new("unreachable", "10.255.255.1", DEFAULT_PORT)
            .with_timeout(Duration::from_millis(100));
        let collector = NodeCollector::new(config, sink);

        let err = collector.collect().await.unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Timeout | ErrorKind::Connection
        ));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (sink, mut stream) = sink::channel(8);
        let config = NodeConfig::new("refused", "127.0.0.1", 59999)
            .with_interval(Duration::from_secs(3600))
            .with_timeout(Duration::from_millis(500));
        let collector = NodeCollector::new(config, sink);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(collector.run(rx));

        // The first tick fires immediately and reports the refused connection.
        let err = stream.errors.recv().await.unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("collector should stop")
            .unwrap();
    }
}

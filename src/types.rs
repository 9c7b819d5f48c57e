//! Core data types: node endpoints, metric types and metric records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default TCP port of a Munin node.
pub const DEFAULT_PORT: u16 = 4949;

/// Address of a Munin node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl NodeEndpoint {
    /// Create an endpoint for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Declared data source type of a plugin field.
///
/// Fields without a declaration are gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum MetricType {
    #[default]
    Gauge,
    Counter,
    Derive,
    Absolute,
    /// Any type this client does not know, kept as declared.
    Other(String),
}

impl MetricType {
    /// Protocol spelling of the type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gauge => "GAUGE",
            Self::Counter => "COUNTER",
            Self::Derive => "DERIVE",
            Self::Absolute => "ABSOLUTE",
            Self::Other(raw) => raw,
        }
    }
}

impl FromStr for MetricType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.to_ascii_uppercase().as_str() {
            "GAUGE" => Self::Gauge,
            "COUNTER" => Self::Counter,
            "DERIVE" => Self::Derive,
            "ABSOLUTE" => Self::Absolute,
            _ => Self::Other(s.to_string()),
        };
        Ok(ty)
    }
}

impl From<&str> for MetricType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(ty) => ty,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}

/// One fetched metric value.
///
/// The value is kept exactly as the node sent it (`U` for unknown is common);
/// numeric interpretation is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Qualified name, `<plugin>.<field>`.
    pub name: String,
    /// Declared type, `GAUGE` when undeclared.
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Raw value text.
    pub value: String,
    /// Host of the node the value came from.
    pub host: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let endpoint = NodeEndpoint::new("db-01.example.org", DEFAULT_PORT);
        assert_eq!(endpoint.to_string(), "db-01.example.org:4949");
    }

    #[test]
    fn test_metric_type_parse() {
        assert_eq!(MetricType::from("GAUGE"), MetricType::Gauge);
        assert_eq!(MetricType::from("counter"), MetricType::Counter);
        assert_eq!(MetricType::from("Derive"), MetricType::Derive);
        assert_eq!(MetricType::from("ABSOLUTE"), MetricType::Absolute);
        assert_eq!(
            MetricType::from("DDERIVE"),
            MetricType::Other("DDERIVE".to_string())
        );
        assert_eq!(MetricType::default(), MetricType::Gauge);
    }

    #[test]
    fn test_metric_type_display_preserves_unknown() {
        assert_eq!(MetricType::Derive.to_string(), "DERIVE");
        assert_eq!(MetricType::from("weird").to_string(), "weird");
    }

    #[test]
    fn test_record_json() {
        let record = MetricRecord {
            name: "load.load".to_string(),
            metric_type: MetricType::Gauge,
            value: "0.42".to_string(),
            host: "localhost".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "load.load");
        assert_eq!(json["type"], "GAUGE");
        assert_eq!(json["value"], "0.42");
        assert_eq!(json["host"], "localhost");
    }
}

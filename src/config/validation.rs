//! Configuration errors and `${VAR}` substitution in node settings.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Errors raised while loading the poller configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML does not describe a node list.
    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A node or channel setting is out of range.
    #[error("invalid setting: {0}")]
    Invalid(String),
}

// `${NAME}` or `${NAME:-fallback}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("placeholder pattern is valid")
});

/// Substitute `${NAME}` and `${NAME:-fallback}` placeholders from the
/// process environment, so node hosts and ports can be set per deployment.
///
/// An unset variable without a fallback becomes the empty string.
pub fn expand_env_vars(input: &str) -> String {
    PLACEHOLDER
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

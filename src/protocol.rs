//! Munin wire protocol.
//!
//! - [`LineReader`]: line and multiline-block framing
//! - [`Command`]: the requests this client issues
//! - [`parse`]: reply parsing for `list`, `config` and `fetch`

pub mod parse;
mod reader;

use std::fmt;

pub use reader::{LineReader, ReadError, ReadMode, TERMINATOR};

/// A request sent to a node. One command is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Enumerate plugins.
    List,
    /// Request field metadata of a plugin.
    Config(&'a str),
    /// Request current values of a plugin.
    Fetch(&'a str),
}

impl Command<'_> {
    /// Wire form, newline included.
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => f.write_str("list"),
            Self::Config(plugin) => write!(f, "config {plugin}"),
            Self::Fetch(plugin) => write!(f, "fetch {plugin}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        assert_eq!(Command::List.to_wire(), "list\n");
        assert_eq!(Command::Config("cpu").to_wire(), "config cpu\n");
        assert_eq!(Command::Fetch("if_eth0").to_wire(), "fetch if_eth0\n");
        assert_eq!(Command::Fetch("df").to_string(), "fetch df");
    }
}

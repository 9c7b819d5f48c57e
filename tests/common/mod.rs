//! Scripted Munin node for integration tests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Banner sent on every new connection.
pub const BANNER: &str = "# munin node at mock.example.org";

/// How the mock answers one command.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Reply {
    /// A single line.
    Line(&'static str),
    /// A multiline block; the `.` terminator is appended.
    Block(Vec<&'static str>),
    /// Raw bytes, then the connection is closed.
    Hangup(&'static str),
}

/// Command-to-reply script served to every connection.
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    replies: HashMap<String, Reply>,
}

#[allow(dead_code)]
impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` with `reply`.
    pub fn on(mut self, command: &str, reply: Reply) -> Self {
        self.replies.insert(command.to_string(), reply);
        self
    }

    /// Answer `config <plugin>` and `fetch <plugin>` with blocks.
    pub fn plugin(
        self,
        name: &str,
        config: Vec<&'static str>,
        fetch: Vec<&'static str>,
    ) -> Self {
        self.on(&format!("config {name}"), Reply::Block(config))
            .on(&format!("fetch {name}"), Reply::Block(fetch))
    }

    /// Start serving on a random local port.
    ///
    /// Returns `None` when the sandbox disallows binding.
    pub async fn spawn(self) -> Option<SocketAddr> {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => return None,
            Err(e) => panic!("Failed to bind mock node: {e}"),
        };
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let replies = self.replies.clone();
                tokio::spawn(async move {
                    let (read_half, mut writer) = stream.into_split();
                    let mut reader = BufReader::new(read_half);

                    if writer.write_all(format!("{BANNER}\n").as_bytes()).await.is_err() {
                        return;
                    }

                    let mut line = String::new();
                    loop {
                        line.clear();
                        match reader.read_line(&mut line).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => {}
                        }

                        let command = line.trim_end();
                        let out = match replies.get(command) {
                            Some(Reply::Line(text)) => format!("{text}\n"),
                            Some(Reply::Block(lines)) => {
                                let mut out = String::new();
                                for l in lines {
                                    out.push_str(l);
                                    out.push('\n');
                                }
                                out.push_str(".\n");
                                out
                            }
                            Some(Reply::Hangup(raw)) => {
                                let _ = writer.write_all(raw.as_bytes()).await;
                                let _ = writer.shutdown().await;
                                return;
                            }
                            None if command == "quit" => return,
                            None if command.starts_with("config ")
                                || command.starts_with("fetch ") =>
                            {
                                "# Unknown service\n.\n".to_string()
                            }
                            None => "# Unknown command. Try cap, list, nodes, config, fetch, version or quit\n"
                                .to_string(),
                        };

                        if writer.write_all(out.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        Some(addr)
    }
}

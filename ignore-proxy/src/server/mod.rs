//! Unix socket listener that feeds proxy engine events to the collector

pub mod protocol;

pub use protocol::{Command, END_OF_LIST, MAX_LINE_LENGTH};

use crate::collector::FailureCollector;
use crate::error::{ProxyError, Result};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Event listener bound to a Unix domain socket
pub struct EventServer {
    socket_path: PathBuf,
    listener: UnixListener,
    collector: Arc<FailureCollector>,
}

impl EventServer {
    /// Bind the socket, replacing a stale one left by an earlier run
    pub fn bind(socket_path: impl Into<PathBuf>, collector: Arc<FailureCollector>) -> Result<Self> {
        let socket_path = socket_path.into();
        remove_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path)?;
        info!("Event listener on {:?}", socket_path);

        Ok(Self {
            socket_path,
            listener,
            collector,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until `shutdown` resolves, then remove the socket
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Event listener shutting down");
                    break Ok(());
                }
                accepted = self.listener.accept() => {
                    let stream = match accepted {
                        Ok((stream, _)) => stream,
                        Err(e) => break Err(ProxyError::from(e)),
                    };
                    let collector = Arc::clone(&self.collector);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, collector).await {
                            debug!("Client connection ended: {}", e);
                        }
                    });
                }
            }
        };

        if let Err(e) = remove_socket(&self.socket_path) {
            warn!("Could not remove socket {:?}: {}", self.socket_path, e);
        }
        result
    }
}

fn remove_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Serve one proxy engine connection until it closes
async fn handle_client(stream: UnixStream, collector: Arc<FailureCollector>) -> Result<()> {
    debug!("Proxy engine connected");
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                lines
                    .send("ERROR line too long".to_string())
                    .await
                    .map_err(codec_error)?;
                return Err(ProxyError::Protocol("line too long".to_string()));
            }
            Err(e) => return Err(codec_error(e)),
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match Command::parse(&line) {
            Ok(command) => dispatch(&collector, command).await?,
            Err(e) => {
                debug!("Rejected command {:?}: {}", line, e);
                vec![format!("ERROR {}", e)]
            }
        };

        for reply_line in reply {
            lines.feed(reply_line).await.map_err(codec_error)?;
        }
        SinkExt::<String>::flush(&mut lines)
            .await
            .map_err(codec_error)?;
    }

    debug!("Proxy engine disconnected");
    Ok(())
}

/// Run one command and return its reply lines
async fn dispatch(collector: &Arc<FailureCollector>, command: Command) -> Result<Vec<String>> {
    let reply = match command {
        Command::Transport(event) => {
            let collector = Arc::clone(collector);
            let outcome =
                tokio::task::spawn_blocking(move || collector.record_transport_failure(&event))
                    .await?;
            vec![format!("OK {}", outcome.as_str())]
        }
        Command::Handshake(event) => {
            let collector = Arc::clone(collector);
            let outcome =
                tokio::task::spawn_blocking(move || collector.record_handshake_failure(&event))
                    .await?;
            vec![format!("OK {}", outcome.as_str())]
        }
        Command::Query { host, ip } => {
            let verdict = if collector.is_ignored(&host, ip) {
                "IGNORE"
            } else {
                "INTERCEPT"
            };
            vec![verdict.to_string()]
        }
        Command::List => {
            let effective = collector.effective();
            let mut lines = effective.entries().to_vec();
            lines.push(END_OF_LIST.to_string());
            lines
        }
        Command::Reload => {
            let collector = Arc::clone(collector);
            let cached = tokio::task::spawn_blocking(move || collector.rebuild()).await?;
            vec![format!("OK {}", cached)]
        }
    };
    Ok(reply)
}

fn codec_error(e: LinesCodecError) -> ProxyError {
    match e {
        LinesCodecError::Io(e) => ProxyError::Io(e),
        LinesCodecError::MaxLineLengthExceeded => ProxyError::Protocol("line too long".to_string()),
    }
}

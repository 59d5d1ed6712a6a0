//! TCP transport: one JSON frame per line in each direction.
//!
//! Each accepted socket gets a reader loop that feeds a `ConnectionHandler`
//! and a writer task that drains the frames the broker emits.

use std::sync::Arc;
use std::time::Duration;

use actors::{Addr, Broker};
use broker_core::{
    BrokerError, ConnectionEngine, ConnectionEvent, ConnectionId, ErrorCondition, LinkId,
    LinkRole, Message, Result,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::frame::{self, BrokerFrame, LinkTable, Translation};
use crate::shutdown::Shutdown;

/// How long a closed connection's writer may keep flushing queued frames.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Engine for one TCP connection. Commands become frames on the writer queue.
pub struct TcpEngine {
    frames: mpsc::UnboundedSender<BrokerFrame>,
    shutdown: Shutdown,
}

impl TcpEngine {
    pub fn new(frames: mpsc::UnboundedSender<BrokerFrame>, shutdown: Shutdown) -> Self {
        Self { frames, shutdown }
    }

    fn emit(&self, frame: BrokerFrame) -> Result<()> {
        self.frames
            .send(frame)
            .map_err(|_| BrokerError::Engine("connection writer is gone".into()))
    }
}

impl ConnectionEngine for TcpEngine {
    fn open_connection(&self) -> Result<()> {
        self.emit(BrokerFrame::Opened)
    }

    fn open_sender(&self, link: LinkId, address: &str) -> Result<()> {
        self.emit(BrokerFrame::Attached {
            link,
            role: LinkRole::Sender,
            address: address.to_string(),
        })
    }

    fn open_receiver(&self, link: LinkId, address: &str) -> Result<()> {
        self.emit(BrokerFrame::Attached {
            link,
            role: LinkRole::Receiver,
            address: address.to_string(),
        })
    }

    fn transmit(&self, link: LinkId, message: Message) -> Result<()> {
        self.emit(BrokerFrame::Transfer { link, message })
    }

    fn request_shutdown(&self, condition: ErrorCondition) -> Result<()> {
        self.shutdown.trigger(&condition);
        Ok(())
    }
}

/// Accept connections until shutdown is requested.
pub async fn run(broker: Broker, listener: TcpListener, shutdown: Shutdown) -> Result<()> {
    let mut next_id = 1u64;
    tracing::info!(addr = ?listener.local_addr().ok(), "accepting connections");

    while !shutdown.is_triggered() {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("accept loop stopped");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let id = ConnectionId(next_id);
                next_id += 1;
                tracing::debug!(connection = %id, %peer, "accepted");

                let broker = broker.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(broker, stream, id, shutdown).await {
                        tracing::warn!(connection = %id, error = %e, "connection failed");
                    }
                });
            }
        }
    }
    Ok(())
}

/// Drive one connection until the peer closes it.
pub async fn serve_connection(
    broker: Broker,
    stream: TcpStream,
    id: ConnectionId,
    shutdown: Shutdown,
) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_frames(write_half, rx));

    let engine = Arc::new(TcpEngine::new(tx.clone(), shutdown));
    let handler = broker.connect(id, engine).await?;

    let outcome = read_frames(read_half, &handler, &tx).await;

    let _ = handler.post(ConnectionEvent::TransportClosed);
    // The writer ends once every link actor has released its engine handle.
    drop(tx);
    let abort = writer.abort_handle();
    if tokio::time::timeout(DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::debug!(connection = %id, "writer still busy after close; aborting");
        abort.abort();
    }
    tracing::debug!(connection = %id, "connection closed");
    outcome
}

async fn read_frames<R>(
    read_half: R,
    handler: &Addr<ConnectionEvent>,
    tx: &mpsc::UnboundedSender<BrokerFrame>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    let mut links = LinkTable::default();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let translated = std::str::from_utf8(raw)
            .map_err(|e| BrokerError::Protocol(format!("frame is not UTF-8: {}", e)))
            .and_then(frame::decode)
            .and_then(|f| links.translate(f));
        match translated {
            Ok(Translation::Event(event)) => handler.post(event)?,
            Ok(Translation::Close) => return Ok(()),
            Err(e) => {
                let condition = ErrorCondition::new("invalid-frame", e.to_string());
                let _ = tx.send(BrokerFrame::Error {
                    condition: condition.clone(),
                });
                handler.post(ConnectionEvent::ProtocolError { condition })?;
            }
        }
    }
}

async fn write_frames<W>(mut write_half: W, mut rx: mpsc::UnboundedReceiver<BrokerFrame>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let line = match frame::encode(&frame) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = write_half.write_all(&line).await {
            tracing::debug!(error = %e, "peer stopped reading");
            return;
        }
    }
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actors::{Addr, Broker, QueueCommand};
use broker_core::{
    BrokerConfig, BrokerError, ConnectionEngine, ErrorCondition, LinkId, Message, QueueSnapshot,
    SharedEngine,
};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(3);

/// A command the broker issued to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    OpenConnection,
    OpenSender { link: LinkId, address: String },
    OpenReceiver { link: LinkId, address: String },
    Transmit { link: LinkId, message: Message },
    Shutdown(ErrorCondition),
}

/// Engine double that records every command on a channel.
pub struct RecordingEngine {
    calls: mpsc::UnboundedSender<EngineCall>,
}

impl RecordingEngine {
    fn record(&self, call: EngineCall) -> Result<(), BrokerError> {
        self.calls
            .send(call)
            .map_err(|_| BrokerError::Engine("recorder dropped".into()))
    }
}

impl ConnectionEngine for RecordingEngine {
    fn open_connection(&self) -> Result<(), BrokerError> {
        self.record(EngineCall::OpenConnection)
    }

    fn open_sender(&self, link: LinkId, address: &str) -> Result<(), BrokerError> {
        self.record(EngineCall::OpenSender {
            link,
            address: address.to_string(),
        })
    }

    fn open_receiver(&self, link: LinkId, address: &str) -> Result<(), BrokerError> {
        self.record(EngineCall::OpenReceiver {
            link,
            address: address.to_string(),
        })
    }

    fn transmit(&self, link: LinkId, message: Message) -> Result<(), BrokerError> {
        self.record(EngineCall::Transmit { link, message })
    }

    fn request_shutdown(&self, condition: ErrorCondition) -> Result<(), BrokerError> {
        self.record(EngineCall::Shutdown(condition))
    }
}

pub fn recording_engine() -> (SharedEngine, mpsc::UnboundedReceiver<EngineCall>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingEngine { calls: tx }), rx)
}

pub async fn start_broker() -> Broker {
    Broker::start(BrokerConfig::default())
        .await
        .expect("broker starts")
}

/// Next engine call, failing the test if none arrives in time.
pub async fn next_call(rx: &mut mpsc::UnboundedReceiver<EngineCall>) -> EngineCall {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("engine call within timeout")
        .expect("engine channel open")
}

/// Skip calls until one matches.
pub async fn next_matching(
    rx: &mut mpsc::UnboundedReceiver<EngineCall>,
    pred: impl Fn(&EngineCall) -> bool,
) -> EngineCall {
    loop {
        let call = next_call(rx).await;
        if pred(&call) {
            return call;
        }
    }
}

/// Collect `count` transmitted messages, ignoring other calls.
pub async fn transmitted(
    rx: &mut mpsc::UnboundedReceiver<EngineCall>,
    count: usize,
) -> Vec<(LinkId, Message)> {
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        if let EngineCall::Transmit { link, message } = next_call(rx).await {
            out.push((link, message));
        }
    }
    out
}

/// True if no call arrives within a short grace period.
///
/// A closed channel counts as quiet: the engine was dropped without a call.
pub async fn quiet(rx: &mut mpsc::UnboundedReceiver<EngineCall>) -> bool {
    !matches!(
        tokio::time::timeout(Duration::from_millis(100), rx.recv()).await,
        Ok(Some(_))
    )
}

/// Poll a queue snapshot until `pred` holds.
pub async fn wait_for_queue(
    broker: &Broker,
    name: &str,
    pred: impl Fn(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Some(snapshot) = broker.snapshot(name).await.expect("snapshot")
            && pred(&snapshot)
        {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "queue {name} did not reach the expected state"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll a queue actor's snapshot until `pred` holds.
pub async fn wait_for_snapshot(
    queue: &Addr<QueueCommand>,
    pred: impl Fn(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let snapshot = queue
            .query(|reply| QueueCommand::Snapshot { reply })
            .await
            .expect("snapshot");
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "queue {} did not reach the expected state",
            snapshot.name
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until posting to an actor fails, i.e. it has stopped.
pub async fn wait_until_stopped<C: Send + 'static>(addr: &Addr<C>, probe: impl Fn() -> C) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while addr.post(probe()).is_ok() {
        assert!(tokio::time::Instant::now() < deadline, "actor did not stop");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn text(message: &Message) -> &str {
    message.body_as_str().unwrap_or_default()
}

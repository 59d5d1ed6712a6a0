//! Broker binary: listens for JSON-lines clients and routes their messages
//! through named queues.

mod frame;
mod logging;
mod shutdown;
mod transport;

use actors::Broker;
use broker_core::{BrokerConfig, BrokerError, ErrorCondition};
use tokio::net::TcpListener;

use crate::shutdown::Shutdown;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BrokerConfig::from_env()?;
    logging::init(&config.log_filter);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|source| BrokerError::Listen {
            addr: config.listen_addr.to_string(),
            source,
        })?;

    let broker = Broker::start(config).await?;
    let shutdown = Shutdown::new();

    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.trigger(&ErrorCondition::new("interrupted", "ctrl-c"));
        }
    });

    transport::run(broker.clone(), listener, shutdown).await?;
    broker.shutdown();
    tracing::info!("broker stopped");
    Ok(())
}

//! Process wiring: one recorder task and one listener per route.

use crate::capture::capture_channel;
use crate::config::Config;
use crate::proxy::{create_http_client, ProxyServer};
use crate::recording::ExchangeRecorder;
use tokio::task::JoinSet;
use tracing::info;

/// Start every listener and the recorder, then wait on them.
///
/// Listeners only return on failure, so the first one to finish ends the
/// process with its error.
pub async fn run(config: Config) -> Result<(), anyhow::Error> {
    let (sender, receiver) = capture_channel(config.queue_capacity);
    let recorder = ExchangeRecorder::new(config.imposters_dir.clone());
    let recorder_task = tokio::spawn(recorder.run(receiver));

    let http_client = create_http_client(&config.connection_pool);
    let upstream_timeout = config.connection_pool.upstream_timeout();

    let mut servers = JoinSet::new();
    for route in &config.routes {
        let server = ProxyServer::new(route, http_client.clone(), sender.clone())
            .with_upstream_timeout(upstream_timeout);
        servers.spawn(server.run());
    }
    // Only the listeners hold senders now; the recorder stops once they are gone.
    drop(sender);

    info!(
        "Started {} listener(s), capture queue capacity {}",
        config.routes.len(),
        config.queue_capacity
    );

    let result = match servers.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(e)) => Err(anyhow::anyhow!("Listener task failed: {e}")),
        None => Ok(()),
    };

    // Open connections still hold senders, so the recorder is not drained here.
    servers.shutdown().await;
    recorder_task.abort();
    result
}

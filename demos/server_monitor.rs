//! Live server monitor.
//!
//! Connects to the server-monitor socket, requests an overview, starts realtime monitoring and
//! prints every reply for a minute before stopping.
//!
//! Run with tracing enabled:
//! ```sh
//! ADMIN_WS_ORIGIN=ws://localhost:8000 ADMIN_WS_TOKEN=... RUST_LOG=info \
//!     cargo run --example server_monitor --features tracing
//! ```

use std::env;
use std::time::Duration;

use admin_monitor_ws::auth::StaticToken;
use admin_monitor_ws::endpoint::Origin;
use admin_monitor_ws::monitor::{MonitorManager, MonitorReply, ReplyKind, ServerMonitorData};
use admin_monitor_ws::ws::Callbacks;
use futures::StreamExt as _;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let token = env::var("ADMIN_WS_TOKEN")?;
    let callbacks = Callbacks::new()
        .on_open(|| info!(event = "open"))
        .on_close(|close| info!(event = "close", code = close.code, reason = %close.reason))
        .on_error(|e| warn!(event = "error", error = %e))
        .on_reconnect(|attempt| info!(event = "reconnect", attempt));

    let monitor = MonitorManager::server(&Origin::from_env()?, StaticToken::new(token), callbacks)?;
    let mut messages = Box::pin(monitor.messages());

    monitor.connect().await?;
    info!(state = ?monitor.state());

    if !monitor.get_overview() || !monitor.start_monitoring() {
        error!("connection dropped before monitoring started");
        return Ok(());
    }

    let mut received = 0;
    while let Ok(Some(result)) = timeout(Duration::from_secs(60), messages.next()).await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e);
                continue;
            }
        };

        let reply = MonitorReply::from(&message);
        match reply.kind {
            ReplyKind::ServerOverview | ReplyKind::RealtimeStats => {
                match reply.data_as::<ServerMonitorData>() {
                    Ok(Some(data)) => info!(
                        kind = ?reply.kind,
                        cpu = ?data.cpu_info,
                        memory = ?data.memory_info,
                        load = ?data.system_load
                    ),
                    Ok(None) => debug!(kind = ?reply.kind, "reply without data"),
                    Err(e) => warn!(kind = ?reply.kind, error = %e),
                }
            }
            ReplyKind::Error => error!(message = ?reply.message),
            kind => info!(kind = ?kind, message = ?reply.message),
        }

        received += 1;
        if received >= 30 {
            break;
        }
    }

    _ = monitor.stop_monitoring();
    monitor.close(None, None);
    info!(received);

    Ok(())
}

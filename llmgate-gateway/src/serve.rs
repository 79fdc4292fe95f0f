//! Server lifecycle: bind, serve, flush usage, shut down.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::api;
use crate::config::GatewayConfig;
use crate::state::Gateway;

/// Handle returned by [`serve`]: the bound address and a shutdown trigger.
pub struct ServeHandle {
    /// The address the listener is bound to.
    pub addr: SocketAddr,
    /// The port the gateway is listening on.
    pub port: u16,
    /// The shared gateway state.
    pub gateway: Gateway,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<tokio::task::JoinHandle<Result<(), std::io::Error>>>,
}

impl ServeHandle {
    /// Base URL of the running gateway, e.g. `http://127.0.0.1:8787`.
    ///
    /// A wildcard bind is reported as loopback of the same family.
    pub fn base_url(&self) -> String {
        connect_url(self.addr)
    }

    /// Triggers graceful shutdown and waits for the server to stop.
    ///
    /// Usage counters are flushed once more after the last request.
    ///
    /// # Errors
    ///
    /// Returns an error if the server task failed.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await??;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeHandle")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

fn connect_url(addr: SocketAddr) -> String {
    let mut addr = addr;
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        addr.set_ip(loopback);
    }
    format!("http://{addr}")
}

/// Opens state from `config` and starts serving.
///
/// The server runs in a spawned task; call [`ServeHandle::shutdown`] to
/// stop it.
///
/// # Errors
///
/// Returns an error if state cannot be opened or the address cannot be
/// bound.
pub async fn serve(config: &GatewayConfig) -> Result<ServeHandle> {
    let gateway = Gateway::open(config).await?;
    serve_with_gateway(gateway, config).await
}

/// Serves an already-built gateway. Useful when the caller injects its own
/// upstream client.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve_with_gateway(gateway: Gateway, config: &GatewayConfig) -> Result<ServeHandle> {
    let app = api::router(gateway.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    let addr = listener.local_addr()?;
    let port = addr.port();
    info!(bind = %config.bind, %addr, "Gateway listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (flush_stop_tx, flush_stop_rx) = oneshot::channel();
    let flusher = tokio::spawn(flush_loop(gateway.clone(), config.usage_flush_interval, flush_stop_rx));

    let ledger = gateway.ledger.clone();
    let join = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Received shutdown signal");
            })
            .await;

        let _ = flush_stop_tx.send(());
        let _ = flusher.await;
        if let Err(e) = ledger.flush().await {
            warn!(error = %e, "Final usage flush failed");
        }
        served
    });

    Ok(ServeHandle {
        addr,
        port,
        gateway,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}

/// Writes dirty usage counters every `interval` until told to stop.
async fn flush_loop(gateway: Gateway, interval: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                match gateway.ledger.flush().await {
                    Ok(true) => debug!("Periodic usage flush written"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Periodic usage flush failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(addr: &str) -> String {
        connect_url(addr.parse().unwrap())
    }

    #[test]
    fn test_connect_url_follows_bound_address() {
        assert_eq!(url("127.0.0.1:8787"), "http://127.0.0.1:8787");
        assert_eq!(url("192.168.1.20:9000"), "http://192.168.1.20:9000");
        assert_eq!(url("[::1]:8787"), "http://[::1]:8787");
    }

    #[test]
    fn test_connect_url_maps_wildcard_to_loopback() {
        assert_eq!(url("0.0.0.0:8787"), "http://127.0.0.1:8787");
        assert_eq!(url("[::]:8787"), "http://[::1]:8787");
    }
}

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use shared::types::ServiceKind;
use crate::error::DiscoveryError;
use crate::mdns::browser::Discovery;
use crate::mdns::listener::{connect_port_handler, Listener, SessionState};
use crate::poll::PollDeadline;

/// Learns the connect port a paired device advertises.
pub struct ConnectPortResolver<D> {
    discovery: Arc<D>,
    window: Duration,
    poll_interval: Duration,
}

impl<D: Discovery> ConnectPortResolver<D> {
    pub fn new(discovery: Arc<D>, window: Duration, poll_interval: Duration) -> Self {
        Self {
            discovery,
            window,
            poll_interval,
        }
    }

    /// Waits up to the resolve window for a connect advertisement that
    /// lists `target` among its addresses.
    pub async fn resolve(&self, target: Ipv4Addr) -> Result<Option<u16>, DiscoveryError> {
        let state = Arc::new(SessionState::new());
        let session = self.discovery.browse(ServiceKind::Connect)?;
        let listener = Listener::spawn(session, connect_port_handler(target, state.clone()));

        let mut deadline = PollDeadline::new(self.window, self.poll_interval);
        let port = loop {
            if let Some(port) = state.get() {
                break Some(port);
            }
            if !deadline.tick().await {
                break state.get();
            }
        };

        listener.shutdown().await;

        match port {
            Some(port) => tracing::info!("Connect service of {} is on port {}", target, port),
            None => tracing::info!("No connect service found for {}", target),
        }
        Ok(port)
    }
}

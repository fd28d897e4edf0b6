use std::net::{IpAddr, Ipv4Addr};
use mdns_sd::{ServiceDaemon, ServiceEvent};
use shared::types::{ServiceAdvertisement, ServiceKind};
use crate::error::DiscoveryError;

/// Events delivered to a browse session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseEvent {
    /// An instance name appeared; resolution has not finished yet
    Found(String),
    Resolved(ServiceAdvertisement),
    Removed(String),
}

/// An active browse for one service kind.
///
/// Browsing stops when the session is dropped.
pub struct BrowseSession {
    kind: ServiceKind,
    events: flume::Receiver<BrowseEvent>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl BrowseSession {
    pub fn new(
        kind: ServiceKind,
        events: flume::Receiver<BrowseEvent>,
        on_close: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            kind,
            events,
            on_close: Some(Box::new(on_close)),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn events(&self) -> &flume::Receiver<BrowseEvent> {
        &self.events
    }
}

impl Drop for BrowseSession {
    fn drop(&mut self) {
        if let Some(close) = self.on_close.take() {
            close();
        }
    }
}

/// Source of service advertisements on the local network.
pub trait Discovery: Send + Sync + 'static {
    fn browse(&self, kind: ServiceKind) -> Result<BrowseSession, DiscoveryError>;
}

/// Discovery backed by an mdns-sd daemon.
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
}

impl MdnsDiscovery {
    pub fn new() -> Result<Self, DiscoveryError> {
        let daemon = ServiceDaemon::new()?;
        Ok(Self { daemon })
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.daemon.shutdown() {
            tracing::error!("Failed to shutdown mDNS daemon: {}", e);
        }
    }
}

impl Discovery for MdnsDiscovery {
    /// Must be called from within a tokio runtime.
    fn browse(&self, kind: ServiceKind) -> Result<BrowseSession, DiscoveryError> {
        let service_type = kind.service_type();
        let receiver = self.daemon.browse(service_type)?;
        tracing::debug!("Browsing {}", service_type);

        let (tx, rx) = flume::unbounded();
        tokio::spawn(forward_events(kind, receiver, tx));

        let daemon = self.daemon.clone();
        Ok(BrowseSession::new(kind, rx, move || {
            if let Err(e) = daemon.stop_browse(service_type) {
                tracing::warn!("Failed to stop browsing {}: {}", service_type, e);
            } else {
                tracing::debug!("Stopped browsing {}", service_type);
            }
        }))
    }
}

/// Translates daemon events until the browse stops or the session is dropped
async fn forward_events(
    kind: ServiceKind,
    receiver: flume::Receiver<ServiceEvent>,
    tx: flume::Sender<BrowseEvent>,
) {
    while let Ok(event) = receiver.recv_async().await {
        let event = match event {
            ServiceEvent::ServiceFound(_, fullname) => BrowseEvent::Found(fullname),
            ServiceEvent::ServiceResolved(info) => match convert_service_info(kind, &info) {
                Some(advertisement) => BrowseEvent::Resolved(advertisement),
                None => continue,
            },
            ServiceEvent::ServiceRemoved(_, fullname) => BrowseEvent::Removed(fullname),
            ServiceEvent::SearchStopped(_) => break,
            _ => continue,
        };

        if tx.send(event).is_err() {
            break;
        }
    }
}

/// Convert an mdns-sd ServiceInfo to our ServiceAdvertisement
fn convert_service_info(
    kind: ServiceKind,
    info: &mdns_sd::ServiceInfo,
) -> Option<ServiceAdvertisement> {
    let mut addresses: Vec<Ipv4Addr> = info
        .get_addresses()
        .iter()
        .filter_map(|addr| match addr {
            IpAddr::V4(ipv4) => Some(*ipv4),
            _ => None,
        })
        .collect();

    if addresses.is_empty() {
        tracing::debug!("Skipping service {} - no IPv4 addresses", info.get_fullname());
        return None;
    }
    // The daemon keeps addresses in a hash set
    addresses.sort();

    Some(ServiceAdvertisement {
        kind,
        instance_name: info.get_fullname().to_string(),
        addresses,
        port: info.get_port(),
    })
}

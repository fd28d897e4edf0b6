//! Listeners run on a notification task per browse session and react to
//! resolved advertisements only; found and removed events are logged.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use shared::types::{ConnectionOutcome, PairingCredential, ServiceAdvertisement};
use crate::bridge::Bridge;
use crate::mdns::browser::{BrowseEvent, BrowseSession, Discovery};
use crate::pairing::Handshake;
use crate::probe::{candidate_ports, PortProber};
use crate::report::PairingReport;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type Handler = Arc<dyn Fn(ServiceAdvertisement) -> HandlerFuture + Send + Sync>;

/// Result slot shared between a listener and the polling caller.
/// The first write wins.
#[derive(Debug)]
pub struct SessionState<T> {
    matched: OnceLock<T>,
}

impl<T: Clone> SessionState<T> {
    pub fn new() -> Self {
        Self {
            matched: OnceLock::new(),
        }
    }

    /// Returns false if a value was already recorded
    pub fn record(&self, value: T) -> bool {
        self.matched.set(value).is_ok()
    }

    pub fn get(&self) -> Option<T> {
        self.matched.get().cloned()
    }

    pub fn is_found(&self) -> bool {
        self.matched.get().is_some()
    }
}

impl<T: Clone> Default for SessionState<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one pairing attempt.
#[derive(Debug)]
pub struct PairingSession {
    credential: PairingCredential,
    started: AtomicBool,
    report: SessionState<PairingReport>,
}

impl PairingSession {
    pub fn new(credential: PairingCredential) -> Self {
        Self {
            credential,
            started: AtomicBool::new(false),
            report: SessionState::new(),
        }
    }

    pub fn credential(&self) -> &PairingCredential {
        &self.credential
    }

    /// Exact, case-sensitive comparison of the instance label with the service id
    pub fn accepts(&self, advertisement: &ServiceAdvertisement) -> bool {
        advertisement.instance_label() == self.credential.service_id
    }

    /// One-shot latch: true only for the first caller
    fn begin(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    pub fn is_matched(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn report(&self) -> Option<PairingReport> {
        self.report.get()
    }
}

/// A handler running on its own notification task.
///
/// Dropping the listener cancels the task, which drops the browse session.
pub struct Listener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Listener {
    pub fn spawn(session: BrowseSession, handler: Handler) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(notification_loop(session, handler, cancel.clone()));

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// True once the task has exited, e.g. because the event source closed
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the task and waits until the browse session is released.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Listener task failed: {}", e);
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn notification_loop(session: BrowseSession, handler: Handler, cancel: CancellationToken) {
    let kind = session.kind();
    let events = session.events().clone();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = events.recv_async() => match event {
                Ok(BrowseEvent::Found(name)) => {
                    tracing::info!("mDNS found service: {}", name);
                }
                Ok(BrowseEvent::Resolved(advertisement)) => {
                    tracing::debug!(
                        "Resolved {}: addresses={:?} port={}",
                        advertisement.instance_name,
                        advertisement.addresses,
                        advertisement.port
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = handler(advertisement) => {}
                    }
                }
                Ok(BrowseEvent::Removed(name)) => {
                    tracing::debug!("Service removed: {}", name);
                }
                Err(_) => {
                    tracing::debug!("Event source for {} closed", kind);
                    break;
                }
            },
        }
    }

    drop(session);
}

/// Probes every advertised connect service; the first reachable
/// address and port is recorded in `state`.
pub fn connect_match_handler<B: Bridge>(
    prober: Arc<PortProber<B>>,
    configured_ports: Arc<[u16]>,
    state: Arc<SessionState<ConnectionOutcome>>,
) -> Handler {
    Arc::new(move |advertisement: ServiceAdvertisement| -> HandlerFuture {
        let prober = prober.clone();
        let configured_ports = configured_ports.clone();
        let state = state.clone();

        Box::pin(async move {
            if state.is_found() {
                return;
            }

            let ports = candidate_ports(advertisement.port, &configured_ports);
            tracing::info!(
                "Trying {} on {:?} ports {:?}",
                advertisement.instance_name,
                advertisement.addresses,
                ports
            );

            if let Some(outcome) = prober.probe(&advertisement.addresses, &ports).await {
                state.record(outcome);
            }
        })
    })
}

/// Records the advertised port of the connect service running on `target`.
pub fn connect_port_handler(target: Ipv4Addr, state: Arc<SessionState<u16>>) -> Handler {
    Arc::new(move |advertisement: ServiceAdvertisement| -> HandlerFuture {
        let state = state.clone();

        Box::pin(async move {
            if advertisement.addresses.contains(&target) {
                state.record(advertisement.port);
            }
        })
    })
}

/// Runs the pairing handshake inline for the first advertisement whose
/// instance label equals the session's service id.
pub fn pairing_match_handler<B: Bridge, D: Discovery>(
    session: Arc<PairingSession>,
    handshake: Arc<Handshake<B, D>>,
) -> Handler {
    Arc::new(move |advertisement: ServiceAdvertisement| -> HandlerFuture {
        let session = session.clone();
        let handshake = handshake.clone();

        Box::pin(async move {
            if !session.accepts(&advertisement) {
                tracing::debug!(
                    "Ignoring {}: not our service id {}",
                    advertisement.instance_name,
                    session.credential().service_id
                );
                return;
            }

            let Some(&address) = advertisement.addresses.first() else {
                return;
            };

            if !session.begin() {
                tracing::debug!("Pairing already in progress, ignoring {}", advertisement.instance_name);
                return;
            }

            let target = SocketAddrV4::new(address, advertisement.port);
            tracing::info!("Found device {}, starting pairing", target);

            let report = handshake.run(target, &session.credential().password).await;
            session.report.record(report);
        })
    })
}

//! In-memory stand-ins for the network collaborators, used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use shared::types::{PairingCredential, ServiceAdvertisement, ServiceKind};
use crate::config::Timings;
use crate::error::DiscoveryError;
use crate::mdns::browser::{BrowseEvent, BrowseSession, Discovery};
use crate::present::Presenter;
use crate::wire::decode_length;

pub fn advertisement(
    kind: ServiceKind,
    label: &str,
    address: [u8; 4],
    port: u16,
) -> ServiceAdvertisement {
    ServiceAdvertisement {
        kind,
        instance_name: format!("{}.{}", label, kind.service_type()),
        addresses: vec![Ipv4Addr::from(address)],
        port,
    }
}

/// Short waits for tests that run on the real clock
pub fn fast_timings() -> Timings {
    Timings {
        poll_interval: Duration::from_millis(10),
        reconnect_window: Duration::from_millis(50),
        pairing_window: Duration::from_millis(500),
        resolve_window: Duration::from_millis(50),
        pair_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(2),
        server_timeout: Duration::from_secs(2),
        mdns_check_timeout: Duration::from_secs(2),
    }
}

/// Discovery that replays scripted advertisements.
///
/// Each browse of a kind takes the next scripted batch; once the batches
/// run out, browses see no advertisements. Sessions stay open until dropped.
#[derive(Default)]
pub struct FakeDiscovery {
    scripts: Mutex<HashMap<ServiceKind, VecDeque<Vec<ServiceAdvertisement>>>>,
    senders: Mutex<Vec<flume::Sender<BrowseEvent>>>,
    browses: Mutex<Vec<ServiceKind>>,
    closed: Arc<AtomicUsize>,
}

impl FakeDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, kind: ServiceKind, batch: Vec<ServiceAdvertisement>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(batch);
        self
    }

    pub fn browse_count(&self, kind: ServiceKind) -> usize {
        self.browses.lock().unwrap().iter().filter(|k| **k == kind).count()
    }

    pub fn closed_sessions(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Discovery for FakeDiscovery {
    fn browse(&self, kind: ServiceKind) -> Result<BrowseSession, DiscoveryError> {
        self.browses.lock().unwrap().push(kind);

        let batch = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();

        let (tx, rx) = flume::unbounded();
        for advertisement in batch {
            let _ = tx.send(BrowseEvent::Found(advertisement.instance_name.clone()));
            let _ = tx.send(BrowseEvent::Resolved(advertisement));
        }
        self.senders.lock().unwrap().push(tx);

        let closed = self.closed.clone();
        Ok(BrowseSession::new(kind, rx, move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Mutex<Vec<String>>,
}

impl Presenter for RecordingPresenter {
    fn present(&self, payload: &str, _credential: &PairingCredential) {
        self.shown.lock().unwrap().push(payload.to_string());
    }
}

/// One-shot bridge server on loopback: reads one framed request, answers
/// with `response` and hands back the raw request bytes.
pub async fn spawn_bridge_server(response: Vec<u8>) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut header = [0u8; 4];
        socket.read_exact(&mut header).await.unwrap();
        let mut command = vec![0u8; decode_length(&header).unwrap()];
        socket.read_exact(&mut command).await.unwrap();
        socket.write_all(&response).await.unwrap();

        let mut request = header.to_vec();
        request.extend_from_slice(&command);
        request
    });

    (addr, handle)
}

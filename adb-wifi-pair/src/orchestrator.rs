//! Top-level pairing flow.
//!
//! 1. Look for an already-paired device on the connect service and try to
//!    reach it; if that works, stop.
//! 2. Otherwise show the QR invitation and wait for a pairing advertisement
//!    carrying our service id. The handshake runs on the listener's task the
//!    moment the first match arrives; this side only polls for the report.

use std::sync::Arc;
use tracing::{debug, info, warn};
use shared::protocol::invitation_payload;
use shared::types::{ConnectionOutcome, PairingCredential, ServiceKind};
use crate::bridge::Bridge;
use crate::config::Timings;
use crate::error::DiscoveryError;
use crate::mdns::browser::Discovery;
use crate::mdns::listener::{
    connect_match_handler, pairing_match_handler, Listener, PairingSession, SessionState,
};
use crate::pairing::Handshake;
use crate::poll::PollDeadline;
use crate::present::Presenter;
use crate::probe::PortProber;
use crate::report::{PairingReport, Stage};
use crate::resolver::ConnectPortResolver;
use crate::wire::WireClient;

pub struct Orchestrator<B, D> {
    bridge: Arc<B>,
    discovery: Arc<D>,
    presenter: Arc<dyn Presenter>,
    prober: Arc<PortProber<B>>,
    handshake: Arc<Handshake<B, D>>,
    connect_ports: Arc<[u16]>,
    timings: Timings,
}

impl<B: Bridge, D: Discovery> Orchestrator<B, D> {
    pub fn new(
        bridge: Arc<B>,
        discovery: Arc<D>,
        presenter: Arc<dyn Presenter>,
        wire: WireClient,
        connect_ports: Vec<u16>,
        timings: Timings,
    ) -> Self {
        let connect_ports: Arc<[u16]> = Arc::from(connect_ports);
        let prober = Arc::new(PortProber::new(bridge.clone(), timings.connect_timeout));
        let resolver =
            ConnectPortResolver::new(discovery.clone(), timings.resolve_window, timings.poll_interval);
        let handshake = Arc::new(Handshake::new(
            bridge.clone(),
            wire,
            resolver,
            prober.clone(),
            connect_ports.clone(),
            timings.pair_timeout,
        ));

        Self {
            bridge,
            discovery,
            presenter,
            prober,
            handshake,
            connect_ports,
            timings,
        }
    }

    /// Runs the whole flow. Only an unusable discovery facility is an error;
    /// every other ending is a report.
    pub async fn run(
        &self,
        credential: &PairingCredential,
        connect_only: bool,
    ) -> Result<PairingReport, DiscoveryError> {
        self.preflight().await;

        if let Some(outcome) = self.reconnect().await? {
            return Ok(PairingReport::Reconnected(outcome));
        }
        if connect_only {
            return Ok(PairingReport::NoPairedDevice);
        }

        info!("No paired device reachable, starting QR pairing");
        self.pair(credential).await
    }

    /// The bridge's own mDNS self-test. Informational only.
    async fn preflight(&self) {
        match self.bridge.mdns_check(self.timings.mdns_check_timeout).await {
            Ok(output) if !output.success() => {
                warn!("mdns check reported a problem: {}", output.stdout.trim());
            }
            Ok(output) => debug!("mdns check: {}", output.stdout.trim()),
            Err(e) => warn!("mdns check failed: {}", e),
        }
    }

    /// Looks for a connect advertisement that accepts a connection within
    /// the reconnect window.
    pub async fn reconnect(&self) -> Result<Option<ConnectionOutcome>, DiscoveryError> {
        info!(stage = %Stage::Reconnect, "Looking for an already-paired device");

        let state = Arc::new(SessionState::new());
        let session = self.discovery.browse(ServiceKind::Connect)?;
        let handler = connect_match_handler(self.prober.clone(), self.connect_ports.clone(), state.clone());
        let listener = Listener::spawn(session, handler);

        let mut deadline = PollDeadline::new(self.timings.reconnect_window, self.timings.poll_interval);
        let outcome = loop {
            if let Some(outcome) = state.get() {
                break Some(outcome);
            }
            if !deadline.tick().await {
                break state.get();
            }
        };

        listener.shutdown().await;

        if let Some(outcome) = outcome {
            info!("Connected to {} without pairing", outcome);
        }
        Ok(outcome)
    }

    /// Shows the invitation and waits for the listener to finish a handshake.
    pub async fn pair(&self, credential: &PairingCredential) -> Result<PairingReport, DiscoveryError> {
        let payload = invitation_payload(&credential.service_id, &credential.password);
        self.presenter.present(&payload, credential);

        let session = Arc::new(PairingSession::new(credential.clone()));
        let browse = self.discovery.browse(ServiceKind::Pairing)?;
        let handler = pairing_match_handler(session.clone(), self.handshake.clone());
        let listener = Listener::spawn(browse, handler);

        info!(
            stage = %Stage::PairingAdvertised,
            "Waiting up to {:?} for device {}",
            self.timings.pairing_window,
            credential.service_id
        );

        let mut deadline = PollDeadline::new(self.timings.pairing_window, self.timings.poll_interval);
        let report = loop {
            if let Some(report) = session.report() {
                break report;
            }

            if session.is_matched() {
                // Handshake in progress; its own timeouts bound the wait
                if listener.is_finished() {
                    break session.report().unwrap_or_else(|| PairingReport::BridgeFailed {
                        stage: Stage::PairingMatched,
                        detail: "pairing handshake aborted".to_string(),
                    });
                }
                tokio::time::sleep(deadline.interval()).await;
                continue;
            }

            if !deadline.tick().await && !session.is_matched() {
                break PairingReport::NoPairingMatch;
            }
        };

        listener.shutdown().await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
    use std::time::Duration;
    use tokio::time::Instant;
    use crate::bridge::{BridgeOutput, MockBridge};
    use crate::testing::{
        advertisement, fast_timings, spawn_bridge_server, FakeDiscovery, RecordingPresenter,
    };

    const SERVICE_ID: &str = "studio-ab12cd34";
    const PASSWORD: &str = "pw123456";

    fn credential() -> PairingCredential {
        PairingCredential {
            service_id: SERVICE_ID.to_string(),
            password: PASSWORD.to_string(),
        }
    }

    fn output(status: i32, stdout: &str, stderr: &str) -> BridgeOutput {
        BridgeOutput {
            status: Some(status),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn default_timings() -> Timings {
        crate::config::Config::default().timings()
    }

    fn bridge() -> MockBridge {
        let mut bridge = MockBridge::new();
        bridge
            .expect_mdns_check()
            .returning(|_| Ok(output(0, "mdns daemon version [Openscreen discovery 0.0.0]", "")));
        bridge
    }

    fn unused_server() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    fn orchestrator(
        bridge: MockBridge,
        discovery: Arc<FakeDiscovery>,
        presenter: Arc<RecordingPresenter>,
        server: SocketAddr,
        timings: Timings,
    ) -> Orchestrator<MockBridge, FakeDiscovery> {
        Orchestrator::new(
            Arc::new(bridge),
            discovery,
            presenter,
            WireClient::new(server, timings.server_timeout),
            vec![5555],
            timings,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_short_circuits_pairing() {
        let mut bridge = bridge();
        bridge
            .expect_connect()
            .withf(|t, _| *t == SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 50), 5556))
            .times(1)
            .returning(|t, _| Ok(output(0, &format!("connected to {}\n", t), "")));
        bridge.expect_pair().never();

        let discovery = Arc::new(FakeDiscovery::new().script(
            ServiceKind::Connect,
            vec![advertisement(ServiceKind::Connect, "adb-R5CT12345", [192, 168, 1, 50], 5556)],
        ));
        let presenter = Arc::new(RecordingPresenter::default());

        let report = orchestrator(bridge, discovery.clone(), presenter.clone(), unused_server(), default_timings())
            .run(&credential(), false)
            .await
            .unwrap();

        assert_eq!(
            report,
            PairingReport::Reconnected(ConnectionOutcome {
                address: Ipv4Addr::new(192, 168, 1, 50),
                port: 5556
            })
        );
        assert_eq!(report.exit_code(), 0);
        assert!(presenter.shown.lock().unwrap().is_empty());
        assert_eq!(discovery.browse_count(ServiceKind::Pairing), 0);
        assert_eq!(discovery.closed_sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_times_out_after_window_every_time() {
        let discovery = Arc::new(FakeDiscovery::new());
        let orchestrator = orchestrator(
            bridge(),
            discovery.clone(),
            Arc::new(RecordingPresenter::default()),
            unused_server(),
            default_timings(),
        );

        for _ in 0..3 {
            let start = Instant::now();
            assert_eq!(orchestrator.reconnect().await.unwrap(), None);
            assert_eq!(start.elapsed(), Duration::from_secs(5));
        }
        assert_eq!(discovery.closed_sessions(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_only_without_device() {
        let discovery = Arc::new(FakeDiscovery::new());
        let presenter = Arc::new(RecordingPresenter::default());

        let report = orchestrator(bridge(), discovery.clone(), presenter.clone(), unused_server(), default_timings())
            .run(&credential(), true)
            .await
            .unwrap();

        assert_eq!(report, PairingReport::NoPairedDevice);
        assert_eq!(report.exit_code(), 1);
        assert!(presenter.shown.lock().unwrap().is_empty());
        assert_eq!(discovery.browse_count(ServiceKind::Pairing), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_pairing_then_resolved_connect() {
        let mut bridge = bridge();
        bridge
            .expect_pair()
            .withf(|t, password, timeout| {
                *t == SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 60), 37000)
                    && password == PASSWORD
                    && *timeout == Duration::from_secs(20)
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(output(0, "Successfully paired to 192.168.1.60:37000 [guid=adb-R5CT12345-x]\n", ""))
            });
        bridge
            .expect_connect()
            .withf(|t, _| *t == SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 60), 5557))
            .times(1)
            .returning(|t, _| Ok(output(0, &format!("connected to {}\n", t), "")));

        let discovery = Arc::new(
            FakeDiscovery::new()
                // Reconnect browse sees nothing; the later connect-port lookup sees the device
                .script(ServiceKind::Connect, vec![])
                .script(
                    ServiceKind::Connect,
                    vec![advertisement(ServiceKind::Connect, "adb-R5CT12345", [192, 168, 1, 60], 5557)],
                )
                .script(
                    ServiceKind::Pairing,
                    vec![
                        advertisement(ServiceKind::Pairing, "studio-someoneelse", [192, 168, 1, 70], 41000),
                        advertisement(ServiceKind::Pairing, SERVICE_ID, [192, 168, 1, 60], 37000),
                    ],
                ),
        );
        let presenter = Arc::new(RecordingPresenter::default());

        let report = orchestrator(bridge, discovery.clone(), presenter.clone(), unused_server(), default_timings())
            .run(&credential(), false)
            .await
            .unwrap();

        assert_eq!(
            report,
            PairingReport::Connected(ConnectionOutcome {
                address: Ipv4Addr::new(192, 168, 1, 60),
                port: 5557
            })
        );
        assert_eq!(
            *presenter.shown.lock().unwrap(),
            vec!["WIFI:T:ADB;S:studio-ab12cd34;P:pw123456;;".to_string()]
        );
        // reconnect, pairing and connect-port sessions all released
        assert_eq!(discovery.closed_sessions(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_match_pairs_once() {
        let mut bridge = bridge();
        bridge
            .expect_pair()
            .times(1)
            .returning(|_, _, _| Ok(output(0, "Successfully paired", "")));
        bridge
            .expect_connect()
            .returning(|t, _| Ok(output(0, &format!("connected to {}\n", t), "")));

        let ours = advertisement(ServiceKind::Pairing, SERVICE_ID, [192, 168, 1, 60], 37000);
        let discovery = Arc::new(
            FakeDiscovery::new().script(ServiceKind::Pairing, vec![ours.clone(), ours.clone(), ours]),
        );

        let report = orchestrator(
            bridge,
            discovery,
            Arc::new(RecordingPresenter::default()),
            unused_server(),
            default_timings(),
        )
        .pair(&credential())
        .await
        .unwrap();

        assert!(matches!(report, PairingReport::Connected(_)));
    }

    #[tokio::test]
    async fn test_fallback_okay_without_connect_port_is_paired_only() {
        let (server, requests) = spawn_bridge_server(b"OKAY".to_vec()).await;

        let mut bridge = bridge();
        bridge
            .expect_pair()
            .times(1)
            .returning(|_, _, _| Ok(output(1, "", "unknown command")));
        bridge.expect_connect().never();

        let discovery = Arc::new(FakeDiscovery::new().script(
            ServiceKind::Pairing,
            vec![advertisement(ServiceKind::Pairing, SERVICE_ID, [192, 168, 1, 60], 37000)],
        ));

        let report = orchestrator(
            bridge,
            discovery,
            Arc::new(RecordingPresenter::default()),
            server,
            fast_timings(),
        )
        .run(&credential(), false)
        .await
        .unwrap();

        assert_eq!(
            report,
            PairingReport::PairedNotConnected {
                address: Ipv4Addr::new(192, 168, 1, 60),
                pairing_port: 37000
            }
        );
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            requests.await.unwrap(),
            b"0025host:pair:pw123456:192.168.1.60:37000".to_vec()
        );
    }

    #[tokio::test]
    async fn test_fallback_fail_carries_message() {
        let (server, _requests) = spawn_bridge_server(b"FAIL000bbad request".to_vec()).await;

        let mut bridge = bridge();
        bridge
            .expect_pair()
            .returning(|_, _, _| Ok(output(1, "", "unknown command")));
        bridge.expect_connect().never();

        let discovery = Arc::new(FakeDiscovery::new().script(
            ServiceKind::Pairing,
            vec![advertisement(ServiceKind::Pairing, SERVICE_ID, [192, 168, 1, 60], 37000)],
        ));

        let report = orchestrator(
            bridge,
            discovery,
            Arc::new(RecordingPresenter::default()),
            server,
            fast_timings(),
        )
        .run(&credential(), false)
        .await
        .unwrap();

        assert_eq!(
            report,
            PairingReport::FallbackRejected {
                message: "bad request".to_string()
            }
        );
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed_stage(), Some(Stage::PairFallback));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pairing_advertisement_times_out() {
        let mut bridge = bridge();
        bridge.expect_pair().never();

        let discovery = Arc::new(FakeDiscovery::new().script(
            ServiceKind::Pairing,
            vec![advertisement(ServiceKind::Pairing, "studio-someoneelse", [192, 168, 1, 70], 41000)],
        ));

        let start = Instant::now();
        let report = orchestrator(
            bridge,
            discovery.clone(),
            Arc::new(RecordingPresenter::default()),
            unused_server(),
            default_timings(),
        )
        .run(&credential(), false)
        .await
        .unwrap();

        assert_eq!(report, PairingReport::NoPairingMatch);
        assert_eq!(report.exit_code(), 1);
        // reconnect window plus pairing window
        assert_eq!(start.elapsed(), Duration::from_secs(65));
        assert_eq!(discovery.closed_sessions(), 2);
    }
}

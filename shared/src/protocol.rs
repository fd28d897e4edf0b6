/// mDNS service type advertised by a device waiting for a QR-code pairing
pub const PAIRING_SERVICE_TYPE: &str = "_adb-tls-pairing._tcp.local.";

/// mDNS service type advertised by a device that accepts TLS connections
pub const CONNECT_SERVICE_TYPE: &str = "_adb-tls-connect._tcp.local.";

/// Port the host-local bridge server listens on
pub const BRIDGE_SERVER_PORT: u16 = 5037;

/// Connect port tried when nothing else is configured
pub const DEFAULT_CONNECT_PORT: u16 = 5555;

/// Status tokens returned by the bridge server
pub const STATUS_OKAY: &[u8; 4] = b"OKAY";
pub const STATUS_FAIL: &[u8; 4] = b"FAIL";

/// Prefix of the raw pairing request
pub const HOST_PAIR_PREFIX: &str = "host:pair:";

/// Prefix of generated service ids
pub const SERVICE_ID_PREFIX: &str = "studio-";

/// Builds the payload encoded in the pairing QR code
pub fn invitation_payload(service_id: &str, password: &str) -> String {
    format!("WIFI:T:ADB;S:{};P:{};;", service_id, password)
}

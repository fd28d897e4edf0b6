use qrcode::render::unicode;
use qrcode::QrCode;
use shared::types::PairingCredential;

/// Shows the pairing invitation to the user.
pub trait Presenter: Send + Sync {
    fn present(&self, payload: &str, credential: &PairingCredential);
}

/// Prints the invitation as a QR code on stdout.
pub struct TerminalPresenter;

impl TerminalPresenter {
    pub fn render(payload: &str) -> Result<String, qrcode::types::QrError> {
        let code = QrCode::new(payload.as_bytes())?;
        // Inverted colours scan better on dark terminals
        Ok(code
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build())
    }
}

impl Presenter for TerminalPresenter {
    fn present(&self, payload: &str, credential: &PairingCredential) {
        println!("On the Android 11+ device, open Developer options > Wireless debugging");
        println!("and choose \"Pair device with QR code\", then scan:");
        match Self::render(payload) {
            Ok(image) => println!("{}", image),
            Err(e) => tracing::warn!("Failed to render QR code: {}", e),
        }
        println!(
            "Pairing code: serviceId={} password={}",
            credential.service_id, credential.password
        );
    }
}

use rand::Rng;
use shared::protocol::SERVICE_ID_PREFIX;
use shared::types::PairingCredential;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789$";
const RANDOM_LEN: usize = 8;

fn random_string(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Fresh service id and password for one pairing attempt
pub fn generate() -> PairingCredential {
    let mut rng = rand::thread_rng();
    PairingCredential {
        service_id: format!("{}{}", SERVICE_ID_PREFIX, random_string(&mut rng, RANDOM_LEN)),
        password: random_string(&mut rng, RANDOM_LEN),
    }
}

/// Uses the supplied pair only when both halves are present.
pub fn from_args_or_generate(service_id: Option<String>, password: Option<String>) -> PairingCredential {
    match (service_id, password) {
        (Some(service_id), Some(password)) => PairingCredential {
            service_id,
            password,
        },
        _ => generate(),
    }
}

use rand::distributions::Uniform;
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Draws `len` characters uniformly from `alphabet`.
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    let pick = Uniform::from(0..alphabet.len());
    (0..len)
        .map(|_| alphabet[rng.sample(pick)] as char)
        .collect()
}

/// Lowercase base-36 token, used for player id suffixes and environment seeds.
pub fn base36_token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    random_string(rng, BASE36, len)
}

//! Emits a fresh 32-byte AES-256 key, hex-encoded, on stdout.

use rand::RngCore;

fn main() {
    let mut key = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key);
    println!("{}", hex::encode(key));
}

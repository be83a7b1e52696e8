//! Node-side records that live next to the connection graph.
//!
//! # Types
//!
//! - [`Profile`] - Extended personal and business details of an account
//! - [`Query`] - A message submitted through the public contact form

mod profile;
mod query;

pub use profile::Profile;
pub use query::Query;

use rand::RngCore;

/// Generate an opaque 32-hex-character id.
///
/// Hashes `seed` together with the current time and a random nonce, so two
/// calls with the same seed still differ.
pub fn generate_id(seed: &str) -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);

    let mut hasher = blake3::Hasher::new();
    hasher.update(seed.as_bytes());
    hasher.update(&rapport_graph::now_millis().to_le_bytes());
    hasher.update(&nonce);
    let hash = hasher.finalize();
    hex::encode(&hash.as_bytes()[..16])
}

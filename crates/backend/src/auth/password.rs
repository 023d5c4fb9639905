//! Keyed one-way password hashing (HMAC-SHA256, hex encoded).

use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

// Verified against when the account does not exist, so an unknown email
// costs the same MAC computation as a wrong password.
const ABSENT_ACCOUNT_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

pub struct PasswordHasher {
    mac: HmacSha256,
}

impl PasswordHasher {
    pub fn new(secret: &str) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    pub fn hash(&self, password: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(password.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison against a stored hash.
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(expected) = hex::decode(stored_hash) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(password.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Burn one verification for a login against a missing account.
    pub fn verify_absent(&self, password: &str) -> bool {
        self.verify(password, ABSENT_ACCOUNT_HASH);
        false
    }
}

//! Deterministic contact-channel routing.
//!
//! Every listing is assigned to one of two fixed WhatsApp channels by the
//! parity of the MD5 digest of its id. The assignment is a stable partition:
//! no clock, no randomness, constant across calls and restarts.

use anyhow::{bail, Result};
use md5::{Digest, Md5};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

#[derive(Debug, Clone)]
pub struct ContactRouter {
    channel_a: String,
    channel_b: String,
}

impl ContactRouter {
    /// Both channel values are required and non-empty; a missing channel is
    /// fatal at startup.
    pub fn new(channel_a: String, channel_b: String) -> Result<Self> {
        if channel_a.is_empty() || channel_b.is_empty() {
            bail!("WHATSAPP_A and WHATSAPP_B must both be configured and non-empty");
        }
        Ok(Self {
            channel_a,
            channel_b,
        })
    }

    /// Which of the two channels serves `listing_id`.
    ///
    /// The digest is read as a 128-bit hex integer; its parity is the parity
    /// of the low byte, so only the final digest byte is inspected.
    pub fn assign(&self, listing_id: &str) -> Channel {
        let digest = Md5::digest(listing_id.as_bytes());
        if digest[15] % 2 == 0 {
            Channel::A
        } else {
            Channel::B
        }
    }

    /// The contact value (phone number) for `listing_id`.
    pub fn route(&self, listing_id: &str) -> &str {
        match self.assign(listing_id) {
            Channel::A => &self.channel_a,
            Channel::B => &self.channel_b,
        }
    }

    /// Both configured channel values, for the public contact endpoint.
    pub fn channels(&self) -> (&str, &str) {
        (&self.channel_a, &self.channel_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ContactRouter {
        ContactRouter::new("+5511900000001".to_string(), "+5511900000002".to_string())
            .expect("valid channels")
    }

    #[test]
    fn empty_channel_is_rejected() {
        assert!(ContactRouter::new(String::new(), "+55".to_string()).is_err());
        assert!(ContactRouter::new("+55".to_string(), String::new()).is_err());
    }

    #[test]
    fn routing_is_deterministic() {
        let router = router();
        let id = "a2f1c9d0-1234-4cde-8f00-abcdef012345";
        let first = router.route(id).to_string();
        for _ in 0..100 {
            assert_eq!(router.route(id), first);
        }
    }

    #[test]
    fn routing_matches_digest_parity() {
        let router = router();
        // md5("hello") = 5d41402abc4b2a76b9719d911017c592 -> even low nibble
        assert_eq!(
            hex::encode(Md5::digest(b"hello")),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(router.assign("hello"), Channel::A);
        // md5("world") = 7d793037a0760186574b0282f2f435e7 -> odd low nibble
        assert_eq!(
            hex::encode(Md5::digest(b"world")),
            "7d793037a0760186574b0282f2f435e7"
        );
        assert_eq!(router.assign("world"), Channel::B);
    }

    #[test]
    fn both_channels_are_used_over_a_sample() {
        let router = router();
        let mut seen_a = false;
        let mut seen_b = false;
        for i in 0..1000 {
            match router.assign(&format!("listing-{}", i)) {
                Channel::A => seen_a = true,
                Channel::B => seen_b = true,
            }
            if seen_a && seen_b {
                return;
            }
        }
        panic!("assignment is degenerate: only one channel selected over 1000 ids");
    }
}

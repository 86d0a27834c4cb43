//! Short unique identifier minting
//!
//! Identifiers are drawn uniformly from `[A-Za-z0-9]`. A draw that collides
//! with the pool is retried up to `max_attempts` times; after that the
//! length grows by one and the bounded retry starts again. A duplicate is
//! never returned.

use rand::Rng;
use tracing::{debug, warn};

use super::store::IdentifierStore;
use crate::error::MintError;

pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

#[derive(Debug)]
pub struct IdentifierMint<S> {
    store: S,
    max_attempts: usize,
}

impl<S: IdentifierStore> IdentifierMint<S> {
    pub fn new(store: S) -> Self {
        Self::with_max_attempts(store, DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(store: S, max_attempts: usize) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Mint a fresh identifier and persist it to the pool before returning.
    pub fn mint<R: Rng + ?Sized>(&mut self, rng: &mut R, length: usize) -> Result<String, MintError> {
        if length == 0 {
            return Err(MintError::ZeroLength);
        }

        let mut length = length;
        loop {
            for _ in 0..self.max_attempts {
                let candidate = draw(rng, length);
                if !self.store.contains(&candidate) {
                    self.store.insert(candidate.clone())?;
                    debug!(id = %candidate, pool = self.store.len(), "Minted identifier");
                    return Ok(candidate);
                }
            }
            warn!(
                length,
                attempts = self.max_attempts,
                "Identifier space congested, widening length"
            );
            length += 1;
        }
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

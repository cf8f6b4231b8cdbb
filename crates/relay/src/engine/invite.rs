// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invite code generation.

use rand::Rng;

/// Lowercase consonants only, so codes never spell words.
pub const INVITE_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxyz";

/// Default invite code length.
pub const DEFAULT_CODE_LEN: usize = 5;

/// Source of invite codes.
///
/// The registry checks candidates against outstanding codes, so an
/// implementation only needs to produce well-spread strings.
pub trait InviteCodes: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniformly random codes over [`INVITE_ALPHABET`].
#[derive(Debug, Clone)]
pub struct RandomCodes {
    len: usize,
}

impl RandomCodes {
    pub fn new(len: usize) -> Self {
        Self { len: len.max(1) }
    }
}

impl Default for RandomCodes {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LEN)
    }
}

impl InviteCodes for RandomCodes {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.len)
            .map(|_| char::from(INVITE_ALPHABET[rng.random_range(0..INVITE_ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
#[path = "invite_tests.rs"]
mod tests;

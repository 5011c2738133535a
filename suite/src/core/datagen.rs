//! Unique test data generation.
//!
//! Names embed the run slot (worker index + retry number) so parallel workers
//! and retries never collide. Generators take the clock and RNG as arguments;
//! `io::test_data` supplies the local clock and thread RNG.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::core::types::RegistrationForm;

/// Prefix shared by every generated entity name.
pub const TEST_PREFIX: &str = "PW";

const LOWER_ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Identifies the worker process and retry attempt that generated a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSlot {
    pub worker: u32,
    pub retry: u32,
}

impl RunSlot {
    pub fn new(worker: u32, retry: u32) -> Self {
        Self { worker, retry }
    }

    fn tag(self) -> String {
        format!("w{}r{}", self.worker, self.retry)
    }
}

fn random_from<R: Rng>(rng: &mut R, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}

fn timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn entropy<Tz: TimeZone, R: Rng>(
    now: &DateTime<Tz>,
    slot: RunSlot,
    rng: &mut R,
    len: usize,
) -> String {
    let millis = now.timestamp_subsec_millis() % 1000;
    format!(
        "{}{:03}{}",
        slot.tag(),
        millis,
        random_from(rng, LOWER_ALNUM, len)
    )
}

fn entity_name<Tz: TimeZone, R: Rng>(
    entity: &str,
    now: &DateTime<Tz>,
    slot: RunSlot,
    rng: &mut R,
) -> String {
    format!(
        "{TEST_PREFIX}_{entity}_{}_{}",
        timestamp(now),
        entropy(now, slot, rng, 3)
    )
}

/// Unique inbox address, e.g. `em_192230w0r0a@mailinator.com`.
///
/// Kept short because public inbox UIs truncate long local parts.
pub fn email<Tz: TimeZone, R: Rng>(
    domain: &str,
    now: &DateTime<Tz>,
    slot: RunSlot,
    rng: &mut R,
) -> String {
    format!(
        "em_{:02}{:02}{:02}{}{}@{}",
        now.day(),
        now.hour(),
        now.minute(),
        slot.tag(),
        random_from(rng, LOWER_ALNUM, 1),
        domain
    )
    .to_lowercase()
}

pub fn group_name<Tz: TimeZone, R: Rng>(now: &DateTime<Tz>, slot: RunSlot, rng: &mut R) -> String {
    entity_name("Group", now, slot, rng)
}

pub fn chat_message<Tz: TimeZone, R: Rng>(
    now: &DateTime<Tz>,
    slot: RunSlot,
    rng: &mut R,
) -> String {
    entity_name("Chat", now, slot, rng)
}

pub fn first_name<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(4..=6);
    format!("First{}", random_from(rng, LETTERS, len))
}

pub fn last_name<R: Rng>(rng: &mut R) -> String {
    let len = rng.gen_range(4..=6);
    format!("Last{}", random_from(rng, LETTERS, len))
}

/// Registration fields for `email` with generated names.
pub fn registration_form<R: Rng>(rng: &mut R, email: &str, password: &str) -> RegistrationForm {
    RegistrationForm {
        first_name: first_name(rng),
        last_name: last_name(rng),
        email: email.to_string(),
        password: password.to_string(),
    }
}

/// Short free-text token for descriptions.
pub fn token<R: Rng>(rng: &mut R, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

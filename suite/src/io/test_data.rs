//! Test data generated from the local clock and the thread RNG.
//!
//! Thin wrappers over [`crate::core::datagen`] for callers that need fresh,
//! unique values at the moment of use.

use chrono::Local;

use crate::core::datagen::{self, RunSlot};
use crate::core::types::RegistrationForm;

pub fn email(domain: &str, slot: RunSlot) -> String {
    datagen::email(domain, &Local::now(), slot, &mut rand::thread_rng())
}

pub fn group_name(slot: RunSlot) -> String {
    datagen::group_name(&Local::now(), slot, &mut rand::thread_rng())
}

pub fn chat_message(slot: RunSlot) -> String {
    datagen::chat_message(&Local::now(), slot, &mut rand::thread_rng())
}

pub fn registration_form(email: &str, password: &str) -> RegistrationForm {
    datagen::registration_form(&mut rand::thread_rng(), email, password)
}

pub fn token(len: usize) -> String {
    datagen::token(&mut rand::thread_rng(), len)
}

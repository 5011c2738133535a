//! Concrete scenario chains built on the `suite` core.
//!
//! Each module drives one feature area through collaborator traits that the
//! browser layer implements. Dependent steps run inside a
//! [`suite::scenario::ChainRunner`] and hand their outputs to later steps
//! explicitly; facts other chains rely on are written to the runtime store.

pub mod auth_setup;
pub mod chat;
pub mod group;
pub mod password_reset;
pub mod registration;

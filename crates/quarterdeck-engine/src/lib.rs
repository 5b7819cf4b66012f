//! The conversation engine.
//!
//! One entry point, [`engine::WizardEngine::handle_event`], drives every
//! session through the menu/wizard state machine: authorization first, then
//! a transition keyed on the session's current state and the decoded event.
//! Repository calls only ever happen inside transitions, and a failed call
//! never advances session state.

pub mod auth;
pub mod engine;
pub mod store;

pub use auth::{Authorizer, StaticAllowList};
pub use engine::WizardEngine;
pub use store::{SessionKey, SessionStore};

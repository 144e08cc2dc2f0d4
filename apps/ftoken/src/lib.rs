//! ftoken client library
//!
//! Keeps a short-lived form token (ftoken) bound to the value of a key field,
//! so a form can only be submitted once a fresh token has been fetched for
//! the current key value, and renews that token shortly before it expires.

pub mod config;
pub mod controller;
pub mod document;
pub mod encoding;
pub mod error;
pub mod fetch;
pub mod renewal;
pub mod submit_gate;

pub use controller::{Controller, ControllerHandle, Event};
pub use document::{Document, Form, IssuedToken};
pub use error::{FetchError, FtokenError, FtokenResult};
pub use fetch::{FetchRequest, HttpTokenFetcher, TokenFetcher};
pub use renewal::{RenewalManager, RenewalState};

//! Common test utilities and helpers
//!
//! This module provides shared functionality for all tests.


pub use fixtures::{login_form, settle, RecordingFetcher, TOKEN_URL};

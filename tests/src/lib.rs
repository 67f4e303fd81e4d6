//! # Provider Bridge Test Suite
//!
//! End-to-end tests that drive a [`provider_bridge::TabController`] the way
//! the browser screen does: raw page messages in, injected scripts out.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs     # In-memory frame, backend, signer and UI
//!     ├── flows.rs        # Request/response, streams, frames, teardown
//!     └── permissions.rs  # Account disclosure and the approval prompt
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bridge-tests
//! cargo test -p bridge-tests integration::permissions::
//! ```

#![allow(dead_code)]

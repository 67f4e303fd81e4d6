//! Host-facing traits.

pub mod outbound;

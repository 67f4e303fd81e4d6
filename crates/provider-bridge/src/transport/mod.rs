//! Page transport: frame ports, stream multiplexing and message decoding.

pub mod message;
pub mod mux;
pub mod port;

pub use message::{IronmanMessage, PageMessage, PortMessage, TabEvent, SIGN_PROVIDER};
pub use mux::{FrameSink, Multiplexer, MuxFrame, MuxReader, MuxStream, MuxWriter};
pub use port::Port;

//! WebSocket layer: upgrade handler, session pump, inbound decoding.
//!
//! The endpoint at `/subscribe` streams every world change to the client
//! and accepts `{"<entity>": {..}}` writes from it.

pub mod handler;
pub mod messages;
pub mod session;

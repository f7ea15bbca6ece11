//! # worldcast
//!
//! Shared key-value world state with real-time change broadcast.
//!
//! Writers mutate entities over REST or over the `/subscribe` WebSocket;
//! every mutation is pushed, in order, to every connected subscriber.
//! Each subscriber drains its own bounded queue, so a slow connection
//! never stalls writers or other subscribers.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── SubscriberSession (ws/) ── reader task / writer loop
//!     │
//!     ├── SharedState (domain/)
//!     │       │ on_change
//!     │       ▼
//!     └── BroadcastRouter (domain/) ── one queue per subscriber
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod ws;

//! Domain layer: world state, change events, and subscriber fan-out.
//!
//! This module contains the shared world container with its listener
//! registry, the change event and its wire encoding, subscriber identity,
//! and the broadcast router that feeds every live session's queue.

pub mod broadcast_router;
pub mod change_event;
pub mod shared_state;
pub mod subscriber_id;

pub use broadcast_router::{BroadcastRouter, OutboundMessage, Subscription};
pub use change_event::{Attributes, ChangeEvent, World};
pub use shared_state::{ChangeListener, SharedState};
pub use subscriber_id::SubscriberId;

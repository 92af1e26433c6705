//! # MQTT Messaging Client
//!
//! Connects the control application to remote sensor nodes over an MQTT
//! broker: sensor readings flow in, device commands flow out. The consumer
//! (whatever renders current values) never touches the network directly; it
//! polls the client for buffered messages and connection status on its own
//! schedule.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── topics.rs  - Logical topic name -> wire topic resolution
//! ├── message.rs - Inbound message representation and the FIFO queue
//! ├── link.rs    - Broker session ownership and the event-loop task
//! ├── client.rs  - Public façade composing the pieces above
//! └── error.rs   - Error definitions
//! ```
//!
//! ## Design Philosophy
//!
//! - **Two execution contexts, one synchronization point**: the spawned
//!   event-loop task is the only producer; the consumer drains an unbounded
//!   queue. Connection state crosses over through a watch channel, nothing
//!   else is shared.
//! - **Errors stay inside the boundary**: publish and connect report failure
//!   as `false` and log the cause. No core failure may break the consumer's
//!   polling loop.
//! - **Disconnects are observed, not healed**: a dropped session flips the
//!   status flag; reconnecting is the caller's decision.

pub mod client;
pub mod error;
pub mod link;
pub mod message;
pub mod topics;

//! Client side of the peer mesh: every pair of players in a room keeps one
//! direct media connection, negotiated through the server's signaling relay.

pub mod coordinator;
pub mod driver;
pub mod election;
pub mod errors;

pub use coordinator::*;
pub use driver::*;
pub use election::*;
pub use errors::*;

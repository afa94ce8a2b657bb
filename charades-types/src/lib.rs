pub mod errors;
pub mod game;
pub mod messages;
pub mod player;

// Re-export all types
pub use errors::*;
pub use game::*;
pub use messages::*;
pub use player::*;

/// Opaque, client-assigned identity that stays stable for a browser tab's lifetime.
pub type PlayerId = String;

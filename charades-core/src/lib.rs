pub mod effects;
pub mod errors;
pub mod room;
pub mod room_code;
pub mod round;
pub mod scoring;
pub mod settings;
pub mod word_bank;

pub use effects::*;
pub use errors::*;
pub use room::*;
pub use room_code::*;
pub use round::*;
pub use scoring::*;
pub use settings::*;
pub use word_bank::*;

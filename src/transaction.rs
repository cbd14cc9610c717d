//! Transfer transactions, split into value types and the canonical text codec

pub mod codec;
pub mod types;

pub use codec::is_valid_participant_id;
pub use types::*;

//! Response Decoders
//!
//! Minecraft answers RCON commands with plain text meant for humans. This
//! module turns the two responses the platform depends on into typed data.
//!
//! ## Modules
//!
//! - `player_list`: `list` output into a [`PlayerList`]
//! - `entity_data`: `data get entity <name>` output into a [`PlayerData`]
//! - `extract`: the tolerant SNBT field extractor both build on
//!
//! ## Failure Policy
//!
//! Decoders never return errors. The usual failure is a format change in a
//! newer or older server version, and that must not break the request that
//! asked for the data. Entity data decodes to `None`; the player list
//! decodes to an empty list with a cap of 20.

pub mod entity_data;
pub mod extract;
pub mod player_list;

// Re-export commonly used types
pub use entity_data::{
    parse_entity_fields, parse_player_data, Abilities, EntityFields, MinecraftItem, PlayerData,
    Position, Rotation,
};
pub use extract::{Compound, Extracted};
pub use player_list::{parse_player_list, PlayerList};

//! Decoder for `data get entity <player>` output.
//!
//! The server answers with one line:
//!
//! ```text
//! Steve has the following entity data: {Health: 20.0f, foodLevel: 20, Pos: [...], ...}
//! ```
//!
//! Anything else (`No entity was found`, a permission error, an unknown
//! format) decodes to `None`. Fields that are missing or garbled fall back to
//! the game's own defaults for a fresh player.

use crate::parsing::extract::{parse_number, Compound, Extracted};
use serde::Serialize;

/// Text that precedes the SNBT payload.
pub const ENTITY_DATA_MARKER: &str = "has the following entity data:";

// Vanilla defaults for a freshly spawned player
pub const DEFAULT_HEALTH: f64 = 20.0;
pub const DEFAULT_FOOD_LEVEL: i32 = 20;
pub const DEFAULT_FOOD_SATURATION: f64 = 5.0;
pub const DEFAULT_AIR: i32 = 300;
pub const DEFAULT_FIRE: i32 = -20;
pub const DEFAULT_WALK_SPEED: f64 = 0.1;
pub const DEFAULT_FLY_SPEED: f64 = 0.05;
pub const DEFAULT_DIMENSION: &str = "overworld";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rotation {
    pub yaw: f64,
    pub pitch: f64,
}

/// Player abilities (`abilities` compound).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Abilities {
    pub flying: bool,
    pub may_fly: bool,
    pub invulnerable: bool,
    pub instabuild: bool,
    pub may_build: bool,
    pub walk_speed: f64,
    pub fly_speed: f64,
}

impl Default for Abilities {
    fn default() -> Self {
        Self {
            flying: false,
            may_fly: false,
            invulnerable: false,
            instabuild: false,
            may_build: true,
            walk_speed: DEFAULT_WALK_SPEED,
            fly_speed: DEFAULT_FLY_SPEED,
        }
    }
}

/// One stack in an inventory or ender chest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MinecraftItem {
    /// Namespaced item id, e.g. `minecraft:diamond_sword`
    pub id: String,
    pub count: i32,
    pub slot: i32,
    /// Raw SNBT of the item's `tag` (or 1.20.5+ `components`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Decoded snapshot of one player's entity data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerData {
    pub name: String,
    pub health: f64,
    pub food_level: i32,
    pub food_saturation: f64,
    pub xp_level: i32,
    pub xp_total: i32,
    /// 0 survival, 1 creative, 2 adventure, 3 spectator
    pub game_mode: i32,
    pub air: i32,
    pub fire: i32,
    pub selected_slot: i32,
    pub on_ground: bool,
    pub position: Position,
    pub rotation: Rotation,
    pub dimension: String,
    pub abilities: Abilities,
    pub inventory: Vec<MinecraftItem>,
    pub ender_chest: Vec<MinecraftItem>,
}

impl PlayerData {
    /// Human-readable game mode.
    pub fn game_mode_name(&self) -> &'static str {
        match self.game_mode {
            0 => "survival",
            1 => "creative",
            2 => "adventure",
            3 => "spectator",
            _ => "unknown",
        }
    }
}

/// Per-field extraction results, before defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFields {
    pub health: Extracted<f64>,
    pub food_level: Extracted<i64>,
    pub food_saturation: Extracted<f64>,
    pub xp_level: Extracted<i64>,
    pub xp_total: Extracted<i64>,
    pub game_mode: Extracted<i64>,
    pub air: Extracted<i64>,
    pub fire: Extracted<i64>,
    pub selected_slot: Extracted<i64>,
    pub on_ground: Extracted<bool>,
    pub position: Extracted<Position>,
    pub rotation: Extracted<Rotation>,
    pub dimension: Extracted<String>,
    pub abilities: Extracted<Abilities>,
    pub inventory: Extracted<Vec<MinecraftItem>>,
    pub ender_chest: Extracted<Vec<MinecraftItem>>,
}

impl EntityFields {
    /// Extracts every known field from a decoded compound.
    pub fn from_compound(data: &Compound<'_>) -> Self {
        Self {
            health: data.number("Health"),
            food_level: data.integer("foodLevel"),
            food_saturation: data.number("foodSaturationLevel"),
            xp_level: data.integer("XpLevel"),
            xp_total: data.integer("XpTotal"),
            game_mode: data.integer("playerGameType"),
            air: data.integer("Air"),
            fire: data.integer("Fire"),
            selected_slot: data.integer("SelectedItemSlot"),
            on_ground: data.flag("OnGround"),
            position: data.numbers("Pos", 3).map(|v| Position {
                x: round2(v[0]),
                y: round2(v[1]),
                z: round2(v[2]),
            }),
            rotation: data.numbers("Rotation", 2).map(|v| Rotation {
                yaw: round2(v[0]),
                pitch: round2(v[1]),
            }),
            dimension: dimension(data),
            abilities: data.compound("abilities").map(|a| abilities(&a)),
            inventory: data.compounds("Inventory").map(|items| decode_items(&items)),
            ender_chest: data.compounds("EnderItems").map(|items| decode_items(&items)),
        }
    }

    /// Applies the vanilla defaults to anything that wasn't parsed.
    pub fn into_player_data(self, name: &str) -> PlayerData {
        PlayerData {
            name: name.to_string(),
            health: self.health.or(DEFAULT_HEALTH),
            food_level: to_i32(self.food_level, DEFAULT_FOOD_LEVEL),
            food_saturation: self.food_saturation.or(DEFAULT_FOOD_SATURATION),
            xp_level: to_i32(self.xp_level, 0),
            xp_total: to_i32(self.xp_total, 0),
            game_mode: to_i32(self.game_mode, 0),
            air: to_i32(self.air, DEFAULT_AIR),
            fire: to_i32(self.fire, DEFAULT_FIRE),
            selected_slot: to_i32(self.selected_slot, 0),
            on_ground: self.on_ground.or(true),
            position: self.position.or_default(),
            rotation: self.rotation.or_default(),
            dimension: self.dimension.or(DEFAULT_DIMENSION.to_string()),
            abilities: self.abilities.or_default(),
            inventory: self.inventory.or_default(),
            ender_chest: self.ender_chest.or_default(),
        }
    }
}

/// Extracts the per-field results from raw command output.
///
/// Returns `None` if the output carries no entity data payload.
pub fn parse_entity_fields(raw: &str) -> Option<EntityFields> {
    let (_, payload) = raw.split_once(ENTITY_DATA_MARKER)?;
    let compound = Compound::parse(payload)?;
    Some(EntityFields::from_compound(&compound))
}

/// Decodes `data get entity` output into a [`PlayerData`].
///
/// Never fails loudly: output without the entity data marker, or whose
/// payload isn't a compound, yields `None`.
///
/// # Example
///
/// ```
/// use rconpool::parsing::parse_player_data;
///
/// let raw = "Alex has the following entity data: {Health: 15.0f, foodLevel: 18}";
/// let player = parse_player_data("Alex", raw).unwrap();
/// assert_eq!(player.health, 15.0);
/// assert_eq!(player.food_level, 18);
/// assert_eq!(player.dimension, "overworld");
/// ```
pub fn parse_player_data(name: &str, raw: &str) -> Option<PlayerData> {
    parse_entity_fields(raw).map(|fields| fields.into_player_data(name))
}

fn abilities(data: &Compound<'_>) -> Abilities {
    let defaults = Abilities::default();
    Abilities {
        flying: data.flag("flying").or(defaults.flying),
        may_fly: data.flag("mayfly").or(defaults.may_fly),
        invulnerable: data.flag("invulnerable").or(defaults.invulnerable),
        instabuild: data.flag("instabuild").or(defaults.instabuild),
        may_build: data.flag("mayBuild").or(defaults.may_build),
        walk_speed: data.number("walkSpeed").or(defaults.walk_speed),
        fly_speed: data.number("flySpeed").or(defaults.fly_speed),
    }
}

/// Items without a usable id are skipped.
fn decode_items(items: &[Compound<'_>]) -> Vec<MinecraftItem> {
    items
        .iter()
        .filter_map(|item| {
            let id = item.string("id").ok().filter(|id| !id.is_empty())?;
            // 1.20.5 renamed Count to count and tag to components
            let count = match item.integer("count") {
                Extracted::Absent => item.integer("Count"),
                other => other,
            };
            let tag = item.raw("tag").or_else(|| item.raw("components"));

            Some(MinecraftItem {
                id,
                count: to_i32(count, 1),
                slot: to_i32(item.integer("Slot"), 0),
                tag: tag.map(str::to_string),
            })
        })
        .collect()
}

fn to_i32(value: Extracted<i64>, default: i32) -> i32 {
    value
        .ok()
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(default)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `Dimension` as a namespaced id, or the numeric form older servers print.
fn dimension(data: &Compound<'_>) -> Extracted<String> {
    let Some(raw) = data.raw("Dimension") else {
        return Extracted::Absent;
    };
    if parse_number(raw).is_none() {
        return data.string("Dimension").map(|d| strip_namespace(&d).to_string());
    }
    match data.integer("Dimension") {
        Extracted::Parsed(-1) => Extracted::Parsed("the_nether".to_string()),
        Extracted::Parsed(0) => Extracted::Parsed("overworld".to_string()),
        Extracted::Parsed(1) => Extracted::Parsed("the_end".to_string()),
        _ => Extracted::Unparsable(raw.to_string()),
    }
}

fn strip_namespace(id: &str) -> &str {
    id.rsplit_once(':').map(|(_, path)| path).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DUMP: &str = r#"Notch has the following entity data: {AbsorptionAmount: 0.0f, Air: 250s, Attributes: [{Base: 0.10000000149011612d, Name: "minecraft:generic.movement_speed"}], Brain: {memories: {}}, DataVersion: 3465, DeathTime: 0s, Dimension: "minecraft:the_end", EnderItems: [{Count: 16b, Slot: 3b, id: "minecraft:ender_pearl"}], FallDistance: 0.0f, Fire: -20s, Health: 17.5f, Inventory: [{Count: 1b, Slot: 0b, id: "minecraft:diamond_sword", tag: {Damage: 12, Enchantments: [{id: "minecraft:sharpness", lvl: 5s}]}}, {Count: 64b, Slot: 1b, id: "minecraft:cobblestone"}, {Count: 3b, Slot: 2b}], OnGround: 0b, Pos: [100.123456d, 70.0d, -250.999d], Rotation: [91.256f, -12.5f], SelectedItemSlot: 4, XpLevel: 30, XpP: 0.5f, XpTotal: 1395, abilities: {flySpeed: 0.05f, flying: 1b, instabuild: 0b, invulnerable: 0b, mayBuild: 1b, mayfly: 1b, walkSpeed: 0.1f}, foodExhaustionLevel: 1.2f, foodLevel: 19, foodSaturationLevel: 3.5f, foodTickTimer: 0, playerGameType: 1}"#;

    #[test]
    fn test_minimal_entity_data() {
        let raw = "Steve has the following entity data: {Health: 15.0f, foodLevel: 18, Pos: [12.5d, 64.0d, -30.2d]}";
        let player = parse_player_data("Steve", raw).unwrap();

        assert_eq!(player.name, "Steve");
        assert_eq!(player.health, 15.0);
        assert_eq!(player.food_level, 18);
        assert_eq!(
            player.position,
            Position {
                x: 12.5,
                y: 64.0,
                z: -30.2
            }
        );
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let raw = "Steve has the following entity data: {}";
        let player = parse_player_data("Steve", raw).unwrap();

        assert_eq!(player.health, DEFAULT_HEALTH);
        assert_eq!(player.food_level, DEFAULT_FOOD_LEVEL);
        assert_eq!(player.food_saturation, DEFAULT_FOOD_SATURATION);
        assert_eq!(player.air, DEFAULT_AIR);
        assert_eq!(player.fire, DEFAULT_FIRE);
        assert_eq!(player.xp_level, 0);
        assert!(player.on_ground);
        assert_eq!(player.dimension, "overworld");
        assert_eq!(player.abilities, Abilities::default());
        assert!(player.inventory.is_empty());
        assert!(player.ender_chest.is_empty());
    }

    #[test]
    fn test_full_dump() {
        let player = parse_player_data("Notch", FULL_DUMP).unwrap();

        assert_eq!(player.health, 17.5);
        assert_eq!(player.food_level, 19);
        assert_eq!(player.food_saturation, 3.5);
        assert_eq!(player.xp_level, 30);
        assert_eq!(player.xp_total, 1395);
        assert_eq!(player.game_mode, 1);
        assert_eq!(player.game_mode_name(), "creative");
        assert_eq!(player.air, 250);
        assert_eq!(player.fire, -20);
        assert_eq!(player.selected_slot, 4);
        assert!(!player.on_ground);
        assert_eq!(player.dimension, "the_end");
        assert_eq!(
            player.position,
            Position {
                x: 100.12,
                y: 70.0,
                z: -251.0
            }
        );
        assert_eq!(
            player.rotation,
            Rotation {
                yaw: 91.26,
                pitch: -12.5
            }
        );

        assert!(player.abilities.flying);
        assert!(player.abilities.may_fly);
        assert!(!player.abilities.invulnerable);
        assert_eq!(player.abilities.fly_speed, 0.05);
    }

    #[test]
    fn test_items() {
        let player = parse_player_data("Notch", FULL_DUMP).unwrap();

        // The id-less stack in slot 2 is skipped
        assert_eq!(player.inventory.len(), 2);
        let sword = &player.inventory[0];
        assert_eq!(sword.id, "minecraft:diamond_sword");
        assert_eq!(sword.count, 1);
        assert_eq!(sword.slot, 0);
        assert!(sword.tag.as_deref().unwrap().contains("sharpness"));
        assert_eq!(player.inventory[1].count, 64);
        assert_eq!(player.inventory[1].tag, None);

        assert_eq!(
            player.ender_chest,
            vec![MinecraftItem {
                id: "minecraft:ender_pearl".to_string(),
                count: 16,
                slot: 3,
                tag: None,
            }]
        );
    }

    #[test]
    fn test_component_style_items() {
        let raw = r#"Alex has the following entity data: {Inventory: [{count: 5, Slot: 8b, id: "minecraft:apple", components: {"minecraft:food": {}}}]}"#;
        let player = parse_player_data("Alex", raw).unwrap();

        assert_eq!(player.inventory[0].count, 5);
        assert_eq!(player.inventory[0].slot, 8);
        assert_eq!(
            player.inventory[0].tag.as_deref(),
            Some(r#"{"minecraft:food": {}}"#)
        );
    }

    #[test]
    fn test_missing_marker() {
        assert!(parse_player_data("Steve", "No entity was found").is_none());
        assert!(parse_player_data("Steve", "").is_none());
        assert!(parse_player_data("Steve", "Steve has the following entity data: oops").is_none());
    }

    #[test]
    fn test_partial_failure_is_observable() {
        let raw = "Steve has the following entity data: {Health: NaNish, foodLevel: 7, Pos: [1.0d, 2.0d]}";
        let fields = parse_entity_fields(raw).unwrap();

        assert_eq!(fields.health, Extracted::Unparsable("NaNish".to_string()));
        assert_eq!(fields.food_level, Extracted::Parsed(7));
        assert!(matches!(fields.position, Extracted::Unparsable(_)));
        assert!(fields.rotation.is_absent());

        let player = fields.into_player_data("Steve");
        assert_eq!(player.health, DEFAULT_HEALTH);
        assert_eq!(player.position, Position::default());
    }

    #[test]
    fn test_numeric_dimension() {
        let dimension_of = |value: &str| {
            let raw = format!("Steve has the following entity data: {{Dimension: {}}}", value);
            parse_player_data("Steve", &raw).unwrap().dimension
        };

        assert_eq!(dimension_of("-1"), "the_nether");
        assert_eq!(dimension_of("0"), "overworld");
        assert_eq!(dimension_of("1"), "the_end");
        assert_eq!(dimension_of("7"), DEFAULT_DIMENSION);
        assert_eq!(dimension_of("\"minecraft:the_end\""), "the_end");

        let fields = parse_entity_fields("Steve has the following entity data: {Dimension: 7}").unwrap();
        assert_eq!(fields.dimension, Extracted::Unparsable("7".to_string()));
    }

    #[test]
    fn test_out_of_range_integer_uses_default() {
        let raw = "Steve has the following entity data: {XpTotal: 99999999999L}";
        let player = parse_player_data("Steve", raw).unwrap();
        assert_eq!(player.xp_total, 0);
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs = [
            "x has the following entity data: {",
            "x has the following entity data: {{{{]]]]",
            "x has the following entity data: {Pos: [\", Inventory: [{id: }]",
            "x has the following entity data: {Inventory: [{id: \"é\", Count: ü}]}",
            "x has the following entity data: {:::, ,,, abilities: {flying}}",
        ];
        for raw in inputs {
            let _ = parse_player_data("x", raw);
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let raw = "Steve has the following entity data: {foodLevel: 18}";
        let player = parse_player_data("Steve", raw).unwrap();
        let json = serde_json::to_value(&player).unwrap();

        assert_eq!(json["foodLevel"], 18);
        assert_eq!(json["abilities"]["walkSpeed"], 0.1);
        assert!(json.get("food_level").is_none());
    }
}

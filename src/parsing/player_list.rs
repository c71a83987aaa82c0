//! Decoder for `list` output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Player cap reported when the output can't be read.
pub const DEFAULT_MAX_PLAYERS: u32 = 20;

/// Matches both the current sentence and the older `3/20` form:
///
/// - `There are 3 of a max of 20 players online: Alice, Bob, Carol`
/// - `There are 3/20 players online:`
static PLAYER_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)There are (\d+)(?: of a max(?: of)? |/)(\d+) players online:?(.*)")
        .expect("player list pattern is valid")
});

/// Who is online, as reported by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerList {
    pub online: u32,
    pub max: u32,
    pub players: Vec<String>,
}

impl Default for PlayerList {
    fn default() -> Self {
        Self {
            online: 0,
            max: DEFAULT_MAX_PLAYERS,
            players: Vec::new(),
        }
    }
}

/// Parses the response to `list`.
///
/// Output that doesn't match yields an empty list with the default cap
/// instead of an error.
///
/// # Example
///
/// ```
/// use rconpool::parsing::parse_player_list;
///
/// let list = parse_player_list("There are 2 of a max of 10 players online: Alex, Steve");
/// assert_eq!(list.online, 2);
/// assert_eq!(list.max, 10);
/// assert_eq!(list.players, vec!["Alex", "Steve"]);
/// ```
pub fn parse_player_list(raw: &str) -> PlayerList {
    let Some(captures) = PLAYER_LIST.captures(raw) else {
        return PlayerList::default();
    };

    let online = captures.get(1).and_then(|m| m.as_str().parse().ok());
    let max = captures.get(2).and_then(|m| m.as_str().parse().ok());
    let (Some(online), Some(max)) = (online, max) else {
        return PlayerList::default();
    };

    let players = captures
        .get(3)
        .map(|m| {
            m.as_str()
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PlayerList {
        online,
        max,
        players,
    }
}

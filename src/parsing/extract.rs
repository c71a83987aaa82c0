//! Tolerant SNBT Field Extraction
//!
//! Minecraft prints entity data as SNBT-like text:
//!
//! ```text
//! {Health: 20.0f, Pos: [0.5d, 64.0d, 0.5d], abilities: {flying: 0b, ...}, ...}
//! ```
//!
//! The exact shape drifts between game versions, so this module doesn't try to
//! build a full tree. It splits a compound into its top-level `key: value`
//! pairs, leaving nested values as raw text that can be split again on demand.
//! Every lookup reports whether the field was parsed, present but unparsable,
//! or absent, and callers decide which default to fall back to.
//!
//! None of these functions panic on malformed input.

use once_cell::sync::Lazy;
use regex::Regex;

/// Numeric literal with an optional SNBT type suffix (`1b`, `300s`, `20.0f`, `0.5d`, `7L`).
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)[bBsSlLfFdD]?$")
        .expect("number pattern is valid")
});

/// Outcome of extracting one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    /// The field was found and understood
    Parsed(T),
    /// The field was found but its value made no sense (raw text kept)
    Unparsable(String),
    /// The field is not in the payload
    Absent,
}

impl<T> Extracted<T> {
    /// The parsed value, or `default` for absent and unparsable fields.
    pub fn or(self, default: T) -> T {
        match self {
            Extracted::Parsed(value) => value,
            _ => default,
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Extracted::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Extracted::Parsed(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Extracted::Absent)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        match self {
            Extracted::Parsed(value) => Extracted::Parsed(f(value)),
            Extracted::Unparsable(raw) => Extracted::Unparsable(raw),
            Extracted::Absent => Extracted::Absent,
        }
    }
}

impl<T: Default> Extracted<T> {
    pub fn or_default(self) -> T {
        self.or(T::default())
    }
}

/// The top-level entries of one SNBT compound.
#[derive(Debug, Clone, Default)]
pub struct Compound<'a> {
    entries: Vec<(&'a str, &'a str)>,
}

impl<'a> Compound<'a> {
    /// Splits `{k: v, ...}` into its entries.
    ///
    /// A missing closing brace (truncated output) is tolerated. Returns
    /// `None` if the text does not start with `{`.
    pub fn parse(text: &'a str) -> Option<Self> {
        let inner = text.trim().strip_prefix('{')?;
        let inner = inner.strip_suffix('}').unwrap_or(inner);

        let entries = split_top_level(inner)
            .into_iter()
            .filter_map(|part| {
                let (key, value) = split_key(part)?;
                Some((unquote(key.trim()), value.trim()))
            })
            .collect();

        Some(Self { entries })
    }

    /// Raw text of a top-level value.
    pub fn raw(&self, key: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn number(&self, key: &str) -> Extracted<f64> {
        match self.raw(key) {
            Some(raw) => match parse_number(raw) {
                Some(n) => Extracted::Parsed(n),
                None => Extracted::Unparsable(raw.to_string()),
            },
            None => Extracted::Absent,
        }
    }

    /// An integral field. Fractional values count as unparsable.
    pub fn integer(&self, key: &str) -> Extracted<i64> {
        match self.raw(key) {
            Some(raw) => match parse_number(raw) {
                Some(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                    Extracted::Parsed(n as i64)
                }
                _ => Extracted::Unparsable(raw.to_string()),
            },
            None => Extracted::Absent,
        }
    }

    /// A byte flag (`1b`/`0b`) or literal `true`/`false`.
    pub fn flag(&self, key: &str) -> Extracted<bool> {
        match self.raw(key) {
            Some(raw) => match parse_flag(raw) {
                Some(b) => Extracted::Parsed(b),
                None => Extracted::Unparsable(raw.to_string()),
            },
            None => Extracted::Absent,
        }
    }

    /// A string field, quotes removed.
    pub fn string(&self, key: &str) -> Extracted<String> {
        match self.raw(key) {
            Some(raw) if !raw.is_empty() => Extracted::Parsed(unquote(raw).to_string()),
            Some(raw) => Extracted::Unparsable(raw.to_string()),
            None => Extracted::Absent,
        }
    }

    /// A list of numbers of exactly `len` elements.
    pub fn numbers(&self, key: &str, len: usize) -> Extracted<Vec<f64>> {
        let Some(raw) = self.raw(key) else {
            return Extracted::Absent;
        };
        let Some(items) = split_list(raw) else {
            return Extracted::Unparsable(raw.to_string());
        };

        let numbers: Option<Vec<f64>> = items.iter().map(|item| parse_number(item)).collect();
        match numbers {
            Some(numbers) if numbers.len() == len => Extracted::Parsed(numbers),
            _ => Extracted::Unparsable(raw.to_string()),
        }
    }

    /// A nested compound.
    pub fn compound(&self, key: &str) -> Extracted<Compound<'a>> {
        match self.raw(key) {
            Some(raw) => match Compound::parse(raw) {
                Some(compound) => Extracted::Parsed(compound),
                None => Extracted::Unparsable(raw.to_string()),
            },
            None => Extracted::Absent,
        }
    }

    /// The elements of a list of compounds, such as `Inventory`.
    ///
    /// Elements that are not compounds are dropped.
    pub fn compounds(&self, key: &str) -> Extracted<Vec<Compound<'a>>> {
        let Some(raw) = self.raw(key) else {
            return Extracted::Absent;
        };
        match split_list(raw) {
            Some(items) => Extracted::Parsed(items.into_iter().filter_map(Compound::parse).collect()),
            None => Extracted::Unparsable(raw.to_string()),
        }
    }
}

/// Parses a numeric literal, ignoring its SNBT type suffix.
pub fn parse_number(raw: &str) -> Option<f64> {
    let captures = NUMBER.captures(raw.trim())?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        other => parse_number(other).map(|n| n != 0.0),
    }
}

/// Strips one layer of matching quotes.
pub fn unquote(raw: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = raw.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    raw
}

/// Splits `[a, b, c]` (or a typed array `[I; 1, 2]`) into trimmed elements.
pub fn split_list(raw: &str) -> Option<Vec<&str>> {
    let inner = raw.trim().strip_prefix('[')?;
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    let inner = match inner.trim_start().split_once(';') {
        Some((prefix, rest)) if matches!(prefix, "B" | "I" | "L") => rest,
        _ => inner,
    };

    Some(
        split_top_level(inner)
            .into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// Splits on commas that are outside nested brackets and quoted strings.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut scanner = Scanner::default();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if scanner.at_top(c) && c == ',' {
            parts.push(&text[start..i]);
            start = i + 1;
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

/// Splits `key: value` at the first top-level colon.
fn split_key(part: &str) -> Option<(&str, &str)> {
    let mut scanner = Scanner::default();
    for (i, c) in part.char_indices() {
        if scanner.at_top(c) && c == ':' {
            return Some((&part[..i], &part[i + 1..]));
        }
    }
    None
}

/// Tracks nesting depth and quoted strings while walking SNBT text.
#[derive(Debug, Default)]
struct Scanner {
    depth: usize,
    quote: Option<char>,
    escaped: bool,
}

impl Scanner {
    /// Feeds one character; true if it sits at depth zero outside quotes.
    fn at_top(&mut self, c: char) -> bool {
        if let Some(quote) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == quote {
                self.quote = None;
            }
            return false;
        }

        match c {
            '"' | '\'' => {
                self.quote = Some(c);
                false
            }
            '{' | '[' => {
                self.depth += 1;
                false
            }
            '}' | ']' => {
                self.depth = self.depth.saturating_sub(1);
                false
            }
            _ => self.depth == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_suffixes() {
        assert_eq!(parse_number("20.0f"), Some(20.0));
        assert_eq!(parse_number("300s"), Some(300.0));
        assert_eq!(parse_number("1b"), Some(1.0));
        assert_eq!(parse_number("-30.2d"), Some(-30.2));
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("7L"), Some(7.0));
        assert_eq!(parse_number("1.5E-4f"), Some(1.5e-4));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("1e999d"), None);
    }

    #[test]
    fn test_compound_top_level_only() {
        let compound =
            Compound::parse(r#"{Health: 20.0f, abilities: {Health: 1b}, id: "a,b:c"}"#).unwrap();

        assert_eq!(compound.len(), 3);
        assert_eq!(compound.number("Health"), Extracted::Parsed(20.0));
        assert_eq!(compound.raw("abilities"), Some("{Health: 1b}"));
        assert_eq!(compound.string("id"), Extracted::Parsed("a,b:c".to_string()));
    }

    #[test]
    fn test_compound_quoted_keys() {
        let compound = Compound::parse(r#"{"minecraft:custom": 3, plain: 4}"#).unwrap();
        assert_eq!(compound.integer("minecraft:custom"), Extracted::Parsed(3));
        assert_eq!(compound.integer("plain"), Extracted::Parsed(4));
    }

    #[test]
    fn test_compound_truncated() {
        let compound = Compound::parse("{Health: 12.0f, Pos: [1.0d, 2.0d").unwrap();
        assert_eq!(compound.number("Health"), Extracted::Parsed(12.0));
        assert!(matches!(compound.numbers("Pos", 3), Extracted::Unparsable(_)));
    }

    #[test]
    fn test_compound_rejects_non_compound() {
        assert!(Compound::parse("No entity was found").is_none());
        assert!(Compound::parse("").is_none());
    }

    #[test]
    fn test_field_outcomes() {
        let compound = Compound::parse("{foodLevel: lots, XpLevel: 3.5f, OnGround: 1b}").unwrap();

        assert_eq!(
            compound.integer("foodLevel"),
            Extracted::Unparsable("lots".to_string())
        );
        assert!(matches!(compound.integer("XpLevel"), Extracted::Unparsable(_)));
        assert_eq!(compound.flag("OnGround"), Extracted::Parsed(true));
        assert_eq!(compound.number("Missing"), Extracted::Absent);
    }

    #[test]
    fn test_extracted_or() {
        assert_eq!(Extracted::Parsed(3).or(20), 3);
        assert_eq!(Extracted::<i32>::Absent.or(20), 20);
        assert_eq!(Extracted::<i32>::Unparsable("x".into()).or(20), 20);
    }

    #[test]
    fn test_split_list_typed_array() {
        assert_eq!(split_list("[I; 1, -2, 3]"), Some(vec!["1", "-2", "3"]));
        assert_eq!(split_list("[]"), Some(vec![]));
        assert_eq!(split_list("nope"), None);
    }

    #[test]
    fn test_compounds_list() {
        let compound = Compound::parse(
            r#"{Inventory: [{Slot: 0b, id: "minecraft:stone", Count: 64b}, {Slot: 1b, id: "minecraft:torch", Count: 3b, tag: {Damage: 0}}]}"#,
        )
        .unwrap();

        let items = compound.compounds("Inventory").ok().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].raw("tag"), Some("{Damage: 0}"));
    }

    #[test]
    fn test_escaped_quotes() {
        let compound = Compound::parse(r#"{name: "say \"hi, there\"", n: 1}"#).unwrap();
        assert_eq!(compound.integer("n"), Extracted::Parsed(1));
    }
}

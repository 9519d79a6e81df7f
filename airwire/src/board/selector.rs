//! Textual item selectors: `U1:4` for a pad, `via:2`, `track:0` or `zone:1`
//! for the n-th item of that kind in board order.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{BoardItem, ItemId, ItemKind, PadKey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid selector '{0}': expected REF:PAD, via:N, track:N or zone:N")]
pub struct SelectorParseError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Pad(PadKey),
    Indexed { kind: ItemKind, index: usize },
}

impl Selector {
    /// Find the item this selector names.
    pub fn resolve(&self, items: &[BoardItem]) -> Option<ItemId> {
        match self {
            Selector::Pad(key) => items
                .iter()
                .find(|item| item.pad_key().as_ref() == Some(key))
                .map(|item| item.id),
            Selector::Indexed { kind, index } => items
                .iter()
                .filter(|item| item.kind == *kind)
                .nth(*index)
                .map(|item| item.id),
        }
    }
}

impl FromStr for Selector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, tail) = s
            .split_once(':')
            .ok_or_else(|| SelectorParseError(s.to_string()))?;

        let kind = match head {
            "via" => Some(ItemKind::Via),
            "track" => Some(ItemKind::Track),
            "zone" => Some(ItemKind::Zone),
            _ => None,
        };

        if let (Some(kind), Ok(index)) = (kind, tail.parse::<usize>()) {
            return Ok(Selector::Indexed { kind, index });
        }

        if head.is_empty() || tail.is_empty() {
            return Err(SelectorParseError(s.to_string()));
        }
        Ok(Selector::Pad(PadKey::new(head, tail)))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Pad(key) => write!(f, "{}", key),
            Selector::Indexed { kind, index } => write!(f, "{}:{}", kind, index),
        }
    }
}

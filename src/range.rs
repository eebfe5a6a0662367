//! Message range selection

use crate::transcript::MessageElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canned selection used when no explicit bounds are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    /// The most recent message
    #[default]
    Last,
    /// The two most recent messages
    Last2,
    /// Every rendered message
    All,
}

impl fmt::Display for RangeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RangeMode::Last => "last",
            RangeMode::Last2 => "last2",
            RangeMode::All => "all",
        };
        f.write_str(s)
    }
}

impl FromStr for RangeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(RangeMode::Last),
            "last2" => Ok(RangeMode::Last2),
            "all" => Ok(RangeMode::All),
            other => Err(format!("unknown range mode {:?}", other)),
        }
    }
}

/// User range input. Explicit bounds take precedence over `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeRequest {
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub mode: RangeMode,
}

impl RangeRequest {
    pub fn mode(mode: RangeMode) -> Self {
        Self {
            start: None,
            end: None,
            mode,
        }
    }

    pub fn between(start: Option<u64>, end: Option<u64>) -> Self {
        Self {
            start,
            end,
            mode: RangeMode::default(),
        }
    }

    fn has_bounds(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    fn contains(&self, id: u64) -> bool {
        self.start.map_or(true, |s| id >= s) && self.end.map_or(true, |e| id <= e)
    }
}

/// Outcome of a selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    /// Selected messages in original order
    Messages(Vec<&'a MessageElement>),
    /// Nothing matched; the caller shows a "no messages found" notice
    Empty,
}

impl<'a> Selection<'a> {
    pub fn len(&self) -> usize {
        match self {
            Selection::Messages(m) => m.len(),
            Selection::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<u64> {
        match self {
            Selection::Messages(m) => m.iter().map(|m| m.id).collect(),
            Selection::Empty => Vec::new(),
        }
    }
}

/// Select messages for `request`, preserving their order.
pub fn select<'a>(messages: &'a [MessageElement], request: &RangeRequest) -> Selection<'a> {
    let picked: Vec<&MessageElement> = if request.has_bounds() {
        messages.iter().filter(|m| request.contains(m.id)).collect()
    } else {
        let keep = match request.mode {
            RangeMode::Last => 1,
            RangeMode::Last2 => 2,
            RangeMode::All => messages.len(),
        };
        let skip = messages.len().saturating_sub(keep);
        messages.iter().skip(skip).collect()
    };

    if picked.is_empty() {
        Selection::Empty
    } else {
        Selection::Messages(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(ids: &[u64]) -> Vec<MessageElement> {
        ids.iter()
            .map(|&id| MessageElement::new(id, id % 2 == 0, format!("<p>{}</p>", id)))
            .collect()
    }

    #[test]
    fn canned_modes() {
        let m = msgs(&[0, 1, 2, 3]);
        assert_eq!(select(&m, &RangeRequest::mode(RangeMode::Last)).ids(), vec![3]);
        assert_eq!(select(&m, &RangeRequest::mode(RangeMode::Last2)).ids(), vec![2, 3]);
        assert_eq!(select(&m, &RangeRequest::mode(RangeMode::All)).ids(), vec![0, 1, 2, 3]);
        assert_eq!(select(&m, &RangeRequest::default()).ids(), vec![3]);
    }

    #[test]
    fn last2_with_single_message() {
        let m = msgs(&[7]);
        assert_eq!(select(&m, &RangeRequest::mode(RangeMode::Last2)).ids(), vec![7]);
    }

    #[test]
    fn inclusive_bounds() {
        let m = msgs(&[0, 1, 2, 3, 4, 5, 6]);
        for start in 0..7u64 {
            for end in start..7u64 {
                let sel = select(&m, &RangeRequest::between(Some(start), Some(end)));
                let expected: Vec<u64> = (start..=end).collect();
                assert_eq!(sel.ids(), expected);
            }
        }
    }

    #[test]
    fn one_sided_bounds() {
        let m = msgs(&[0, 1, 2, 3, 4]);
        assert_eq!(select(&m, &RangeRequest::between(Some(3), None)).ids(), vec![3, 4]);
        assert_eq!(select(&m, &RangeRequest::between(None, Some(1))).ids(), vec![0, 1]);
    }

    #[test]
    fn bounds_override_mode() {
        let m = msgs(&[0, 1, 2, 3, 4]);
        let req = RangeRequest {
            start: Some(0),
            end: Some(1),
            mode: RangeMode::Last,
        };
        assert_eq!(select(&m, &req).ids(), vec![0, 1]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let m = msgs(&[0, 1, 2, 3, 4, 5, 6]);
        let sel = select(&m, &RangeRequest::between(Some(5), Some(3)));
        assert_eq!(sel, Selection::Empty);
        assert!(sel.is_empty());
    }

    #[test]
    fn empty_transcript_is_empty() {
        assert_eq!(select(&[], &RangeRequest::mode(RangeMode::All)), Selection::Empty);
    }

    #[test]
    fn mode_parses_from_str() {
        assert_eq!("LAST2".parse::<RangeMode>().unwrap(), RangeMode::Last2);
        assert!("first".parse::<RangeMode>().is_err());
    }
}

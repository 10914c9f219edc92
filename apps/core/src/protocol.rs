use serde::{Deserialize, Serialize};

use crate::model::{Match, Partition};

/// One request line on the worker wire. `seq` is monotonically increasing
/// per channel; responses echo it so stale results can be discarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Filter {
        seq: u64,
        input: String,
    },
    Complete {
        seq: u64,
        input: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sep: Option<String>,
    },
}

impl Request {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Filter { seq, .. } | Self::Complete { seq, .. } => *seq,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemDto {
    pub index: i64,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub partitions: Vec<Partition>,
    /// Set by the consumer on the element at the current selection index;
    /// never produced by the worker itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl From<&Match> for ItemDto {
    fn from(value: &Match) -> Self {
        Self {
            index: value.entry.index,
            value: value.entry.value.clone(),
            data: value.entry.data.clone(),
            partitions: value.partitions.clone(),
            selected: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Response {
    Filter {
        seq: u64,
        total: usize,
        filtered: usize,
        items: Vec<ItemDto>,
    },
    Complete {
        seq: u64,
        candidate: String,
    },
}

impl Response {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Filter { seq, .. } | Self::Complete { seq, .. } => *seq,
        }
    }
}

use serde::{Deserialize, Serialize};

/// Leasing order within a queue. `High` jumps ahead of everything `Normal`;
/// FIFO holds within one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    #[default]
    Normal,
    High,
}

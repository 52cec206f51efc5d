use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ordering term. `field_indexes` is a slot path: all but the last
/// element descend into nested objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCondition {
    pub field_indexes: Vec<usize>,
    pub direction: SortDirection,
}

impl OrderCondition {
    pub fn asc(index: usize) -> Self {
        Self {
            field_indexes: vec![index],
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(index: usize) -> Self {
        Self {
            field_indexes: vec![index],
            direction: SortDirection::Desc,
        }
    }
}

use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    #[sea_orm(num_value = 0)]
    Pending,
    #[sea_orm(num_value = 1)]
    InProgress,
    #[sea_orm(num_value = 2)]
    Completed,
}

impl TodoStatus {
    /// Maps a status label produced by the AI service. Unknown labels fall
    /// back to `Pending`.
    pub fn from_ai_label(label: Option<&str>) -> Self {
        label
            .and_then(|value| Self::from_str(value.trim()).ok())
            .unwrap_or_default()
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TodoPriority {
    #[default]
    #[sea_orm(num_value = 0)]
    Low,
    #[sea_orm(num_value = 1)]
    Medium,
    #[sea_orm(num_value = 2)]
    High,
}

impl TodoPriority {
    pub fn from_ai_label(label: Option<&str>) -> Self {
        label
            .and_then(|value| Self::from_str(value.trim()).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_status_labels_map_to_known_variants() {
        assert_eq!(TodoStatus::from_ai_label(Some("pending")), TodoStatus::Pending);
        assert_eq!(
            TodoStatus::from_ai_label(Some("in_progress")),
            TodoStatus::InProgress
        );
        assert_eq!(
            TodoStatus::from_ai_label(Some("completed")),
            TodoStatus::Completed
        );
        assert_eq!(TodoStatus::from_ai_label(Some("blocked")), TodoStatus::Pending);
        assert_eq!(TodoStatus::from_ai_label(None), TodoStatus::Pending);
    }

    #[test]
    fn ai_priority_labels_fall_back_to_low() {
        assert_eq!(TodoPriority::from_ai_label(Some("high")), TodoPriority::High);
        assert_eq!(
            TodoPriority::from_ai_label(Some("medium")),
            TodoPriority::Medium
        );
        assert_eq!(TodoPriority::from_ai_label(Some("urgent")), TodoPriority::Low);
        assert_eq!(TodoPriority::from_ai_label(None), TodoPriority::Low);
    }

    #[test]
    fn wire_format_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&TodoStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(TodoPriority::High.to_string(), "high");
    }
}

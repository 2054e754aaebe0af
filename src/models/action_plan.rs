//! 行动计划模型

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 行动计划状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPlanStatus {
    Open,
    Pdca,
    Completed,
    Cancelled,
}

impl ActionPlanStatus {
    /// 已完成或已取消
    pub fn is_closed(&self) -> bool {
        matches!(self, ActionPlanStatus::Completed | ActionPlanStatus::Cancelled)
    }
}

/// 行动计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub sector: Option<String>,
    pub status: ActionPlanStatus,
    pub opened_on: NaiveDate,
    #[serde(default)]
    pub closed_on: Option<NaiveDate>,
    /// 固定等级，覆盖按天数计算的等级
    #[serde(default)]
    pub pinned_level: Option<u8>,
}

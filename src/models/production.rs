//! 看板数据模型
//! 生产、效率与缺勤接口的响应结构

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 生产计数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub date: NaiveDate,
    pub shift: String,
    pub line: String,
    pub quantity: f64,
}

/// 设备效率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyRecord {
    pub date: NaiveDate,
    pub shift: String,
    pub line: String,
    /// 效率（0-100）
    pub efficiency: f64,
    /// 运行分钟数，作为加权权重
    pub run_minutes: f64,
}

/// 缺勤统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsenceRecord {
    pub date: NaiveDate,
    pub sector: String,
    pub absent: u32,
    pub headcount: u32,
}

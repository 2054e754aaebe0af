//! 行动计划等级升级
//! 按开启天数线性升级，固定等级优先

use crate::{
    config::ActionPlanConfig,
    models::action_plan::ActionPlan,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationRule {
    pub days_per_level: u32,
    pub max_level: u8,
}

impl Default for EscalationRule {
    fn default() -> Self {
        Self {
            days_per_level: 7,
            max_level: 3,
        }
    }
}

impl From<&ActionPlanConfig> for EscalationRule {
    fn from(config: &ActionPlanConfig) -> Self {
        Self {
            days_per_level: config.days_per_level.max(1),
            max_level: config.max_level.max(1),
        }
    }
}

impl EscalationRule {
    /// 开启天数；已关闭的计划计算到关闭日
    pub fn days_open(&self, plan: &ActionPlan, today: NaiveDate) -> i64 {
        let end = match (plan.status.is_closed(), plan.closed_on) {
            (true, Some(closed)) => closed,
            _ => today,
        };
        (end - plan.opened_on).num_days().max(0)
    }

    /// 计划当前等级（1..=max_level）
    pub fn level(&self, plan: &ActionPlan, today: NaiveDate) -> u8 {
        if let Some(pinned) = plan.pinned_level {
            return pinned.clamp(1, self.max_level);
        }

        let steps = self.days_open(plan, today) / i64::from(self.days_per_level.max(1));
        let level = 1 + steps.min(i64::from(self.max_level));
        level.min(i64::from(self.max_level)) as u8
    }

    /// 未关闭的计划按等级分组
    pub fn group_by_level<'a>(
        &self,
        plans: &'a [ActionPlan],
        today: NaiveDate,
    ) -> BTreeMap<u8, Vec<&'a ActionPlan>> {
        plans
            .iter()
            .filter(|p| !p.status.is_closed())
            .fold(BTreeMap::new(), |mut acc, plan| {
                acc.entry(self.level(plan, today)).or_insert_with(Vec::new).push(plan);
                acc
            })
    }
}

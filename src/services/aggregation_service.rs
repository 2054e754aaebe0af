//! 看板聚合
//! 按日期、班次、产线对接口数据分组求和

use crate::models::production::{AbsenceRecord, EfficiencyRecord, ProductionRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// 按任意键分组求和
pub fn sum_by<T, K, FK, FV>(records: &[T], key: FK, value: FV) -> BTreeMap<K, f64>
where
    K: Ord,
    FK: Fn(&T) -> K,
    FV: Fn(&T) -> f64,
{
    records.iter().fold(BTreeMap::new(), |mut acc, record| {
        *acc.entry(key(record)).or_insert(0.0) += value(record);
        acc
    })
}

/// 日期 -> 班次 -> 产量
pub fn totals_by_date_shift(
    records: &[ProductionRecord],
) -> BTreeMap<NaiveDate, BTreeMap<String, f64>> {
    records.iter().fold(BTreeMap::new(), |mut acc, r| {
        *acc.entry(r.date)
            .or_insert_with(BTreeMap::new)
            .entry(r.shift.clone())
            .or_insert(0.0) += r.quantity;
        acc
    })
}

/// 产线 -> 产量
pub fn totals_by_line(records: &[ProductionRecord]) -> BTreeMap<String, f64> {
    sum_by(records, |r| r.line.clone(), |r| r.quantity)
}

/// 日期 -> 产量
pub fn daily_totals(records: &[ProductionRecord]) -> BTreeMap<NaiveDate, f64> {
    sum_by(records, |r| r.date, |r| r.quantity)
}

/// 产线 -> 按运行时长加权的效率
///
/// 运行时长合计为 0 的产线不出现在结果中。
pub fn weighted_efficiency_by_line(records: &[EfficiencyRecord]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(r.line.clone()).or_insert((0.0, 0.0));
        entry.0 += r.efficiency * r.run_minutes;
        entry.1 += r.run_minutes;
    }

    sums.into_iter()
        .filter(|(_, (_, minutes))| *minutes > 0.0)
        .map(|(line, (weighted, minutes))| (line, weighted / minutes))
        .collect()
}

/// 日期 -> 缺勤率（0.0-1.0）
pub fn absenteeism_rate_by_date(records: &[AbsenceRecord]) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (u64, u64)> = BTreeMap::new();
    for r in records {
        let entry = sums.entry(r.date).or_insert((0, 0));
        entry.0 += u64::from(r.absent);
        entry.1 += u64::from(r.headcount);
    }

    sums.into_iter()
        .map(|(date, (absent, headcount))| {
            let rate = if headcount == 0 {
                0.0
            } else {
                absent as f64 / headcount as f64
            };
            (date, rate)
        })
        .collect()
}

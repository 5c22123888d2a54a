//! URL令牌编解码
//!
//! 令牌格式：`<运算符代码>|<时间戳>[|<时间戳>]`，时间戳为带偏移的ATOM格式，
//! 例如 `bt|2024-03-01T00:00:00+01:00|2024-03-31T23:59:59+01:00`。
//! `|` 不会出现在时间戳或运算符代码中，所以可以直接作为分隔符。

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::models::{DateComparison, DateFilterState, FilterOperator, SiteTimezone};

pub const DELIMITER: char = '|';

/// 编码时使用的时间戳格式（ATOM）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// 解码后的令牌：运算符加上 0-2 个时间戳
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DecodedFilter {
    pub operator: FilterOperator,
    pub values: Vec<DateTime<FixedOffset>>,
}

impl DecodedFilter {
    pub fn first(&self) -> Option<DateTime<FixedOffset>> {
        self.values.first().copied()
    }

    pub fn second(&self) -> Option<DateTime<FixedOffset>> {
        self.values.get(1).copied()
    }

    /// 转换为查询层的比较条件，值不足时返回 None
    pub fn comparison(&self) -> Option<DateComparison> {
        match (self.operator, self.first(), self.second()) {
            (FilterOperator::After, Some(date), _) => Some(DateComparison::After(date)),
            (FilterOperator::Before, Some(date), _) => Some(DateComparison::Before(date)),
            (FilterOperator::Between | FilterOperator::YearMonth, Some(start), Some(end)) => {
                Some(DateComparison::Between(start, end))
            }
            _ => None,
        }
    }
}

pub fn format_timestamp(value: &DateTime<FixedOffset>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// 编码运算符和时间戳
///
/// 值不足以构成筛选条件时不生成令牌，多余的值被忽略。
pub fn encode(operator: FilterOperator, values: &[DateTime<FixedOffset>]) -> Option<String> {
    let needed = operator.value_count();
    if values.len() < needed {
        return None;
    }

    let mut token = operator.code().to_string();
    for value in &values[..needed] {
        token.push(DELIMITER);
        token.push_str(&format_timestamp(value));
    }
    Some(token)
}

/// 编码完整的筛选状态，年月筛选按站点时区展开为区间
pub fn encode_state(state: &DateFilterState, tz: &SiteTimezone) -> Option<String> {
    let operator = state.operator?;
    let values = match operator {
        FilterOperator::After | FilterOperator::Before => vec![state.first_date?],
        FilterOperator::Between => vec![state.first_date?, state.second_date?],
        FilterOperator::YearMonth => {
            let (start, end) = year_month_span(state.year?, state.month, tz)?;
            vec![start, end]
        }
    };
    encode(operator, &values)
}

/// 解码令牌，任何格式问题都会丢弃整个令牌
pub fn decode(token: &str) -> Option<DecodedFilter> {
    let mut parts = token.split(DELIMITER);
    let code = parts.next()?.trim();

    let Some(operator) = FilterOperator::from_code(code) else {
        debug!(code, "丢弃未知运算符的筛选令牌");
        return None;
    };

    let mut values = Vec::with_capacity(operator.value_count());
    for raw in parts {
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(value) => values.push(value),
            Err(e) => {
                debug!(value = raw, error = %e, "丢弃包含无效时间戳的筛选令牌");
                return None;
            }
        }
    }

    if values.len() > operator.value_count() {
        debug!(token, "丢弃值过多的筛选令牌");
        return None;
    }

    Some(DecodedFilter { operator, values })
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// 某年某月的实际天数
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// 年月展开为闭区间：首日 00:00:00 到末日 23:59:59
///
/// 未选择月份时覆盖整年。月份或年份超出范围时返回 None。
pub fn year_month_span(
    year: i32,
    month: Option<u32>,
    tz: &SiteTimezone,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let (first_month, last_month) = match month {
        Some(m) if (1..=12).contains(&m) => (m, m),
        Some(_) => return None,
        None => (1, 12),
    };

    let start = NaiveDate::from_ymd_opt(year, first_month, 1)?.and_hms_opt(0, 0, 0)?;
    let end = NaiveDate::from_ymd_opt(year, last_month, days_in_month(year, last_month))?
        .and_hms_opt(23, 59, 59)?;

    Some((
        tz.localize(&start)?,
        tz.localize_latest(&end)?,
    ))
}

/// 区间是否恰好落在同一年的同一个月内，是则返回该年月
pub fn span_month(start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> Option<(i32, u32)> {
    (start.year() == end.year() && start.month() == end.month()).then(|| (start.year(), start.month()))
}

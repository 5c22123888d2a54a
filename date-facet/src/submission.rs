//! 表单提交值到URL令牌的转换

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;

use crate::codec;
use crate::form::ElementKeys;
use crate::models::{DateFilterState, DateWidgetConfig, FilterOperator};
use crate::validation::{self, ValidationErrors};

/// 用户在表单中提交的原始选择
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSubmission {
    pub operator: Option<FilterOperator>,
    pub first_date: Option<NaiveDateTime>,
    pub second_date: Option<NaiveDateTime>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// 解析日期输入：`YYYY-MM-DD`，可带 `THH:MM[:SS]` 或空格分隔的时间
pub fn parse_date_input(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

impl FormSubmission {
    /// 从宿主表单的键值读取，键名与表单描述中的 `name` 一致，无法解析的值视为未填写
    pub fn from_values(facet_id: &str, parents: &[&str], values: &HashMap<String, String>) -> Self {
        let keys = ElementKeys::new(facet_id);
        let get = |name: String| {
            values
                .get(&name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let date = |name: String| get(name).and_then(|v| parse_date_input(&v));

        Self {
            operator: get(keys.operator_name(parents)).and_then(|v| FilterOperator::from_code(&v)),
            first_date: date(keys.first_date_name(parents)),
            second_date: date(keys.second_date_name(parents)),
            year: get(keys.year_name(parents)).and_then(|v| v.parse().ok()),
            month: get(keys.month_name(parents))
                .and_then(|v| v.parse().ok())
                .filter(|m| (1..=12).contains(m)),
        }
    }

    /// 按配置的日期类型规整日期，仅日期类型丢弃时间部分
    pub fn normalized(&self, config: &DateWidgetConfig) -> Self {
        Self {
            first_date: self.first_date.as_ref().map(|d| config.normalize(d)),
            second_date: self.second_date.as_ref().map(|d| config.normalize(d)),
            ..self.clone()
        }
    }

    /// 转换为筛选状态，日期按站点时区解释
    pub fn to_state(&self, config: &DateWidgetConfig) -> Result<DateFilterState, SubmissionError> {
        let localize = |value: &Option<NaiveDateTime>| -> Result<Option<DateTime<FixedOffset>>, SubmissionError> {
            value
                .as_ref()
                .map(|naive| {
                    let naive = config.normalize(naive);
                    config
                        .timezone
                        .localize(&naive)
                        .ok_or(SubmissionError::InvalidLocalTime(naive))
                })
                .transpose()
        };

        let Some(operator) = self.operator else {
            return Ok(DateFilterState::empty());
        };

        let mut state = DateFilterState {
            operator: Some(operator),
            ..DateFilterState::default()
        };
        match operator {
            FilterOperator::YearMonth => {
                state.year = self.year;
                state.month = self.month;
            }
            FilterOperator::Between => {
                state.first_date = localize(&self.first_date)?;
                state.second_date = localize(&self.second_date)?;
            }
            FilterOperator::After | FilterOperator::Before => {
                state.first_date = localize(&self.first_date)?;
            }
        }
        Ok(state)
    }
}

/// 校验并编码提交值
///
/// 校验失败时返回错误，不会生成令牌；值不完整（例如只选了运算符）时返回 `Ok(None)`。
pub fn submission_token(
    facet_id: &str,
    submission: &FormSubmission,
    config: &DateWidgetConfig,
) -> Result<Option<String>, SubmissionError> {
    let submission = submission.normalized(config);
    validation::validate(facet_id, &submission)?;
    let state = submission.to_state(config)?;
    Ok(codec::encode_state(&state, &config.timezone))
}

/// 提交失败的原因
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// 本地时间在站点时区中不存在
    #[error("Invalid local time: {0}")]
    InvalidLocalTime(NaiveDateTime),
}

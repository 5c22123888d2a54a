//! 从当前生效的URL令牌推导运算符和各输入框的默认值

use chrono::Datelike;

use crate::codec::{self, DecodedFilter};
use crate::models::{DateFilterState, FilterOperator};

/// 解析令牌得到筛选状态，令牌缺失或无效时返回空状态
///
/// 只依赖输入，不读取当前时间。区间顺序不在这里纠正，交给调用方校验。
pub fn resolve(token: Option<&str>) -> DateFilterState {
    token
        .and_then(codec::decode)
        .map(|decoded| state_from_decoded(&decoded))
        .unwrap_or_default()
}

/// 从多个生效值中解析，只取第一个
pub fn resolve_active<S: AsRef<str>>(active_values: &[S]) -> DateFilterState {
    resolve(active_values.first().map(|v| v.as_ref()))
}

pub fn state_from_decoded(decoded: &DecodedFilter) -> DateFilterState {
    let mut state = DateFilterState {
        operator: Some(decoded.operator),
        ..DateFilterState::default()
    };

    match decoded.operator {
        FilterOperator::After | FilterOperator::Before => {
            state.first_date = decoded.first();
        }
        FilterOperator::Between => {
            state.first_date = decoded.first();
            state.second_date = decoded.second();
        }
        FilterOperator::YearMonth => {
            if let (Some(start), Some(end)) = (decoded.first(), decoded.second()) {
                match codec::span_month(&start, &end) {
                    Some((year, month)) => {
                        state.year = Some(year);
                        state.month = Some(month);
                    }
                    None => state.year = Some(start.year()),
                }
            }
        }
    }

    state
}

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// 单次渲染最多扫描的索引条目数
pub const DEFAULT_SCAN_LIMIT: usize = 100_000;

/// 比较运算符 - URL中使用简短代码表示
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// 晚于某个日期
    #[serde(rename = "gt")]
    After,
    /// 早于某个日期
    #[serde(rename = "lt")]
    Before,
    /// 两个日期之间（包含边界）
    #[serde(rename = "bt")]
    Between,
    /// 按年份、月份
    #[serde(rename = "ym")]
    YearMonth,
}

impl FilterOperator {
    /// 选择框中的显示顺序
    pub const ALL: [FilterOperator; 4] = [
        FilterOperator::After,
        FilterOperator::Before,
        FilterOperator::Between,
        FilterOperator::YearMonth,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::After => "gt",
            Self::Before => "lt",
            Self::Between => "bt",
            Self::YearMonth => "ym",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::After => "After",
            Self::Before => "Before",
            Self::Between => "In between",
            Self::YearMonth => "By year, month",
        }
    }

    /// URL令牌中运算符之后的时间戳个数
    ///
    /// 年月筛选在编码时被展开成一个区间，所以和 Between 一样需要两个值。
    pub fn value_count(&self) -> usize {
        match self {
            Self::After | Self::Before => 1,
            Self::Between | Self::YearMonth => 2,
        }
    }
}

/// 日期类型 - 控制是否收集时间部分
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DateType {
    /// 仅日期
    #[default]
    Date,
    /// 日期和时间
    #[serde(rename = "datetime")]
    DateTime,
}

impl DateType {
    pub const ALL: [DateType; 2] = [DateType::Date, DateType::DateTime];

    /// 配置中保存的值
    pub fn code(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::DateTime => "datetime",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Date => "Date only",
            Self::DateTime => "Date and time",
        }
    }
}

/// 站点时区：IANA时区名（例如 Europe/Brussels）或固定偏移（例如 +01:00）
///
/// 命名时区会随夏令时变化，年月归属和区间边界都按当天实际的偏移计算。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum SiteTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl SiteTimezone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// 把本地时间解释为该时区中的时刻
    ///
    /// 夏令时回拨造成的重复时间取较早的一次；被跳过的时间顺延一小时。
    pub fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.resolve_local(naive, false)
    }

    /// 同 [`localize`](Self::localize)，重复时间取较晚的一次，用于区间的结束边界
    pub fn localize_latest(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.resolve_local(naive, true)
    }

    fn resolve_local(&self, naive: &NaiveDateTime, latest: bool) -> Option<DateTime<FixedOffset>> {
        let pick = |result: LocalResult<DateTime<FixedOffset>>| match result {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(early, late) => Some(if latest { late } else { early }),
            LocalResult::None => None,
        };
        let at = |naive: &NaiveDateTime| match self {
            Self::Named(tz) => pick(tz.from_local_datetime(naive).map(|dt| dt.fixed_offset())),
            Self::Fixed(offset) => pick(offset.from_local_datetime(naive)),
        };
        at(naive).or_else(|| at(&(*naive + Duration::hours(1))))
    }

    /// UTC时刻在该时区中的本地时间
    pub fn to_local(&self, value: &DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Named(tz) => value.with_timezone(tz).naive_local(),
            Self::Fixed(offset) => value.with_timezone(offset).naive_local(),
        }
    }
}

impl Default for SiteTimezone {
    fn default() -> Self {
        Self::utc()
    }
}

impl From<Tz> for SiteTimezone {
    fn from(tz: Tz) -> Self {
        Self::Named(tz)
    }
}

impl From<FixedOffset> for SiteTimezone {
    fn from(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }
}

impl FromStr for SiteTimezone {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let tz = value.trim();
        if tz == "Z" {
            return Ok(Self::utc());
        }
        if let Ok(named) = tz.parse::<Tz>() {
            return Ok(Self::Named(named));
        }
        tz.parse::<FixedOffset>()
            .map(Self::Fixed)
            .map_err(|_| Error::InvalidTimezone(value.to_string()))
    }
}

impl TryFrom<String> for SiteTimezone {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for SiteTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(tz) => f.write_str(tz.name()),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl From<SiteTimezone> for String {
    fn from(tz: SiteTimezone) -> Self {
        tz.to_string()
    }
}

/// 每个筛选实例的配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DateWidgetConfig {
    /// 日期类型 (可选, 默认为仅日期)
    #[serde(default)]
    pub date_type: DateType,
    /// 站点时区 (可选, 默认为UTC)
    #[serde(default)]
    pub timezone: SiteTimezone,
    /// 构建年月索引时最多扫描的条目数 (可选)
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

impl Default for DateWidgetConfig {
    fn default() -> Self {
        Self {
            date_type: DateType::default(),
            timezone: SiteTimezone::default(),
            scan_limit: default_scan_limit(),
        }
    }
}

impl DateWidgetConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn collects_time(&self) -> bool {
        self.date_type == DateType::DateTime
    }

    /// 按日期类型规整本地时间：仅日期类型丢弃时间部分
    pub fn normalize(&self, value: &NaiveDateTime) -> NaiveDateTime {
        if self.collects_time() {
            *value
        } else {
            value.date().and_time(NaiveTime::MIN)
        }
    }
}

fn default_scan_limit() -> usize {
    DEFAULT_SCAN_LIMIT
}

/// 筛选状态 - 每次请求从URL令牌重建，从不在服务端保存
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DateFilterState {
    pub operator: Option<FilterOperator>,
    pub first_date: Option<DateTime<FixedOffset>>,
    pub second_date: Option<DateTime<FixedOffset>>,
    pub year: Option<i32>,
    /// 月份 1-12，缺省表示整年
    pub month: Option<u32>,
}

impl DateFilterState {
    /// 未选择任何筛选条件的状态
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn after(date: DateTime<FixedOffset>) -> Self {
        Self {
            operator: Some(FilterOperator::After),
            first_date: Some(date),
            ..Self::default()
        }
    }

    pub fn before(date: DateTime<FixedOffset>) -> Self {
        Self {
            operator: Some(FilterOperator::Before),
            first_date: Some(date),
            ..Self::default()
        }
    }

    pub fn between(first: DateTime<FixedOffset>, second: DateTime<FixedOffset>) -> Self {
        Self {
            operator: Some(FilterOperator::Between),
            first_date: Some(first),
            second_date: Some(second),
            ..Self::default()
        }
    }

    pub fn year_month(year: i32, month: Option<u32>) -> Self {
        Self {
            operator: Some(FilterOperator::YearMonth),
            year: Some(year),
            month,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operator.is_none()
    }

    /// 状态中的值是否足以生成URL令牌
    pub fn is_complete(&self) -> bool {
        match self.operator {
            None => false,
            Some(FilterOperator::After) | Some(FilterOperator::Before) => self.first_date.is_some(),
            Some(FilterOperator::Between) => self.first_date.is_some() && self.second_date.is_some(),
            Some(FilterOperator::YearMonth) => {
                self.year.is_some() && self.month.map_or(true, |m| (1..=12).contains(&m))
            }
        }
    }
}

/// 交给查询层的比较条件
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "operator", content = "values", rename_all = "snake_case")]
pub enum DateComparison {
    /// 字段值 > 边界
    After(DateTime<FixedOffset>),
    /// 字段值 < 边界
    Before(DateTime<FixedOffset>),
    /// 开始 <= 字段值 <= 结束
    Between(DateTime<FixedOffset>, DateTime<FixedOffset>),
}

impl DateComparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::After(_) => ">",
            Self::Before(_) => "<",
            Self::Between(_, _) => "BETWEEN",
        }
    }

    pub fn matches(&self, value: &DateTime<Utc>) -> bool {
        match self {
            Self::After(bound) => *value > *bound,
            Self::Before(bound) => *value < *bound,
            Self::Between(start, end) => *value >= *start && *value <= *end,
        }
    }
}

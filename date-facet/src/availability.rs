//! 年月可用性索引
//!
//! 记录索引数据中实际出现过的年份和月份，供前端隐藏不会产生结果的月份选项。
//! 只回答“是否存在”，不统计数量；每次渲染重新计算，不做持久化。

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{DateWidgetConfig, SiteTimezone};

/// 年份 -> 月份集合，年份和月份都按升序排列
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct YearMonthAvailability(BTreeMap<i32, BTreeSet<u32>>);

impl YearMonthAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, month: u32) {
        if (1..=12).contains(&month) {
            self.0.entry(year).or_default().insert(month);
        }
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.keys().copied()
    }

    pub fn has_year(&self, year: i32) -> bool {
        self.0.contains_key(&year)
    }

    pub fn months(&self, year: i32) -> Option<&BTreeSet<u32>> {
        self.0.get(&year)
    }

    pub fn contains(&self, year: i32, month: u32) -> bool {
        self.0.get(&year).map_or(false, |months| months.contains(&month))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 写入 data-year-months 属性的JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// 日期格式化能力：在配置的时区中取出年份和月份
pub trait DateFormatter {
    fn year_month(&self, value: &DateTime<Utc>) -> (i32, u32);
}

/// 按站点时区取年月，命名时区会计入夏令时
#[derive(Debug, Clone, Copy)]
pub struct ZoneDateFormatter {
    tz: SiteTimezone,
}

impl ZoneDateFormatter {
    pub fn new(tz: impl Into<SiteTimezone>) -> Self {
        Self { tz: tz.into() }
    }

    pub fn from_config(config: &DateWidgetConfig) -> Self {
        Self::new(config.timezone)
    }
}

impl DateFormatter for ZoneDateFormatter {
    fn year_month(&self, value: &DateTime<Utc>) -> (i32, u32) {
        let local = self.tz.to_local(value);
        (local.year(), local.month())
    }
}

/// 筛选源，ID格式：`<源插件>:<实体类型>:<子类型>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSource {
    pub entity_type: String,
    pub bundle: String,
}

impl FacetSource {
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split(':').collect();
        match parts.as_slice() {
            [_, entity_type, bundle, ..] if !entity_type.is_empty() && !bundle.is_empty() => {
                Ok(Self {
                    entity_type: entity_type.to_string(),
                    bundle: bundle.to_string(),
                })
            }
            _ => Err(Error::InvalidFacetSource(id.to_string())),
        }
    }

    pub fn datasource(&self) -> String {
        format!("entity:{}", self.entity_type)
    }
}

/// 对外部索引的一次只读查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQueryRequest {
    /// 数据源条件，例如 entity:node
    pub datasource: String,
    /// 子类型条件，仅当索引包含子类型字段时设置
    pub bundle: Option<String>,
    /// 要读取的日期字段
    pub field: String,
    /// 最多返回的条目数
    pub limit: usize,
}

/// 只读索引查询能力
pub trait IndexQuery {
    /// 索引是否包含该字段
    fn has_field(&self, field: &str) -> bool;

    /// 返回每个匹配条目该字段的第一个值，没有值的条目为 None
    fn date_values(&self, request: &IndexQueryRequest) -> Result<Vec<Option<DateTime<Utc>>>>;
}

/// 从日期值构建可用性索引，重复的年月只记录一次
pub fn build<I>(values: I, formatter: &dyn DateFormatter) -> YearMonthAvailability
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut availability = YearMonthAvailability::new();
    for value in values {
        let (year, month) = formatter.year_month(&value);
        availability.insert(year, month);
    }
    availability
}

/// 一次索引扫描的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityScan {
    pub availability: YearMonthAvailability,
    /// 匹配的条目多于扫描上限，结果只覆盖前 `scan_limit` 条
    pub truncated: bool,
}

/// 查询索引并构建可用性索引
///
/// 扫描数量受 `config.scan_limit` 限制，达到上限时返回部分结果。
pub fn from_index(
    index: &dyn IndexQuery,
    source: &FacetSource,
    field: &str,
    config: &DateWidgetConfig,
    formatter: &dyn DateFormatter,
) -> Result<YearMonthAvailability> {
    Ok(scan_index(index, source, field, config, formatter)?.availability)
}

/// 同 [`from_index`]，同时报告结果是否因扫描上限而不完整
pub fn scan_index(
    index: &dyn IndexQuery,
    source: &FacetSource,
    field: &str,
    config: &DateWidgetConfig,
    formatter: &dyn DateFormatter,
) -> Result<AvailabilityScan> {
    let bundle_key = utils_common::BUNDLE_FIELD;
    // 多取一条用来判断是否真的超过上限
    let request = IndexQueryRequest {
        datasource: source.datasource(),
        bundle: index.has_field(bundle_key).then(|| source.bundle.clone()),
        field: field.to_string(),
        limit: config.scan_limit.saturating_add(1),
    };

    let values = index.date_values(&request)?;
    let truncated = values.len() > config.scan_limit;
    if truncated {
        warn!(
            limit = config.scan_limit,
            field, "年月索引超过扫描上限，结果不完整"
        );
    }

    let availability = build(
        values.into_iter().take(config.scan_limit).flatten(),
        formatter,
    );
    debug!(years = availability.len(), field, "年月索引构建完成");
    Ok(AvailabilityScan {
        availability,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn utc_formatter() -> ZoneDateFormatter {
        ZoneDateFormatter::new(SiteTimezone::utc())
    }

    #[test]
    fn test_build_collapses_duplicates_and_sorts() {
        let values = vec![utc(2024, 1, 1, 0), utc(2023, 5, 20, 0), utc(2023, 5, 10, 0)];
        let availability = build(values, &utc_formatter());

        assert_eq!(availability.to_json().unwrap(), r#"{"2023":[5],"2024":[1]}"#);
        assert_eq!(availability.years().collect::<Vec<_>>(), vec![2023, 2024]);
    }

    #[test]
    fn test_build_uses_configured_offset() {
        // 2023-12-31 23:00 UTC 在 +02:00 时区已是 2024 年 1 月
        let formatter = ZoneDateFormatter::new(chrono::FixedOffset::east_opt(2 * 3600).unwrap());
        let availability = build(vec![utc(2023, 12, 31, 23)], &formatter);
        assert!(availability.contains(2024, 1));
        assert!(!availability.has_year(2023));
    }

    #[test]
    fn test_build_follows_daylight_saving() {
        // 2024-06-30 22:00 UTC 在布鲁塞尔（夏令时 +02:00）已是 7 月
        let formatter = ZoneDateFormatter::new(chrono_tz::Europe::Brussels);
        let availability = build(vec![utc(2024, 6, 30, 22), utc(2024, 1, 31, 22)], &formatter);
        assert_eq!(availability.to_json().unwrap(), r#"{"2024":[1,7]}"#);
    }

    #[test]
    fn test_insert_ignores_invalid_month() {
        let mut availability = YearMonthAvailability::new();
        availability.insert(2024, 0);
        availability.insert(2024, 13);
        assert!(availability.is_empty());
    }

    #[test]
    fn test_json_roundtrip() {
        let availability = YearMonthAvailability::from_json(r#"{"2024":[2],"2023":[3,1]}"#).unwrap();
        assert_eq!(
            availability.months(2023).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(availability.to_json().unwrap(), r#"{"2023":[1,3],"2024":[2]}"#);
    }

    #[test]
    fn test_facet_source_parse() {
        let source = FacetSource::parse("list_facet_source:node:news").unwrap();
        assert_eq!(source.entity_type, "node");
        assert_eq!(source.bundle, "news");
        assert_eq!(source.datasource(), "entity:node");

        assert!(FacetSource::parse("node").is_err());
        assert!(FacetSource::parse("list_facet_source::news").is_err());
    }

    struct FakeIndex {
        has_bundle: bool,
        values: Vec<Option<DateTime<Utc>>>,
        last_request: std::cell::RefCell<Option<IndexQueryRequest>>,
    }

    impl IndexQuery for FakeIndex {
        fn has_field(&self, field: &str) -> bool {
            self.has_bundle && field == utils_common::BUNDLE_FIELD
        }

        fn date_values(&self, request: &IndexQueryRequest) -> Result<Vec<Option<DateTime<Utc>>>> {
            *self.last_request.borrow_mut() = Some(request.clone());
            Ok(self.values.iter().take(request.limit).copied().collect())
        }
    }

    #[test]
    fn test_from_index_builds_request_and_skips_empty_values() {
        let index = FakeIndex {
            has_bundle: true,
            values: vec![Some(utc(2023, 5, 10, 0)), None, Some(utc(2024, 1, 1, 0))],
            last_request: Default::default(),
        };
        let source = FacetSource::parse("list_facet_source:node:news").unwrap();
        let config = DateWidgetConfig::default();

        let availability =
            from_index(&index, &source, "published", &config, &utc_formatter()).unwrap();
        assert_eq!(availability.to_json().unwrap(), r#"{"2023":[5],"2024":[1]}"#);

        let request = index.last_request.borrow().clone().unwrap();
        assert_eq!(request.datasource, "entity:node");
        assert_eq!(request.bundle.as_deref(), Some("news"));
        assert_eq!(request.limit, config.scan_limit + 1);
    }

    #[test]
    fn test_from_index_without_bundle_field_and_scan_cap() {
        let index = FakeIndex {
            has_bundle: false,
            values: vec![
                Some(utc(2020, 1, 1, 0)),
                Some(utc(2021, 1, 1, 0)),
                Some(utc(2022, 1, 1, 0)),
            ],
            last_request: Default::default(),
        };
        let source = FacetSource::parse("list_facet_source:node:news").unwrap();
        let config = DateWidgetConfig {
            scan_limit: 2,
            ..DateWidgetConfig::default()
        };

        let scan = scan_index(&index, &source, "published", &config, &utc_formatter()).unwrap();
        assert!(scan.truncated);
        assert_eq!(scan.availability.years().collect::<Vec<_>>(), vec![2020, 2021]);
        assert!(index.last_request.borrow().as_ref().unwrap().bundle.is_none());
    }

    #[test]
    fn test_exactly_scan_limit_is_not_truncated() {
        let index = FakeIndex {
            has_bundle: false,
            values: vec![Some(utc(2020, 1, 1, 0)), Some(utc(2021, 1, 1, 0))],
            last_request: Default::default(),
        };
        let source = FacetSource::parse("list_facet_source:node:news").unwrap();
        let config = DateWidgetConfig {
            scan_limit: 2,
            ..DateWidgetConfig::default()
        };

        let scan = scan_index(&index, &source, "published", &config, &utc_formatter()).unwrap();
        assert!(!scan.truncated);
        assert_eq!(scan.availability.len(), 2);
    }
}

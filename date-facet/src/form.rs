//! 日期筛选表单描述
//!
//! 只生成描述数据，渲染由宿主负责。各输入框的显示/隐藏通过 `visible_when`
//! 规则交给前端处理，不需要服务端重新渲染。

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::availability::YearMonthAvailability;
use crate::error::Result;
use crate::models::{DateFilterState, DateType, DateWidgetConfig, FilterOperator};
use crate::resolver;

/// 年月容器的CSS类，前端行为据此查找组件
pub const WRAPPER_CLASS: &str = "list-date-widget-wrapper";
pub const YEAR_CLASS: &str = "list-date-widget-year";
pub const MONTH_CLASS: &str = "list-date-widget-month";
pub const DATA_YEAR_MONTHS: &str = "data-year-months";
pub const LIBRARY: &str = "list_pages/date_widget";

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// 筛选实例的基本信息
#[derive(Debug, Clone)]
pub struct Facet {
    pub id: String,
    pub name: String,
}

impl Facet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn keys(&self) -> ElementKeys {
        ElementKeys::new(&self.id)
    }
}

/// 表单元素的键名，全部以筛选ID为前缀
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementKeys {
    pub operator: String,
    pub first_date_wrapper: String,
    pub first_date: String,
    pub second_date_wrapper: String,
    pub second_date: String,
    pub year_month_wrapper: String,
    pub year: String,
    pub month: String,
}

impl ElementKeys {
    pub fn new(facet_id: &str) -> Self {
        Self {
            operator: format!("{}_op", facet_id),
            first_date_wrapper: format!("{}_first_date_wrapper", facet_id),
            first_date: format!("{}_first_date", facet_id),
            second_date_wrapper: format!("{}_second_date_wrapper", facet_id),
            second_date: format!("{}_second_date", facet_id),
            year_month_wrapper: format!("{}_year_month_wrapper", facet_id),
            year: format!("{}_year", facet_id),
            month: format!("{}_month", facet_id),
        }
    }

    /// 运算符输入框的name
    pub fn operator_name(&self, parents: &[&str]) -> String {
        input_name(parents, &[self.operator.as_str()])
    }

    /// 日期和年月输入框嵌套在各自的容器下
    pub fn first_date_name(&self, parents: &[&str]) -> String {
        input_name(parents, &[self.first_date_wrapper.as_str(), self.first_date.as_str()])
    }

    pub fn second_date_name(&self, parents: &[&str]) -> String {
        input_name(parents, &[self.second_date_wrapper.as_str(), self.second_date.as_str()])
    }

    pub fn year_name(&self, parents: &[&str]) -> String {
        input_name(parents, &[self.year_month_wrapper.as_str(), self.year.as_str()])
    }

    pub fn month_name(&self, parents: &[&str]) -> String {
        input_name(parents, &[self.year_month_wrapper.as_str(), self.month.as_str()])
    }
}

/// 按嵌套父级生成输入框的name属性：`first[second][...][name]`
pub fn input_name(parents: &[&str], path: &[&str]) -> String {
    let mut segments = parents.iter().chain(path.iter());
    let mut name = segments.next().map(|s| s.to_string()).unwrap_or_default();
    for segment in segments {
        name.push('[');
        name.push_str(segment);
        name.push(']');
    }
    name
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VisibilityCondition {
    /// 输入框的值等于给定值
    Value(String),
    /// 输入框已填写
    Filled,
}

/// 可见性规则，多条规则之间为“或”关系
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VisibilityRule {
    pub input_name: String,
    pub condition: VisibilityCondition,
}

impl VisibilityRule {
    fn value(input_name: &str, value: &str) -> Self {
        Self {
            input_name: input_name.to_string(),
            condition: VisibilityCondition::Value(value.to_string()),
        }
    }

    fn filled(input_name: &str) -> Self {
        Self {
            input_name: input_name.to_string(),
            condition: VisibilityCondition::Filled,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SelectElement {
    pub key: String,
    /// 提交时使用的name，含父级和容器路径
    pub name: String,
    pub title: String,
    pub options: Vec<SelectOption>,
    /// 未选择时显示的空选项
    pub empty_option: Option<String>,
    pub default_value: Option<String>,
    pub required: bool,
    pub classes: Vec<String>,
    pub visible_when: Vec<VisibilityRule>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeElement {
    None,
    Time,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TitleDisplay {
    Invisible,
    Before,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DateElement {
    pub key: String,
    pub name: String,
    pub title: String,
    pub title_display: TitleDisplay,
    pub time_element: TimeElement,
    pub default_value: Option<DateTime<FixedOffset>>,
    pub required: bool,
}

/// 标题显示在输入框前
pub fn title_display_before(mut element: DateElement) -> DateElement {
    element.title_display = TitleDisplay::Before;
    element
}

/// 结束日期的标题
pub fn end_date_title(mut element: DateElement) -> DateElement {
    element.title = "End Date".to_string();
    element
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DateWrapper {
    pub key: String,
    pub visible_when: Vec<VisibilityRule>,
    pub date: DateElement,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct YearMonthWrapper {
    pub key: String,
    pub classes: Vec<String>,
    /// data-year-months 属性值（JSON）
    pub year_months: String,
    pub visible_when: Vec<VisibilityRule>,
    pub year: SelectElement,
    pub month: SelectElement,
}

/// 完整的日期筛选表单描述
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DateWidgetForm {
    pub operator: SelectElement,
    pub first_date: DateWrapper,
    pub second_date: DateWrapper,
    pub year_month: YearMonthWrapper,
    pub cache_contexts: Vec<String>,
    pub libraries: Vec<String>,
}

fn date_element(
    key: &str,
    name: String,
    config: &DateWidgetConfig,
    default_value: Option<DateTime<FixedOffset>>,
) -> DateElement {
    DateElement {
        key: key.to_string(),
        name,
        title: "Date".to_string(),
        title_display: TitleDisplay::Invisible,
        time_element: if config.collects_time() {
            TimeElement::Time
        } else {
            TimeElement::None
        },
        default_value,
        required: false,
    }
}

/// 构建日期筛选表单
///
/// `state` 通常来自 [`resolver::resolve`]，`parents` 为表单嵌套时的父级键。
pub fn build_widget(
    facet: &Facet,
    state: &DateFilterState,
    availability: &YearMonthAvailability,
    config: &DateWidgetConfig,
    parents: &[&str],
) -> Result<DateWidgetForm> {
    let keys = facet.keys();
    let operator_name = keys.operator_name(parents);

    let operator = SelectElement {
        key: keys.operator.clone(),
        name: operator_name.clone(),
        title: facet.name.clone(),
        options: FilterOperator::ALL
            .iter()
            .map(|op| SelectOption {
                value: op.code().to_string(),
                label: op.label().to_string(),
            })
            .collect(),
        empty_option: Some("Select".to_string()),
        default_value: state.operator.map(|op| op.code().to_string()),
        required: false,
        classes: Vec::new(),
        visible_when: Vec::new(),
    };

    let first_date = DateWrapper {
        key: keys.first_date_wrapper.clone(),
        visible_when: [FilterOperator::Before, FilterOperator::After, FilterOperator::Between]
            .iter()
            .map(|op| VisibilityRule::value(&operator_name, op.code()))
            .collect(),
        date: title_display_before(date_element(
            &keys.first_date,
            keys.first_date_name(parents),
            config,
            state.first_date,
        )),
    };

    // 第二个日期只在 Between 时有意义
    let second_default = match state.operator {
        Some(FilterOperator::Between) => state.second_date,
        _ => None,
    };
    let second_date = DateWrapper {
        key: keys.second_date_wrapper.clone(),
        visible_when: vec![VisibilityRule::value(&operator_name, FilterOperator::Between.code())],
        date: end_date_title(title_display_before(date_element(
            &keys.second_date,
            keys.second_date_name(parents),
            config,
            second_default,
        ))),
    };

    let year_month = build_year_month(&keys, state, availability, parents, &operator_name)?;

    Ok(DateWidgetForm {
        operator,
        first_date,
        second_date,
        year_month,
        cache_contexts: vec!["url.query_args".to_string(), "url.path".to_string()],
        libraries: vec![LIBRARY.to_string()],
    })
}

fn build_year_month(
    keys: &ElementKeys,
    state: &DateFilterState,
    availability: &YearMonthAvailability,
    parents: &[&str],
    operator_name: &str,
) -> Result<YearMonthWrapper> {
    // 默认年份必须是可选年份之一，没有默认年份时也不保留月份
    let default_year = state.year.filter(|year| availability.has_year(*year));
    let default_month = default_year.and(state.month);

    let year = SelectElement {
        key: keys.year.clone(),
        name: keys.year_name(parents),
        title: "Year".to_string(),
        options: availability
            .years()
            .map(|year| SelectOption {
                value: year.to_string(),
                label: year.to_string(),
            })
            .collect(),
        empty_option: Some("Year".to_string()),
        default_value: default_year.map(|y| y.to_string()),
        required: false,
        classes: vec![YEAR_CLASS.to_string()],
        visible_when: Vec::new(),
    };

    let month = SelectElement {
        key: keys.month.clone(),
        name: keys.month_name(parents),
        title: "Month".to_string(),
        options: MONTH_NAMES
            .iter()
            .enumerate()
            .map(|(i, label)| SelectOption {
                value: (i + 1).to_string(),
                label: label.to_string(),
            })
            .collect(),
        empty_option: Some("Month".to_string()),
        default_value: default_month.map(|m| m.to_string()),
        required: false,
        classes: vec![MONTH_CLASS.to_string()],
        visible_when: vec![VisibilityRule::filled(&keys.year_name(parents))],
    };

    Ok(YearMonthWrapper {
        key: keys.year_month_wrapper.clone(),
        classes: vec![WRAPPER_CLASS.to_string()],
        year_months: availability.to_json()?,
        visible_when: vec![VisibilityRule::value(operator_name, FilterOperator::YearMonth.code())],
        year,
        month,
    })
}

/// 筛选实例的配置表单，目前只有日期类型
pub fn build_configuration_form(config: &DateWidgetConfig) -> SelectElement {
    SelectElement {
        key: "date_type".to_string(),
        name: "date_type".to_string(),
        title: "Date type".to_string(),
        options: DateType::ALL
            .iter()
            .map(|date_type| SelectOption {
                value: date_type.code().to_string(),
                label: date_type.label().to_string(),
            })
            .collect(),
        empty_option: None,
        default_value: Some(config.date_type.code().to_string()),
        required: true,
        classes: Vec::new(),
        visible_when: Vec::new(),
    }
}

/// 构建默认值表单：运算符和第一个日期为必填，可传入预设令牌
pub fn build_default_value_form(
    facet: &Facet,
    preset: Option<&str>,
    availability: &YearMonthAvailability,
    config: &DateWidgetConfig,
    parents: &[&str],
) -> Result<DateWidgetForm> {
    let state = resolver::resolve(preset);
    let mut form = build_widget(facet, &state, availability, config, parents)?;
    form.operator.required = true;
    form.first_date.date.required = true;
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn availability() -> YearMonthAvailability {
        YearMonthAvailability::from_json(r#"{"2023":[1,3],"2024":[2]}"#).unwrap()
    }

    fn facet() -> Facet {
        Facet::new("published", "Publication date")
    }

    #[test]
    fn test_input_name() {
        assert_eq!(input_name(&[], &["published_op"]), "published_op");
        assert_eq!(input_name(&["filters", "date"], &["published_op"]), "filters[date][published_op]");
        assert_eq!(
            input_name(&[], &["published_year_month_wrapper", "published_year"]),
            "published_year_month_wrapper[published_year]"
        );
    }

    #[test]
    fn test_empty_state_form() {
        let form = build_widget(
            &facet(),
            &DateFilterState::empty(),
            &availability(),
            &DateWidgetConfig::default(),
            &[],
        )
        .unwrap();

        assert_eq!(form.operator.title, "Publication date");
        assert_eq!(form.operator.default_value, None);
        assert_eq!(form.operator.options.len(), 4);
        assert_eq!(form.operator.options[2].label, "In between");
        assert_eq!(form.first_date.date.time_element, TimeElement::None);
        assert_eq!(form.first_date.date.title_display, TitleDisplay::Before);
        assert_eq!(form.second_date.date.title, "End Date");
        assert_eq!(form.year_month.year_months, r#"{"2023":[1,3],"2024":[2]}"#);
        assert_eq!(form.year_month.classes, vec![WRAPPER_CLASS]);
        assert_eq!(form.cache_contexts, vec!["url.query_args", "url.path"]);
    }

    #[test]
    fn test_visibility_rules_follow_operator() {
        let form = build_widget(
            &facet(),
            &DateFilterState::empty(),
            &availability(),
            &DateWidgetConfig::default(),
            &["filters"],
        )
        .unwrap();

        let values: Vec<_> = form
            .first_date
            .visible_when
            .iter()
            .map(|rule| (rule.input_name.as_str(), rule.condition.clone()))
            .collect();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|(name, _)| *name == "filters[published_op]"));
        assert!(values.contains(&("filters[published_op]", VisibilityCondition::Value("bt".into()))));

        assert_eq!(
            form.second_date.visible_when,
            vec![VisibilityRule::value("filters[published_op]", "bt")]
        );
        assert_eq!(
            form.year_month.visible_when,
            vec![VisibilityRule::value("filters[published_op]", "ym")]
        );
        assert_eq!(
            form.year_month.month.visible_when,
            vec![VisibilityRule::filled(
                "filters[published_year_month_wrapper][published_year]"
            )]
        );
    }

    #[test]
    fn test_datetime_config_collects_time() {
        let config = DateWidgetConfig {
            date_type: DateType::DateTime,
            ..DateWidgetConfig::default()
        };
        let form = build_widget(&facet(), &DateFilterState::empty(), &availability(), &config, &[]).unwrap();
        assert_eq!(form.first_date.date.time_element, TimeElement::Time);
        assert_eq!(form.second_date.date.time_element, TimeElement::Time);
    }

    #[test]
    fn test_defaults_from_between_token() {
        let state = resolver::resolve(Some(
            "bt|2024-03-01T00:00:00+00:00|2024-03-05T00:00:00+00:00",
        ));
        let form = build_widget(&facet(), &state, &availability(), &DateWidgetConfig::default(), &[]).unwrap();
        assert_eq!(form.operator.default_value.as_deref(), Some("bt"));
        assert!(form.first_date.date.default_value.is_some());
        assert!(form.second_date.date.default_value.is_some());
    }

    #[test]
    fn test_second_date_default_only_for_between() {
        let mut state = resolver::resolve(Some("gt|2024-03-01T00:00:00+00:00"));
        state.second_date = state.first_date;
        let form = build_widget(&facet(), &state, &availability(), &DateWidgetConfig::default(), &[]).unwrap();
        assert!(form.second_date.date.default_value.is_none());
    }

    #[test]
    fn test_year_month_defaults() {
        let state = DateFilterState::year_month(2023, Some(3));
        let form = build_widget(&facet(), &state, &availability(), &DateWidgetConfig::default(), &[]).unwrap();
        assert_eq!(form.year_month.year.default_value.as_deref(), Some("2023"));
        assert_eq!(form.year_month.month.default_value.as_deref(), Some("3"));

        let years: Vec<_> = form.year_month.year.options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(years, vec!["2023", "2024"]);
        assert_eq!(form.year_month.month.options.len(), 12);
    }

    #[test]
    fn test_unavailable_year_drops_year_and_month() {
        let state = DateFilterState::year_month(2019, Some(3));
        let form = build_widget(&facet(), &state, &availability(), &DateWidgetConfig::default(), &[]).unwrap();
        assert_eq!(form.year_month.year.default_value, None);
        assert_eq!(form.year_month.month.default_value, None);
    }

    #[test]
    fn test_default_value_form_is_required() {
        let form = build_default_value_form(
            &facet(),
            Some("lt|2024-01-01T00:00:00+00:00"),
            &availability(),
            &DateWidgetConfig::default(),
            &[],
        )
        .unwrap();
        assert!(form.operator.required);
        assert!(form.first_date.date.required);
        assert!(!form.second_date.date.required);
        assert_eq!(form.operator.default_value.as_deref(), Some("lt"));
    }

    #[test]
    fn test_configuration_form() {
        let form = build_configuration_form(&DateWidgetConfig::default());
        let options: Vec<_> = form
            .options
            .iter()
            .map(|o| (o.value.as_str(), o.label.as_str()))
            .collect();
        assert_eq!(options, vec![("date", "Date only"), ("datetime", "Date and time")]);
        assert_eq!(form.default_value.as_deref(), Some("date"));

        let config = DateWidgetConfig::from_json(r#"{"date_type":"datetime"}"#).unwrap();
        let form = build_configuration_form(&config);
        assert_eq!(form.default_value.as_deref(), Some("datetime"));
    }

    #[test]
    fn test_element_names_follow_parents() {
        let form = build_widget(
            &facet(),
            &DateFilterState::empty(),
            &availability(),
            &DateWidgetConfig::default(),
            &["filters"],
        )
        .unwrap();

        assert_eq!(form.operator.name, "filters[published_op]");
        assert_eq!(
            form.first_date.date.name,
            "filters[published_first_date_wrapper][published_first_date]"
        );
        assert_eq!(
            form.second_date.date.name,
            "filters[published_second_date_wrapper][published_second_date]"
        );
        assert_eq!(
            form.year_month.year.name,
            "filters[published_year_month_wrapper][published_year]"
        );
        assert_eq!(
            form.year_month.month.name,
            "filters[published_year_month_wrapper][published_month]"
        );
    }
}

//! 表单提交校验
//!
//! 只有通过表单提交的 Between 需要校验；URL中的令牌直接按容错规则解码。

use serde::Serialize;
use thiserror::Error;

use crate::form::ElementKeys;
use crate::models::FilterOperator;
use crate::submission::FormSubmission;

pub const SECOND_DATE_REQUIRED: &str = "The second date is required.";
pub const SECOND_DATE_BEFORE_FIRST: &str = "The second date cannot be before the first date.";

/// 针对某个表单元素的错误
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// 出错元素的键名
    pub element: String,
    pub message: String,
}

#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[error("{}", join_errors(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, element: &str, message: &str) {
        self.errors.push(FieldError {
            element: element.to_string(),
            message: message.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn for_element(&self, element: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.element == element)
            .map(|e| e.message.as_str())
            .collect()
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.element, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 校验提交值，筛选ID显式传入用于定位出错元素
pub fn validate(facet_id: &str, submission: &FormSubmission) -> Result<(), ValidationErrors> {
    if submission.operator != Some(FilterOperator::Between) {
        return Ok(());
    }

    let keys = ElementKeys::new(facet_id);
    let mut errors = ValidationErrors::default();

    match (submission.first_date, submission.second_date) {
        (_, None) => errors.push(&keys.second_date, SECOND_DATE_REQUIRED),
        (Some(first), Some(second)) if second < first => {
            errors.push(&keys.second_date, SECOND_DATE_BEFORE_FIRST)
        }
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(facet_id, errors = %errors, "日期筛选表单校验失败");
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::parse_date_input;

    fn between(first: Option<&str>, second: Option<&str>) -> FormSubmission {
        FormSubmission {
            operator: Some(FilterOperator::Between),
            first_date: first.and_then(parse_date_input),
            second_date: second.and_then(parse_date_input),
            ..FormSubmission::default()
        }
    }

    #[test]
    fn test_second_date_before_first() {
        let errors = validate("published", &between(Some("2024-03-10"), Some("2024-03-05"))).unwrap_err();
        assert_eq!(errors.for_element("published_second_date"), vec![SECOND_DATE_BEFORE_FIRST]);
        assert_eq!(errors.errors.len(), 1);
    }

    #[test]
    fn test_second_date_required() {
        let errors = validate("published", &between(Some("2024-03-10"), None)).unwrap_err();
        assert_eq!(errors.for_element("published_second_date"), vec![SECOND_DATE_REQUIRED]);
    }

    #[test]
    fn test_valid_between() {
        assert!(validate("published", &between(Some("2024-03-05"), Some("2024-03-05"))).is_ok());
        assert!(validate("published", &between(Some("2024-03-05"), Some("2024-03-10"))).is_ok());
    }

    #[test]
    fn test_other_operators_are_not_validated() {
        let submission = FormSubmission {
            operator: Some(FilterOperator::After),
            ..FormSubmission::default()
        };
        assert!(validate("published", &submission).is_ok());
        assert!(validate("published", &FormSubmission::default()).is_ok());
    }

    #[test]
    fn test_error_display() {
        let errors = validate("d", &between(None, None)).unwrap_err();
        assert_eq!(errors.to_string(), "d_second_date: The second date is required.");
    }

    #[test]
    fn test_errors_join_and_act_as_std_error() {
        let errors = validate("d", &between(Some("2024-03-10"), Some("2024-03-05"))).unwrap_err();
        let boxed: Box<dyn std::error::Error> = Box::new(errors);
        assert_eq!(
            boxed.to_string(),
            "d_second_date: The second date cannot be before the first date."
        );
        assert!(boxed.source().is_none());
    }
}

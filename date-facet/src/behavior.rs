//! 月份选项可见性
//!
//! 让月份选择框只显示所选年份中实际存在数据的月份。这里是纯状态逻辑，
//! DOM绑定见 `dom` 模块。

use crate::availability::YearMonthAvailability;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthOption {
    pub month: u32,
    pub label: String,
    pub visible: bool,
    pub selected: bool,
}

impl MonthOption {
    pub fn new(month: u32, label: impl Into<String>) -> Self {
        Self {
            month,
            label: label.into(),
            visible: true,
            selected: false,
        }
    }
}

/// 月份选择框的状态
#[derive(Debug, Clone)]
pub struct MonthSelector {
    availability: YearMonthAvailability,
    latest_year: Option<i32>,
    options: Vec<MonthOption>,
}

impl MonthSelector {
    /// `initial_year` 为绑定时年份选择框的值
    pub fn new(
        availability: YearMonthAvailability,
        options: Vec<MonthOption>,
        initial_year: Option<i32>,
    ) -> Self {
        Self {
            availability,
            latest_year: initial_year,
            options,
        }
    }

    pub fn options(&self) -> &[MonthOption] {
        &self.options
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.latest_year
    }

    pub fn select(&mut self, month: u32) {
        for option in &mut self.options {
            option.selected = option.month == month;
        }
    }

    pub fn selected(&self) -> Option<u32> {
        self.options.iter().find(|o| o.selected).map(|o| o.month)
    }

    pub fn visible_months(&self) -> Vec<u32> {
        self.options.iter().filter(|o| o.visible).map(|o| o.month).collect()
    }

    /// 绑定时的首次同步，使用年份的当前值
    pub fn attach(&mut self) -> bool {
        let year = self.latest_year;
        self.on_year_change(year)
    }

    /// 年份变化时调用，返回是否需要通知月份选择框刷新
    ///
    /// 年份与上次不同则清除月份选择；年份在可用性索引中时，只显示该年存在的月份，
    /// 其它月份隐藏但保留。年份不在索引中时不改变可见性。
    pub fn on_year_change(&mut self, year: Option<i32>) -> bool {
        if self.latest_year != year {
            self.latest_year = year;
            for option in &mut self.options {
                option.selected = false;
            }
        }

        let months = match year {
            Some(y) => self.availability.months(y),
            None => None,
        };
        let Some(months) = months else {
            return false;
        };
        for option in &mut self.options {
            option.visible = months.contains(&option.month);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(initial_year: Option<i32>) -> MonthSelector {
        let availability =
            YearMonthAvailability::from_json(r#"{"2023":[1,3],"2024":[2]}"#).unwrap();
        let options = (1..=12).map(|m| MonthOption::new(m, format!("M{}", m))).collect();
        MonthSelector::new(availability, options, initial_year)
    }

    #[test]
    fn test_year_shows_only_available_months() {
        let mut selector = selector(None);
        assert!(selector.on_year_change(Some(2023)));
        assert_eq!(selector.visible_months(), vec![1, 3]);
        assert_eq!(selector.options().len(), 12);
    }

    #[test]
    fn test_switching_year_clears_month() {
        let mut selector = selector(None);
        selector.on_year_change(Some(2023));
        selector.select(3);
        assert_eq!(selector.selected(), Some(3));

        selector.on_year_change(Some(2024));
        assert_eq!(selector.selected(), None);
        assert_eq!(selector.visible_months(), vec![2]);
    }

    #[test]
    fn test_same_year_keeps_selection() {
        let mut selector = selector(Some(2023));
        selector.select(1);
        assert!(selector.on_year_change(Some(2023)));
        assert_eq!(selector.selected(), Some(1));
        let first = selector.visible_months();
        selector.on_year_change(Some(2023));
        assert_eq!(selector.visible_months(), first);
    }

    #[test]
    fn test_attach_syncs_prefilled_year() {
        let mut selector = selector(Some(2024));
        selector.select(2);
        assert!(selector.attach());
        assert_eq!(selector.visible_months(), vec![2]);
        assert_eq!(selector.selected(), Some(2));
    }

    #[test]
    fn test_unknown_year_leaves_visibility() {
        let mut selector = selector(None);
        selector.on_year_change(Some(2023));
        selector.select(1);

        assert!(!selector.on_year_change(None));
        assert_eq!(selector.selected(), None);
        assert_eq!(selector.visible_months(), vec![1, 3]);
        assert!(!selector.on_year_change(Some(1999)));
        assert_eq!(selector.latest_year(), Some(1999));
    }
}

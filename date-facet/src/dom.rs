//! 月份可见性的DOM绑定
//!
//! 每个组件只绑定一次，绑定后立即按年份当前值同步一次，
//! 之后在年份 `change` 事件中更新月份选项。

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{console, Element, Event, HtmlOptionElement, HtmlSelectElement};

use crate::availability::YearMonthAvailability;
use crate::behavior::{MonthOption, MonthSelector};
use crate::form::{DATA_YEAR_MONTHS, MONTH_CLASS, WRAPPER_CLASS, YEAR_CLASS};

const PROCESSED_ATTR: &str = "data-date-widget-processed";

/// 绑定 `context` 内（含自身）尚未处理的日期组件，返回本次绑定的数量
pub fn attach(context: &Element) -> Result<usize, JsValue> {
    let selector = format!(".{}", WRAPPER_CLASS);
    let mut wrappers = Vec::new();
    if context.matches(&selector)? {
        wrappers.push(context.clone());
    }
    let nodes = context.query_selector_all(&selector)?;
    for i in 0..nodes.length() {
        if let Some(node) = nodes.item(i) {
            wrappers.push(node.dyn_into::<Element>().map_err(JsValue::from)?);
        }
    }

    let mut attached = 0;
    for wrapper in wrappers {
        if wrapper.has_attribute(PROCESSED_ATTR) {
            continue;
        }
        wrapper.set_attribute(PROCESSED_ATTR, "")?;
        attach_widget(&wrapper)?;
        attached += 1;
    }
    Ok(attached)
}

/// 绑定整个文档
pub fn attach_document() -> Result<usize, JsValue> {
    let root = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.document_element())
        .ok_or_else(|| JsValue::from_str("无法获取文档根元素"))?;
    attach(&root)
}

fn find_select(wrapper: &Element, class: &str) -> Result<HtmlSelectElement, JsValue> {
    wrapper
        .query_selector(&format!(".{}", class))?
        .ok_or_else(|| JsValue::from_str(&format!("缺少选择框: .{}", class)))?
        .dyn_into::<HtmlSelectElement>()
        .map_err(JsValue::from)
}

/// 月份选择框中的选项元素，跳过空选项
fn month_elements(select: &HtmlSelectElement) -> Vec<(u32, HtmlOptionElement)> {
    let options = select.options();
    (0..options.length())
        .filter_map(|i| options.item(i))
        .filter_map(|el| el.dyn_into::<HtmlOptionElement>().ok())
        .filter_map(|option| {
            let month = option.value().parse::<u32>().ok().filter(|m| *m > 0)?;
            Some((month, option))
        })
        .collect()
}

fn selected_year(select: &HtmlSelectElement) -> Option<i32> {
    select.value().trim().parse().ok()
}

struct Widget {
    selector: MonthSelector,
    year_select: HtmlSelectElement,
    month_select: HtmlSelectElement,
    month_options: Vec<(u32, HtmlOptionElement)>,
}

impl Widget {
    /// 把状态写回DOM：隐藏不可用的月份，必要时清除选择并触发刷新
    fn apply(&self, refresh: bool, clear_selection: bool) -> Result<(), JsValue> {
        for (state, (_, element)) in self.selector.options().iter().zip(&self.month_options) {
            element.set_hidden(!state.visible);
            if clear_selection {
                element.set_selected(false);
            }
        }

        if refresh {
            // 通知其它脚本（例如下拉美化组件）刷新
            let event = Event::new("change")?;
            self.month_select.dispatch_event(&event)?;
        }
        Ok(())
    }

    fn on_attach(&mut self) -> Result<(), JsValue> {
        let refresh = self.selector.attach();
        self.apply(refresh, false)
    }

    fn on_year_change(&mut self) -> Result<(), JsValue> {
        // 先读取用户当前选择的月份，再按新的年份重新计算
        if let Some((month, _)) = self.month_options.iter().find(|(_, o)| o.selected()) {
            self.selector.select(*month);
        }

        let year = selected_year(&self.year_select);
        let year_changed = self.selector.latest_year() != year;
        let refresh = self.selector.on_year_change(year);
        self.apply(refresh, year_changed)
    }
}

fn attach_widget(wrapper: &Element) -> Result<(), JsValue> {
    let json = wrapper.get_attribute(DATA_YEAR_MONTHS).unwrap_or_else(|| "{}".to_string());
    let availability = YearMonthAvailability::from_json(&json)
        .map_err(|e| JsValue::from_str(&format!("解析年月数据失败: {}", e)))?;

    let year_select = find_select(wrapper, YEAR_CLASS)?;
    let month_select = find_select(wrapper, MONTH_CLASS)?;
    let month_options = month_elements(&month_select);

    let options = month_options
        .iter()
        .map(|(month, element)| {
            let mut option = MonthOption::new(*month, element.text());
            option.selected = element.selected();
            option
        })
        .collect();

    let initial_year = selected_year(&year_select);
    let widget = Rc::new(RefCell::new(Widget {
        selector: MonthSelector::new(availability, options, initial_year),
        year_select: year_select.clone(),
        month_select,
        month_options,
    }));

    let handler = {
        let widget = Rc::clone(&widget);
        Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if let Err(e) = widget.borrow_mut().on_year_change() {
                console::error_1(&e);
            }
        })
    };
    year_select.add_event_listener_with_callback("change", handler.as_ref().unchecked_ref())?;
    handler.forget();

    // 首次同步，预填的年份立即生效
    widget.borrow_mut().on_attach()?;
    Ok(())
}

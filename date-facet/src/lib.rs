use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Mutex;
use wasm_bindgen::prelude::*;
use web_sys::console;

// 导出模块
pub mod availability;
pub mod behavior;
pub mod codec;
pub mod dom;
pub mod error;
pub mod form;
pub mod index;
pub mod models;
pub mod resolver;
pub mod submission;
pub mod validation;

pub use availability::{FacetSource, YearMonthAvailability};
pub use error::{Error, Result};
pub use index::ItemIndex;
pub use models::{DateFilterState, DateType, DateWidgetConfig, FilterOperator, SiteTimezone};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

// 全局索引存储
static INDEX: OnceCell<Mutex<Option<ItemIndex>>> = OnceCell::new();

/// 初始化函数 - 设置错误处理
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// 版本信息
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(context: &str, e: impl Display) -> JsValue {
    let message = format!("{}: {}", context, e);
    console::error_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

/// 序列化为普通JS对象（映射输出为对象而不是Map）
fn to_js<T: Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| js_error("序列化失败", e))
}

/// 在已加载的索引上执行查询
fn with_index<T>(f: impl FnOnce(&ItemIndex) -> Result<T>) -> Result<T> {
    let cell = INDEX
        .get()
        .ok_or_else(|| Error::Index("索引未初始化".to_string()))?;
    let guard = cell
        .lock()
        .map_err(|_| Error::Index("索引锁已损坏".to_string()))?;
    let index = guard
        .as_ref()
        .ok_or_else(|| Error::Index("索引未加载".to_string()))?;
    f(index)
}

/// 为某个筛选源和日期字段构建年月可用性索引
pub fn year_months_for(
    index: &ItemIndex,
    facet_source: &str,
    field: &str,
    config: &DateWidgetConfig,
) -> Result<YearMonthAvailability> {
    let source = FacetSource::parse(facet_source)?;
    let formatter = availability::ZoneDateFormatter::from_config(config);
    availability::from_index(index, &source, field, config, &formatter)
}

/// 日期筛选的JS接口
#[wasm_bindgen]
pub struct DateFacetJS;

#[wasm_bindgen]
impl DateFacetJS {
    /// 加载压缩的列表索引，重复调用会替换已加载的索引
    #[wasm_bindgen]
    pub fn init(index_data: &[u8]) -> std::result::Result<(), JsValue> {
        let started = js_sys::Date::now();
        let index = ItemIndex::from_compressed(index_data).map_err(|e| js_error("解析索引失败", e))?;
        console::log_1(&JsValue::from_str(&format!(
            "列表索引已加载: {} 个条目，耗时 {:.1}ms",
            index.items().len(),
            js_sys::Date::now() - started
        )));
        let cell = INDEX.get_or_init(|| Mutex::new(None));
        let mut guard = cell
            .lock()
            .map_err(|_| JsValue::from_str("索引锁已损坏"))?;
        *guard = Some(index);
        Ok(())
    }

    /// 将URL令牌解析为筛选状态，无效的令牌得到空状态
    #[wasm_bindgen]
    pub fn resolve(token: Option<String>) -> std::result::Result<JsValue, JsValue> {
        let state = resolver::resolve(token.as_deref());
        to_js(&state)
    }

    /// 将筛选状态编码为URL令牌，状态不完整时返回 undefined
    #[wasm_bindgen]
    pub fn encode(state_json: &str, config_json: &str) -> std::result::Result<Option<String>, JsValue> {
        let state: DateFilterState =
            serde_json::from_str(state_json).map_err(|e| js_error("解析筛选状态失败", e))?;
        let config = DateWidgetConfig::from_json(config_json).map_err(|e| js_error("解析配置失败", e))?;
        Ok(codec::encode_state(&state, &config.timezone))
    }

    /// 处理表单提交：校验通过时返回 `{token}`，否则返回 `{errors}`
    ///
    /// `values_json` 的键为表单元素的 `name`，`parents` 需与构建表单时一致。
    #[wasm_bindgen]
    pub fn submit(
        facet_id: &str,
        values_json: &str,
        config_json: &str,
        parents: Option<Vec<String>>,
    ) -> std::result::Result<JsValue, JsValue> {
        let values: HashMap<String, String> =
            serde_json::from_str(values_json).map_err(|e| js_error("解析表单值失败", e))?;
        let config = DateWidgetConfig::from_json(config_json).map_err(|e| js_error("解析配置失败", e))?;
        let parents = parents.unwrap_or_default();
        let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
        let submitted = submission::FormSubmission::from_values(facet_id, &parents, &values);

        let result = match submission::submission_token(facet_id, &submitted, &config) {
            Ok(token) => serde_json::json!({ "token": token }),
            Err(submission::SubmissionError::Validation(errors)) => {
                serde_json::json!({ "errors": errors.errors })
            }
            Err(e) => return Err(js_error("处理表单失败", e)),
        };
        to_js(&result)
    }

    /// 返回年月可用性索引的JSON，例如 `{"2024":[1,2]}`
    #[wasm_bindgen]
    pub fn year_months(
        facet_source: &str,
        field: &str,
        config_json: &str,
    ) -> std::result::Result<String, JsValue> {
        let config = DateWidgetConfig::from_json(config_json).map_err(|e| js_error("解析配置失败", e))?;
        with_index(|index| year_months_for(index, facet_source, field, &config)?.to_json())
            .map_err(|e| js_error("构建年月索引失败", e))
    }

    /// 构建日期筛选表单描述
    #[wasm_bindgen]
    pub fn build_widget(
        facet_id: &str,
        facet_name: &str,
        token: Option<String>,
        year_months_json: &str,
        config_json: &str,
        parents: Option<Vec<String>>,
    ) -> std::result::Result<JsValue, JsValue> {
        let config = DateWidgetConfig::from_json(config_json).map_err(|e| js_error("解析配置失败", e))?;
        let availability =
            YearMonthAvailability::from_json(year_months_json).map_err(|e| js_error("解析年月数据失败", e))?;
        let facet = form::Facet::new(facet_id, facet_name);
        let state = resolver::resolve(token.as_deref());
        let parents = parents.unwrap_or_default();
        let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
        let widget = form::build_widget(&facet, &state, &availability, &config, &parents)
            .map_err(|e| js_error("构建表单失败", e))?;
        to_js(&widget)
    }

    /// 构建筛选配置表单（日期类型选择）
    #[wasm_bindgen]
    pub fn configuration_form(config_json: &str) -> std::result::Result<JsValue, JsValue> {
        let config = DateWidgetConfig::from_json(config_json).map_err(|e| js_error("解析配置失败", e))?;
        to_js(&form::build_configuration_form(&config))
    }

    /// 按URL令牌筛选已加载索引中的条目，令牌无效时返回空列表
    #[wasm_bindgen]
    pub fn filter_items(token: &str, field: &str) -> std::result::Result<JsValue, JsValue> {
        let comparison = codec::decode(token).and_then(|decoded| decoded.comparison());
        let items = match comparison {
            Some(comparison) => with_index(|index| Ok(index.filter(&comparison, field)))
                .map_err(|e| js_error("筛选失败", e))?,
            None => Vec::new(),
        };
        to_js(&items)
    }

    /// 绑定 `element` 内的月份可见性行为，返回本次绑定的组件数量
    #[wasm_bindgen]
    pub fn attach(element: &web_sys::Element) -> std::result::Result<usize, JsValue> {
        dom::attach(element)
    }

    /// 绑定整个文档
    #[wasm_bindgen]
    pub fn attach_document() -> std::result::Result<usize, JsValue> {
        dom::attach_document()
    }
}

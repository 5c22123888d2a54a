use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 列表索引中表示内容子类型（bundle）的字段名
pub const BUNDLE_FIELD: &str = "bundle";

/// 列表条目 - 索引中的一条实体记录
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ListItem {
    /// 条目唯一标识符
    pub id: String,
    /// 条目标题
    pub title: String,
    /// 条目URL路径
    #[serde(default)]
    pub url: String,
    /// 实体类型，例如 node
    pub entity_type: String,
    /// 实体子类型，例如 news
    #[serde(default)]
    pub bundle: Option<String>,
    /// 日期字段: 字段名 -> 字段值列表
    #[serde(default)]
    pub dates: BTreeMap<String, Vec<DateTime<Utc>>>,
}

impl ListItem {
    /// 数据源标识，格式：entity:<实体类型>
    pub fn datasource(&self) -> String {
        format!("entity:{}", self.entity_type)
    }

    /// 返回日期字段的第一个值
    pub fn first_date(&self, field: &str) -> Option<DateTime<Utc>> {
        self.dates.get(field).and_then(|values| values.first().copied())
    }
}

/// 索引元数据
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IndexMetadata {
    /// 索引包含的条目数量
    pub item_count: usize,
    /// 索引创建时间
    pub created_at: DateTime<Utc>,
    /// 索引版本
    pub version: String,
    /// 索引中出现过的字段名（已排序）
    pub fields: Vec<String>,
}

/// 列表索引 - 写入二进制容器的完整数据
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ListIndex {
    pub metadata: IndexMetadata,
    pub items: Vec<ListItem>,
}

impl ListIndex {
    /// 由条目列表构建索引，自动汇总字段名
    pub fn new(items: Vec<ListItem>, created_at: DateTime<Utc>) -> Self {
        let mut fields: Vec<String> = items
            .iter()
            .flat_map(|item| item.dates.keys().cloned())
            .collect();
        if items.iter().any(|item| item.bundle.is_some()) {
            fields.push(BUNDLE_FIELD.to_string());
        }
        fields.sort();
        fields.dedup();

        Self {
            metadata: IndexMetadata {
                item_count: items.len(),
                created_at,
                version: env!("CARGO_PKG_VERSION").to_string(),
                fields,
            },
            items,
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.metadata.fields.iter().any(|f| f == field)
    }
}

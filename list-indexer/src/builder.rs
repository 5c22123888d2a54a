use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use utils_common::compression::to_compressed;
use utils_common::{ListIndex, ListItem, INDEX_FORMAT_VERSION};

/// 列表索引构建器
#[derive(Default)]
pub struct IndexBuilder {
    items: Vec<ListItem>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加条目，ID重复时后添加的覆盖先添加的
    pub fn add_item(&mut self, item: ListItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            debug!(id = %item.id, "覆盖重复的条目");
            *existing = item;
        } else {
            self.items.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 构建列表索引
    pub fn build(&self, created_at: DateTime<Utc>) -> Result<ListIndex, String> {
        if self.items.is_empty() {
            return Err("无法构建索引: 没有条目数据".to_string());
        }
        let index = ListIndex::new(self.items.clone(), created_at);
        info!(
            items = index.metadata.item_count,
            fields = ?index.metadata.fields,
            "列表索引构建完成"
        );
        Ok(index)
    }

    /// 构建并保存索引到文件
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let index = self.build(Utc::now())?;
        let data = to_compressed(&index, INDEX_FORMAT_VERSION)
            .map_err(|e| format!("压缩索引失败: {}", e))?;

        let mut file = File::create(path)
            .map_err(|e| format!("无法创建文件 {}: {}", path.display(), e))?;
        file.write_all(&data)
            .map_err(|e| format!("写入文件失败 {}: {}", path.display(), e))?;

        info!(path = %path.display(), bytes = data.len(), "索引已保存");
        Ok(())
    }
}

/// 解析条目文件内容，支持单个对象或对象数组
pub fn parse_items(json: &str) -> Result<Vec<ListItem>, String> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| format!("JSON格式错误: {}", e))?;
    let items = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value),
        _ => serde_json::from_value(value).map(|item| vec![item]),
    };
    items.map_err(|e| format!("条目格式错误: {}", e))
}

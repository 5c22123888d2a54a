use chrono::{DateTime, Utc};
use tracing::info;
use utils_common::{compression, ListIndex, ListItem};

use crate::availability::{IndexQuery, IndexQueryRequest};
use crate::error::Result;
use crate::models::DateComparison;

/// 内存中的列表索引
#[derive(Debug, Clone)]
pub struct ItemIndex {
    inner: ListIndex,
}

impl ItemIndex {
    pub fn new(inner: ListIndex) -> Self {
        Self { inner }
    }

    /// 从压缩的二进制数据加载索引
    pub fn from_compressed(data: &[u8]) -> Result<Self> {
        let inner: ListIndex = compression::from_compressed(data)?;
        info!(
            items = inner.metadata.item_count,
            version = %inner.metadata.version,
            "列表索引加载完成"
        );
        Ok(Self::new(inner))
    }

    pub fn items(&self) -> &[ListItem] {
        &self.inner.items
    }

    fn matching<'a>(&'a self, request: &'a IndexQueryRequest) -> impl Iterator<Item = &'a ListItem> {
        self.inner.items.iter().filter(move |item| {
            item.datasource() == request.datasource
                && request
                    .bundle
                    .as_ref()
                    .map_or(true, |bundle| item.bundle.as_ref() == Some(bundle))
        })
    }

    /// 按比较条件筛选条目，按日期从新到旧排序
    pub fn filter(&self, comparison: &DateComparison, field: &str) -> Vec<ListItem> {
        let mut matched: Vec<(DateTime<Utc>, &ListItem)> = self
            .inner
            .items
            .iter()
            .filter_map(|item| item.first_date(field).map(|date| (date, item)))
            .filter(|(date, _)| comparison.matches(date))
            .collect();

        matched.sort_by(|a, b| b.0.cmp(&a.0));
        matched.into_iter().map(|(_, item)| item.clone()).collect()
    }
}

impl IndexQuery for ItemIndex {
    fn has_field(&self, field: &str) -> bool {
        self.inner.has_field(field)
    }

    fn date_values(&self, request: &IndexQueryRequest) -> Result<Vec<Option<DateTime<Utc>>>> {
        Ok(self
            .matching(request)
            .take(request.limit)
            .map(|item| item.first_date(&request.field))
            .collect())
    }
}

impl From<ListIndex> for ItemIndex {
    fn from(inner: ListIndex) -> Self {
        Self::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use utils_common::BUNDLE_FIELD;

    fn item(id: &str, entity_type: &str, bundle: &str, published: Option<DateTime<Utc>>) -> ListItem {
        let mut dates = BTreeMap::new();
        if let Some(date) = published {
            dates.insert("published".to_string(), vec![date]);
        }
        ListItem {
            id: id.to_string(),
            title: id.to_string(),
            url: format!("/{}", id),
            entity_type: entity_type.to_string(),
            bundle: Some(bundle.to_string()),
            dates,
        }
    }

    fn sample() -> ItemIndex {
        let at = |y, m, d| Some(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap());
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        ItemIndex::new(ListIndex::new(
            vec![
                item("a", "node", "news", at(2023, 5, 10)),
                item("b", "node", "news", at(2024, 1, 1)),
                item("c", "node", "event", at(2022, 7, 7)),
                item("d", "media", "news", at(2021, 2, 2)),
                item("e", "node", "news", None),
            ],
            created,
        ))
    }

    #[test]
    fn test_date_values_applies_conditions() {
        let index = sample();
        assert!(index.has_field(BUNDLE_FIELD));

        let request = IndexQueryRequest {
            datasource: "entity:node".to_string(),
            bundle: Some("news".to_string()),
            field: "published".to_string(),
            limit: 100,
        };
        let values = index.date_values(&request).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values.iter().filter(|v| v.is_none()).count(), 1);
    }

    #[test]
    fn test_date_values_respects_limit() {
        let index = sample();
        let request = IndexQueryRequest {
            datasource: "entity:node".to_string(),
            bundle: None,
            field: "published".to_string(),
            limit: 2,
        };
        assert_eq!(index.date_values(&request).unwrap().len(), 2);
    }

    #[test]
    fn test_filter_newest_first() {
        let index = sample();
        let comparison = codec::decode("gt|2022-01-01T00:00:00+00:00")
            .and_then(|d| d.comparison())
            .unwrap();
        let ids: Vec<String> = index
            .filter(&comparison, "published")
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_load_from_compressed() {
        let index = sample();
        let data =
            compression::to_compressed(&index.inner, utils_common::INDEX_FORMAT_VERSION).unwrap();
        let loaded = ItemIndex::from_compressed(&data).unwrap();
        assert_eq!(loaded.items().len(), 5);
        assert!(ItemIndex::from_compressed(b"garbage").is_err());
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use sales_common::compression::{from_compressed, to_compressed, SNAPSHOT_VERSION};
use sales_common::{Error, Result, SaleRecord};

use crate::models::{
    Dimension, SalesIndexes, SalesStore, SortDirection, SortField, SortKey,
};

/// 数据集构建器 - 加载时一次性构建索引和排序
#[derive(Debug, Default)]
pub struct StoreBuilder {
    records: Vec<SaleRecord>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加记录，其位置即为添加顺序
    pub fn add_record(&mut self, record: SaleRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 构建只读数据集；空数据集视为加载失败
    pub fn build(self) -> Result<SalesStore> {
        if self.records.is_empty() {
            return Err(Error::EmptyDataset);
        }

        info!("开始构建销售索引，记录数量: {}", self.records.len());

        let indexes = build_indexes(&self.records);
        let sorts = build_sorts(&self.records);
        let positions = build_positions(&sorts, self.records.len());

        info!(
            "索引构建完成，地区: {}, 性别: {}, 品类: {}, 支付方式: {}, 标签: {}",
            indexes.region.len(),
            indexes.gender.len(),
            indexes.product_category.len(),
            indexes.payment_method.len(),
            indexes.tag.len()
        );

        Ok(SalesStore {
            records: self.records,
            indexes,
            sorts,
            positions,
        })
    }

    /// 构建并保存快照
    pub fn save_store(self, path: impl AsRef<Path>) -> Result<SalesStore> {
        let store = self.build()?;
        store.save(path)?;
        Ok(store)
    }
}

/// 单次遍历构建全部分类维度的倒排索引
///
/// 每个桶内的位置严格升序；空值不建索引，标签对每个取值各记一次。
pub fn build_indexes(records: &[SaleRecord]) -> SalesIndexes {
    let mut indexes = SalesIndexes::default();

    for (pos, record) in records.iter().enumerate() {
        let single = [
            (Dimension::Region, &record.customer_region),
            (Dimension::Gender, &record.gender),
            (Dimension::ProductCategory, &record.product_category),
            (Dimension::PaymentMethod, &record.payment_method),
        ];
        for (dimension, value) in single {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                push_position(indexes.get_mut(dimension), value, pos);
            }
        }

        for tag in record.tags.iter().filter(|t| !t.is_empty()) {
            push_position(&mut indexes.tag, tag, pos);
        }
    }

    indexes
}

fn push_position(index: &mut HashMap<String, Vec<usize>>, value: &str, pos: usize) {
    let bucket = index.entry(value.to_string()).or_default();
    // 同一记录重复的标签只记一次
    if bucket.last() != Some(&pos) {
        bucket.push(pos);
    }
}

/// 比较两条记录的排序字段；缺失值视为最小
fn compare_field(records: &[SaleRecord], field: SortField, a: usize, b: usize) -> Ordering {
    let (ra, rb) = (&records[a], &records[b]);
    match field {
        SortField::Date => ra.date_value.cmp(&rb.date_value),
        SortField::Quantity => ra.quantity.unwrap_or(0).cmp(&rb.quantity.unwrap_or(0)),
        SortField::CustomerName => ra.customer_name_lower.cmp(&rb.customer_name_lower),
    }
}

/// 为六种排序键各构建一个全部位置的稳定排序
///
/// 主键相同的记录保持原始位置顺序，降序也不例外。
pub fn build_sorts(records: &[SaleRecord]) -> HashMap<SortKey, Vec<usize>> {
    SortKey::ALL
        .iter()
        .map(|&key| {
            let mut order: Vec<usize> = (0..records.len()).collect();
            order.sort_by(|&a, &b| match key.direction {
                SortDirection::Asc => compare_field(records, key.field, a, b),
                SortDirection::Desc => compare_field(records, key.field, b, a),
            });
            debug!("排序 {} 构建完成", key);
            (key, order)
        })
        .collect()
}

/// 为每个排序构建 位置 -> 名次 的反查表
pub fn build_positions(
    sorts: &HashMap<SortKey, Vec<usize>>,
    size: usize,
) -> HashMap<SortKey, Vec<usize>> {
    sorts
        .iter()
        .map(|(&key, order)| {
            let mut ranks = vec![0; size];
            for (rank, &pos) in order.iter().enumerate() {
                ranks[pos] = rank;
            }
            (key, ranks)
        })
        .collect()
}

impl SalesStore {
    /// 序列化为压缩快照
    pub fn to_compressed(&self) -> Result<Vec<u8>> {
        to_compressed(self, SNAPSHOT_VERSION)
    }

    /// 从压缩快照恢复，并校验排序与索引的完整性
    pub fn from_compressed(data: &[u8]) -> Result<Self> {
        let store: SalesStore = from_compressed(data)?;
        store.validate()?;
        info!("快照加载完成，记录数量: {}", store.len());
        Ok(store)
    }

    /// 保存快照到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_compressed()?;
        fs::write(path, &data)?;
        info!("快照已写入: {}，大小: {} 字节", path.display(), data.len());
        Ok(())
    }

    /// 从文件加载快照
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Self::from_compressed(&data)
    }

    /// 校验: 非空，六种排序都是全部位置的排列，名次表与排序一致，索引位置不越界
    pub fn validate(&self) -> Result<()> {
        let size = self.records.len();
        if size == 0 {
            return Err(Error::EmptyDataset);
        }

        for key in SortKey::ALL {
            let order = self
                .sorts
                .get(&key)
                .ok_or_else(|| Error::InvalidSnapshot(format!("缺少排序 {key}")))?;
            let ranks = self
                .positions
                .get(&key)
                .ok_or_else(|| Error::InvalidSnapshot(format!("缺少名次表 {key}")))?;

            if order.len() != size || ranks.len() != size {
                return Err(Error::InvalidSnapshot(format!(
                    "排序 {key} 长度不匹配: {} / {} / {}",
                    order.len(),
                    ranks.len(),
                    size
                )));
            }

            let mut seen = vec![false; size];
            for (rank, &pos) in order.iter().enumerate() {
                if pos >= size || seen[pos] || ranks[pos] != rank {
                    return Err(Error::InvalidSnapshot(format!(
                        "排序 {key} 在名次 {rank} 处不一致"
                    )));
                }
                seen[pos] = true;
            }
        }

        for dimension in Dimension::ALL {
            let out_of_range = self
                .indexes
                .get(dimension)
                .values()
                .flatten()
                .any(|&pos| pos >= size);
            if out_of_range {
                return Err(Error::InvalidSnapshot(format!(
                    "索引 {dimension:?} 含有越界位置"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sales_common::RawSale;

    use super::*;

    fn record(name: &str, region: &str, quantity: Option<&str>, date: &str, tags: &str) -> SaleRecord {
        SaleRecord::from_raw(RawSale {
            customer_name: Some(name.into()),
            customer_region: Some(region.into()),
            quantity: quantity.map(Into::into),
            date: Some(date.into()),
            tags: Some(tags.into()),
            ..Default::default()
        })
    }

    fn records() -> Vec<SaleRecord> {
        vec![
            record("carol", "North", Some("2"), "2024-01-01", "a,b"),
            record("Alice", "", Some("5"), "2024-03-01", "b"),
            record("bob", "South", None, "not a date", "a;a"),
            record("alice", "North", Some("2"), "2024-02-01", ""),
        ]
    }

    #[test]
    fn indexes_ascending_and_skip_empty() {
        let indexes = build_indexes(&records());
        assert_eq!(indexes.region["North"], vec![0, 3]);
        assert_eq!(indexes.region["South"], vec![2]);
        assert!(!indexes.region.contains_key(""));
        assert_eq!(indexes.tag["a"], vec![0, 2]);
        assert_eq!(indexes.tag["b"], vec![0, 1]);
        assert!(indexes.gender.is_empty());
    }

    #[test]
    fn sorts_are_stable_in_both_directions() {
        let sorts = build_sorts(&records());

        // 数量: 缺失按 0 处理，相同数量保持位置顺序
        let qty_asc = &sorts[&SortKey::new(SortField::Quantity, SortDirection::Asc)];
        assert_eq!(qty_asc, &vec![2, 0, 3, 1]);
        let qty_desc = &sorts[&SortKey::new(SortField::Quantity, SortDirection::Desc)];
        assert_eq!(qty_desc, &vec![1, 0, 3, 2]);

        // 名称: 不区分大小写，"Alice" 与 "alice" 保持位置顺序
        let name_asc = &sorts[&SortKey::new(SortField::CustomerName, SortDirection::Asc)];
        assert_eq!(name_asc, &vec![1, 3, 2, 0]);
        let name_desc = &sorts[&SortKey::new(SortField::CustomerName, SortDirection::Desc)];
        assert_eq!(name_desc, &vec![0, 2, 1, 3]);

        // 日期: 无法解析的日期最小
        let date_asc = &sorts[&SortKey::new(SortField::Date, SortDirection::Asc)];
        assert_eq!(date_asc, &vec![2, 0, 3, 1]);
        assert_eq!(sorts[&SortKey::default()], vec![1, 3, 0, 2]);
    }

    #[test]
    fn ranks_invert_orders() {
        let records = records();
        let sorts = build_sorts(&records);
        let positions = build_positions(&sorts, records.len());
        assert_eq!(positions.len(), 6);
        for key in SortKey::ALL {
            for (rank, &pos) in sorts[&key].iter().enumerate() {
                assert_eq!(positions[&key][pos], rank);
            }
        }
    }

    #[test]
    fn empty_dataset_is_fatal() {
        assert!(matches!(StoreBuilder::new().build(), Err(Error::EmptyDataset)));
    }

    #[test]
    fn validate_rejects_broken_permutation() {
        let mut builder = StoreBuilder::new();
        records().into_iter().for_each(|r| builder.add_record(r));
        let mut store = builder.build().unwrap();
        assert!(store.validate().is_ok());

        let key = SortKey::default();
        store.sorts.get_mut(&key).unwrap().swap(0, 1);
        assert!(matches!(store.validate(), Err(Error::InvalidSnapshot(_))));
    }
}

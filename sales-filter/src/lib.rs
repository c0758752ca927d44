use std::borrow::Cow;

use log::debug;
use sales_common::models::strip_whitespace;
use sales_common::SaleRecord;

pub mod builder;
pub mod candidate;
pub mod models;
pub mod wasm;

pub use builder::{build_indexes, build_positions, build_sorts, StoreBuilder};
pub use candidate::CandidateSet;
pub use models::{
    AgeRange, DateRange, Dimension, FilterRequest, PageSummary, PaginationParams, SalesIndexes,
    SalesMeta, SalesPage, SalesStore, SortDirection, SortField, SortKey, SortParams,
};

use candidate::{intersection_from_index, union_from_index};

/// 版本信息
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 销售查询引擎 - 对只读数据集执行筛选、排序和分页
///
/// 每次查询都是纯函数，不修改任何共享状态。
#[derive(Debug, Clone, Copy)]
pub struct SalesFilter<'a> {
    store: &'a SalesStore,
}

impl<'a> SalesFilter<'a> {
    pub fn new(store: &'a SalesStore) -> Self {
        Self { store }
    }

    /// 执行查询
    ///
    /// 非法的排序、分页参数会被规范化为默认值，不会报错。
    pub fn query(&self, request: &FilterRequest) -> SalesPage {
        let (page, limit) = request.pagination.normalize();
        let offset = (page - 1).saturating_mul(limit);
        let sort_key = SortKey::normalize(&request.sort);
        let ranks = self.store.ranks(sort_key);

        let candidate = self.apply_index_filters(request);
        let post_filter = PostFilter::from_request(request);

        let ordered: Cow<'_, [usize]> = match candidate.ordered(ranks) {
            Some(positions) => Cow::Owned(positions),
            None => Cow::Borrowed(self.store.order(sort_key)),
        };

        let (total, items) = match &post_filter {
            None => {
                let items = ordered
                    .iter()
                    .skip(offset)
                    .take(limit)
                    .map(|&pos| self.store.records[pos].clone())
                    .collect::<Vec<_>>();
                (ordered.len(), items)
            }
            Some(filter) => self.scan(&ordered, filter, offset, limit),
        };

        debug!(
            "查询完成: 排序 {}, 索引约束 {}, 逐条过滤 {}, 总数 {}",
            sort_key,
            !candidate.is_unconstrained(),
            post_filter.is_some(),
            total
        );

        SalesPage {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit).max(1),
            summary: PageSummary::from_items(&items),
            items,
        }
    }

    /// 获取全部筛选选项，按字母顺序排列
    pub fn meta(&self) -> SalesMeta {
        let keys = |dimension| {
            let mut keys: Vec<String> = self
                .store
                .indexes
                .get(dimension)
                .keys()
                .filter(|k| !k.is_empty())
                .cloned()
                .collect();
            keys.sort();
            keys
        };

        SalesMeta {
            regions: keys(Dimension::Region),
            genders: keys(Dimension::Gender),
            product_categories: keys(Dimension::ProductCategory),
            payment_methods: keys(Dimension::PaymentMethod),
            tags: keys(Dimension::Tag),
        }
    }

    /// 依次用各维度的索引收窄候选集合
    fn apply_index_filters(&self, request: &FilterRequest) -> CandidateSet {
        Dimension::ALL
            .iter()
            .fold(CandidateSet::Unconstrained, |candidate, &dimension| {
                let index = self.store.indexes.get(dimension);
                let values = request.values(dimension);
                let constraint = match dimension {
                    Dimension::Tag => intersection_from_index(index, values),
                    _ => union_from_index(index, values),
                };
                candidate.intersect(constraint)
            })
    }

    /// 逐条过滤: 遍历完整序列以得到精确总数，同时收集当前页
    fn scan(
        &self,
        ordered: &[usize],
        filter: &PostFilter,
        offset: usize,
        limit: usize,
    ) -> (usize, Vec<SaleRecord>) {
        let mut items = Vec::with_capacity(limit.min(ordered.len()));
        let mut matched = 0;

        for &pos in ordered {
            let record = &self.store.records[pos];
            if !filter.matches(record) {
                continue;
            }
            if matched >= offset && items.len() < limit {
                items.push(record.clone());
            }
            matched += 1;
        }

        (matched, items)
    }
}

/// 无法由索引回答的条件: 关键词、年龄范围、日期范围
#[derive(Debug)]
struct PostFilter {
    search: Option<SearchTerm>,
    age: AgeRange,
    date_from: Option<i64>,
    date_to: Option<i64>,
}

#[derive(Debug)]
struct SearchTerm {
    lower: String,
    phone: String,
}

impl PostFilter {
    /// 不需要逐条过滤时返回 `None`
    fn from_request(request: &FilterRequest) -> Option<Self> {
        let search = request
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| SearchTerm {
                lower: s.to_lowercase(),
                phone: strip_whitespace(s),
            });

        if search.is_none() && !request.age.is_active() && !request.date_range.is_active() {
            return None;
        }

        Some(Self {
            search,
            age: request.age,
            date_from: request.date_range.from.map(|d| d.timestamp_millis()),
            date_to: request.date_range.to.map(|d| d.timestamp_millis()),
        })
    }

    fn matches(&self, record: &SaleRecord) -> bool {
        if let Some(term) = &self.search {
            let by_name = record.customer_name_lower.contains(&term.lower);
            let by_phone = record.phone_normalized.contains(&term.phone);
            if !by_name && !by_phone {
                return false;
            }
        }

        if self.age.is_active() && !within(record.age, self.age.min, self.age.max) {
            return false;
        }

        if (self.date_from.is_some() || self.date_to.is_some())
            && !within(record.date_value, self.date_from, self.date_to)
        {
            return false;
        }

        true
    }
}

/// 值存在且位于闭区间内
fn within<T: PartialOrd>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    let Some(value) = value else {
        return false;
    };
    if min.is_some_and(|min| value < min) {
        return false;
    }
    if max.is_some_and(|max| value > max) {
        return false;
    }
    true
}

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use sales_common::models::{parse_date, parse_number};
use sales_common::SaleRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 默认页码
pub const DEFAULT_PAGE: usize = 1;
/// 默认每页条数
pub const DEFAULT_LIMIT: usize = 10;

/// 倒排索引: 维度取值 -> 按位置升序排列的记录位置
pub type InvertedIndex = HashMap<String, Vec<usize>>;

/// 可建索引的分类维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Region,
    Gender,
    ProductCategory,
    PaymentMethod,
    Tag,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Region,
        Dimension::Gender,
        Dimension::ProductCategory,
        Dimension::PaymentMethod,
        Dimension::Tag,
    ];
}

/// 各分类维度的倒排索引
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SalesIndexes {
    pub region: InvertedIndex,
    pub gender: InvertedIndex,
    pub product_category: InvertedIndex,
    pub payment_method: InvertedIndex,
    pub tag: InvertedIndex,
}

impl SalesIndexes {
    pub fn get(&self, dimension: Dimension) -> &InvertedIndex {
        match dimension {
            Dimension::Region => &self.region,
            Dimension::Gender => &self.gender,
            Dimension::ProductCategory => &self.product_category,
            Dimension::PaymentMethod => &self.payment_method,
            Dimension::Tag => &self.tag,
        }
    }

    pub(crate) fn get_mut(&mut self, dimension: Dimension) -> &mut InvertedIndex {
        match dimension {
            Dimension::Region => &mut self.region,
            Dimension::Gender => &mut self.gender,
            Dimension::ProductCategory => &mut self.product_category,
            Dimension::PaymentMethod => &mut self.payment_method,
            Dimension::Tag => &mut self.tag,
        }
    }
}

/// 排序字段
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Date,
    Quantity,
    CustomerName,
}

impl SortField {
    /// 解析请求中的排序字段，未知字段返回 `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "date" => Some(SortField::Date),
            "quantity" => Some(SortField::Quantity),
            "customerName" => Some(SortField::CustomerName),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Date => "date",
            SortField::Quantity => "quantity",
            SortField::CustomerName => "customerName",
        }
    }
}

/// 排序方向
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// 一种全序: 排序字段 + 方向
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::new(SortField::Date, SortDirection::Asc),
        SortKey::new(SortField::Date, SortDirection::Desc),
        SortKey::new(SortField::Quantity, SortDirection::Asc),
        SortKey::new(SortField::Quantity, SortDirection::Desc),
        SortKey::new(SortField::CustomerName, SortDirection::Asc),
        SortKey::new(SortField::CustomerName, SortDirection::Desc),
    ];

    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// 规范化请求中的排序参数
    ///
    /// 字段未知或缺失时使用 `date`；只有 `order == "asc"` 才是升序。
    pub fn normalize(params: &SortParams) -> Self {
        let field = params
            .by
            .as_deref()
            .and_then(SortField::parse)
            .unwrap_or(SortField::Date);
        let direction = match params.order.as_deref() {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        };
        Self { field, direction }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::new(SortField::Date, SortDirection::Desc)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{}", self.field.as_str(), order)
    }
}

/// 已加载的销售数据及其预构建的索引、排序
///
/// 构建后只读，可在任意数量的并发查询间共享。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SalesStore {
    pub(crate) records: Vec<SaleRecord>,
    pub(crate) indexes: SalesIndexes,
    /// 排序键 -> 全部记录位置的一个排列
    pub(crate) sorts: HashMap<SortKey, Vec<usize>>,
    /// 排序键 -> 位置到名次的映射
    pub(crate) positions: HashMap<SortKey, Vec<usize>>,
}

impl SalesStore {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SaleRecord] {
        &self.records
    }

    pub fn indexes(&self) -> &SalesIndexes {
        &self.indexes
    }

    /// 指定排序键的记录位置序列，缺失时回退到默认排序
    pub fn order(&self, key: SortKey) -> &[usize] {
        self.sorts
            .get(&key)
            .or_else(|| self.sorts.get(&SortKey::default()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 指定排序键的名次表，缺失时回退到默认排序
    pub fn ranks(&self, key: SortKey) -> &[usize] {
        self.positions
            .get(&key)
            .or_else(|| self.positions.get(&SortKey::default()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// 年龄范围，两端均为闭区间且可选
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct AgeRange {
    #[serde(deserialize_with = "lenient_age")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient_age")]
    pub max: Option<f64>,
}

impl AgeRange {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// 日期范围，两端均为闭区间且可选
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DateRange {
    #[serde(deserialize_with = "lenient_date")]
    pub from: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_date")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn is_active(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}

// 请求字段逐个宽松解析: 类型不符或取值非法的字段按未设置处理，
// 不会让整个请求解析失败。

/// 嵌套对象不是对象时整体回退为默认值
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// 数字或数字字符串
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn lenient_age<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_of(&value).filter(|n| *n >= 0.0))
}

/// 整数，小数视为未设置
fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if let Some(n) = value.as_i64() {
        return Ok(Some(n));
    }
    Ok(number_of(&value)
        .filter(|n| n.fract() == 0.0)
        .map(|n| n as i64))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => parse_date(&s),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// 字符串列表；`null` 为空列表，单个字符串视为只有一项，非字符串元素被忽略
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

/// 排序参数 (原样接收，查询时规范化)
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SortParams {
    #[serde(deserialize_with = "lenient_text")]
    pub by: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub order: Option<String>,
}

/// 分页参数 (原样接收，查询时规范化)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PaginationParams {
    #[serde(deserialize_with = "lenient_integer")]
    pub page: Option<i64>,
    #[serde(deserialize_with = "lenient_integer")]
    pub limit: Option<i64>,
}

impl PaginationParams {
    /// 页码和条数必须为正整数，否则使用默认值
    pub fn normalize(&self) -> (usize, usize) {
        let positive = |v: Option<i64>| {
            v.filter(|n| *n > 0)
                .and_then(|n| usize::try_from(n).ok())
        };
        (
            positive(self.page).unwrap_or(DEFAULT_PAGE),
            positive(self.limit).unwrap_or(DEFAULT_LIMIT),
        )
    }
}

/// 筛选请求 - 与仪表盘的筛选对象结构一致
///
/// 分类维度列表为空表示不筛选；同一维度内为"或"，维度之间为"且"，
/// 标签维度例外：要求记录包含全部所请求的标签。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterRequest {
    #[serde(deserialize_with = "lenient_text")]
    pub search: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub regions: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub genders: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub product_categories: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub payment_methods: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub age: AgeRange,
    #[serde(deserialize_with = "lenient")]
    pub date_range: DateRange,
    #[serde(deserialize_with = "lenient")]
    pub sort: SortParams,
    #[serde(deserialize_with = "lenient")]
    pub pagination: PaginationParams,
}

impl FilterRequest {
    /// 解析仪表盘发来的 JSON
    ///
    /// 只有 JSON 文本本身无效时才报错；非对象或字段取值非法都回退为默认值。
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::deserialize(value).unwrap_or_default())
    }

    /// 指定维度请求的取值
    pub fn values(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Region => &self.regions,
            Dimension::Gender => &self.genders,
            Dimension::ProductCategory => &self.product_categories,
            Dimension::PaymentMethod => &self.payment_methods,
            Dimension::Tag => &self.tags,
        }
    }
}

/// 当前页的汇总数据
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub total_units: u64,
    pub total_revenue: f64,
    pub total_discount: f64,
}

impl PageSummary {
    pub fn from_items(items: &[SaleRecord]) -> Self {
        items.iter().fold(Self::default(), |mut acc, rec| {
            let final_amount = rec.final_amount.unwrap_or(0.0);
            let total_amount = rec.total_amount.unwrap_or(final_amount);
            acc.total_units += u64::from(rec.quantity.unwrap_or(0));
            acc.total_revenue += final_amount;
            acc.total_discount += (total_amount - final_amount).max(0.0);
            acc
        })
    }
}

/// 查询结果 - 一页数据
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SalesPage {
    pub page: usize,
    pub limit: usize,
    /// 忽略分页时的匹配总数
    pub total: usize,
    pub total_pages: usize,
    pub items: Vec<SaleRecord>,
    pub summary: PageSummary,
}

/// 筛选选项元数据
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SalesMeta {
    pub regions: Vec<String>,
    pub genders: Vec<String>,
    pub product_categories: Vec<String>,
    pub payment_methods: Vec<String>,
    pub tags: Vec<String>,
}

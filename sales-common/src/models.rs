use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 原始销售行 - 与数据集 CSV 表头一一对应，所有列都可能缺失
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct RawSale {
    #[serde(rename = "Transaction ID", default)]
    pub transaction_id: Option<String>,
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    #[serde(rename = "Customer ID", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "Customer Name", default)]
    pub customer_name: Option<String>,
    #[serde(rename = "Phone Number", default)]
    pub phone_number: Option<String>,
    #[serde(rename = "Gender", default)]
    pub gender: Option<String>,
    #[serde(rename = "Age", default)]
    pub age: Option<String>,
    #[serde(rename = "Customer Region", default)]
    pub customer_region: Option<String>,
    #[serde(rename = "Product Name", default)]
    pub product_name: Option<String>,
    #[serde(rename = "Product Category", default)]
    pub product_category: Option<String>,
    #[serde(rename = "Tags", default)]
    pub tags: Option<String>,
    #[serde(rename = "Quantity", default)]
    pub quantity: Option<String>,
    #[serde(rename = "Price per Unit", default)]
    pub price_per_unit: Option<String>,
    #[serde(rename = "Discount Percentage", default)]
    pub discount_percentage: Option<String>,
    #[serde(rename = "Total Amount", default)]
    pub total_amount: Option<String>,
    #[serde(rename = "Final Amount", default)]
    pub final_amount: Option<String>,
    #[serde(rename = "Payment Method", default)]
    pub payment_method: Option<String>,
    #[serde(rename = "Order Status", default)]
    pub order_status: Option<String>,
}

/// 销售记录 - 规范化后的单笔交易
///
/// 派生字段（小写姓名、去空白电话、日期时间戳）只在加载时计算一次。
/// `None` 表示字段缺失或无法解析，不会被静默替换为 0。
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    pub transaction_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub phone_number: Option<String>,
    pub customer_region: Option<String>,
    pub gender: Option<String>,
    pub age: Option<f64>,
    pub product_name: Option<String>,
    pub product_category: Option<String>,
    pub quantity: Option<u32>,
    pub price_per_unit: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub total_amount: Option<f64>,
    pub final_amount: Option<f64>,
    pub payment_method: Option<String>,
    pub order_status: Option<String>,
    pub tags: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    /// 小写客户名，用于搜索和按名称排序
    pub customer_name_lower: String,
    /// 去除所有空白后的电话号码
    pub phone_normalized: String,
    /// 日期的毫秒时间戳
    pub date_value: Option<i64>,
}

impl SaleRecord {
    /// 从原始行构建记录并计算派生字段
    pub fn from_raw(raw: RawSale) -> Self {
        let customer_name = non_empty(raw.customer_name);
        let phone_number = non_empty(raw.phone_number);
        let date = raw.date.as_deref().and_then(parse_date);

        Self {
            customer_name_lower: customer_name
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_default(),
            phone_normalized: phone_number
                .as_deref()
                .map(strip_whitespace)
                .unwrap_or_default(),
            date_value: date.map(|d| d.timestamp_millis()),
            date,
            transaction_id: non_empty(raw.transaction_id),
            customer_id: non_empty(raw.customer_id),
            customer_name,
            phone_number,
            customer_region: non_empty(raw.customer_region),
            gender: non_empty(raw.gender),
            age: raw.age.as_deref().and_then(parse_number),
            product_name: non_empty(raw.product_name),
            product_category: non_empty(raw.product_category),
            quantity: raw.quantity.as_deref().and_then(parse_count),
            price_per_unit: raw.price_per_unit.as_deref().and_then(parse_number),
            discount_percentage: raw.discount_percentage.as_deref().and_then(parse_number),
            total_amount: raw.total_amount.as_deref().and_then(parse_number),
            final_amount: raw.final_amount.as_deref().and_then(parse_number),
            payment_method: non_empty(raw.payment_method),
            order_status: non_empty(raw.order_status),
            tags: raw.tags.as_deref().map(split_tags).unwrap_or_default(),
        }
    }
}

/// 修剪空白，空字符串视为缺失
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 拆分标签字符串，支持 `;` `,` `|` 分隔
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split([';', ',', '|'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 去除所有空白字符
pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// 解析有限浮点数
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// 解析非负整数，接受 "25" 和 "25.0"
pub fn parse_count(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return Some(n);
    }
    parse_number(value)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as u32)
}

/// 解析日期
///
/// 支持 RFC 3339、`YYYY-MM-DD HH:MM:SS`、`YYYY-MM-DDTHH:MM:SS`，
/// 以及按 UTC 零点处理的 `YYYY-MM-DD`。
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub mod compression;
pub mod error;
pub mod models;

// 重新导出常用类型和函数
pub use compression::{from_compressed, to_compressed, SNAPSHOT_VERSION};
pub use error::{Error, Result};
pub use models::{parse_date, split_tags, RawSale, SaleRecord};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("数据文件不存在或不是有效文件: {0}")]
    MissingSource(PathBuf),

    #[error("缺少参数: {0}")]
    MissingArgument(&'static str),

    #[error("解析 CSV 失败: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] sales_common::Error),

    #[error("序列化结果失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

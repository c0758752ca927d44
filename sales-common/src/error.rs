use thiserror::Error;

/// 加载与快照相关的错误，全部属于启动期致命错误
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("无法构建索引: 没有销售记录")]
    EmptyDataset,

    #[error("无效的快照格式: {0}")]
    InvalidSnapshot(String),

    #[error("不支持的快照版本: {major}.{minor} (最高支持 {max})")]
    UnsupportedVersion { major: u8, minor: u8, max: u8 },

    #[error("解压后数据大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("序列化失败: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("反序列化失败: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

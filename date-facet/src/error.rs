//! 日期筛选组件的错误类型

use thiserror::Error;

/// 使用本crate错误类型的Result别名
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// 筛选源ID格式不正确
    #[error("Invalid facet source: {0}")]
    InvalidFacetSource(String),

    /// 时区偏移无法解析
    #[error("Invalid timezone offset: {0}")]
    InvalidTimezone(String),

    /// 索引未加载或读取失败
    #[error("Index error: {0}")]
    Index(String),

    /// 序列化/反序列化失败
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 索引容器读取失败
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

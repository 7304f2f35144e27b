use thiserror::Error;

/// 构造期的致命配置错误；上层把它转成非零退出码
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("invalid client selector '{0}': {1}")]
    InvalidClientSelector(String, String),
}

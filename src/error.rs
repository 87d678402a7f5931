//! 统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use thiserror::Error;

/// 翻译管道错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslateError {
    /// 配置错误（包括缺失的服务凭证）
    #[error("配置错误: {0}")]
    Config(String),

    /// 输入验证错误（空列表、超长列表、缺失语言代码）
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 网络传输错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 翻译服务返回失败或畸形响应
    #[error("翻译服务错误: {0}")]
    Provider(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 文档节点句柄已失效
    #[error("文档节点已失效")]
    StaleNode,

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl TranslateError {
    /// 判断错误是否应该终止整个调度过程
    ///
    /// 按设计只有内部错误是致命的：配置与服务错误以单个批次为
    /// 粒度上报，其余批次继续处理。
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranslateError::Internal(_))
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            TranslateError::Parse(format!("响应解码失败: {}", error))
        } else {
            TranslateError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for TranslateError {
    fn from(error: serde_json::Error) -> Self {
        TranslateError::Parse(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslateError {
    fn from(error: toml::de::Error) -> Self {
        TranslateError::Parse(format!("TOML解析错误: {}", error))
    }
}

impl From<std::io::Error> for TranslateError {
    fn from(error: std::io::Error) -> Self {
        TranslateError::Config(format!("IO错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslateResult<T> = Result<T, TranslateError>;

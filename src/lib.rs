//! # Pagetrans
//!
//! 为实时页面叠加机器翻译的客户端编排管道：发现可翻译文本、
//! 向外部翻译服务发起批量请求、把译文可逆地写回文档，并在文档
//! 变更时增量地重新处理新出现的内容。
//!
//! ## 模块组织
//!
//! - `dom` - 版本化节点竞技场实现的活动文档模型（含变更观察者）
//! - `extract` - 文本提取器（结构/可见性/内容过滤）
//! - `lang` - 基于字符脚本频率的语言分类器
//! - `cache` - 带TTL与容量上限的翻译缓存
//! - `provider` - 远程翻译服务边界（trait + HTTP实现）
//! - `schedule` - 并发上限下的批次调度器
//! - `apply` - 文档应用/还原器
//! - `watch` - 去抖动的文档变更观察管道
//! - `selection` - 划词即时翻译
//! - `settings` - 语言偏好与按域名覆盖的设置存储
//! - `message` - 封闭的消息枚举（宿主通信表面）
//! - `pipeline` - 顶层编排器

pub mod apply;
pub mod cache;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod lang;
pub mod message;
pub mod pipeline;
pub mod provider;
pub mod schedule;
pub mod selection;
pub mod settings;
pub mod watch;

// Re-export commonly used items for convenience
pub use config::PipelineConfig;
pub use dom::{Document, NodeId, Rect};
pub use error::{TranslateError, TranslateResult};
pub use pipeline::TranslatePipeline;
pub use provider::{TranslateProvider, TranslatedPair};

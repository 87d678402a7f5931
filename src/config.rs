//! 配置管理模块
//!
//! 提供简化的配置管理，支持配置文件、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TranslateError, TranslateResult};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 8;
    pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 6;
    pub const MAX_TEXTS_PER_REQUEST: usize = 50;
    pub const MAX_SELECTION_TEXTS: usize = 8;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;
    pub const MAX_TEXT_LENGTH: usize = 5000;
    pub const TRANSLATABLE_CHAR_THRESHOLD: f32 = 0.3;

    // 变更观察相关
    pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(100);

    // 缓存设置
    pub const MAX_CACHE_ENTRIES: usize = 1000;
    pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60); // 24小时

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "noscript", "code", "pre", "svg", "math", "canvas",
        "video", "audio", "embed", "object", "iframe", "img", "input",
        "textarea", "select", "option", "button",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "pagetrans.toml",
        ".pagetrans.toml",
        "pagetrans.json",
    ];
}

/// 管道配置
///
/// 覆盖提取、缓存、批次调度与观察者的所有可调参数。
/// 语言对不在这里：它属于用户设置（见 `settings` 模块），
/// 会在管道启动时和设置变更通知时读取。
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    // API配置
    pub api_url: String,
    pub api_key: Option<String>,

    // 批次配置
    pub batch_size: usize,
    pub max_concurrent_batches: usize,

    // 文本过滤配置
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub translatable_char_threshold: f32,

    // 缓存配置
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,

    // 变更观察配置
    pub debounce_ms: u64,

    // 当前页面地址（用于按域名的设置覆盖）
    pub page_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            api_key: None,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_concurrent_batches: constants::DEFAULT_MAX_CONCURRENT_BATCHES,
            min_text_length: constants::MIN_TEXT_LENGTH,
            max_text_length: constants::MAX_TEXT_LENGTH,
            translatable_char_threshold: constants::TRANSLATABLE_CHAR_THRESHOLD,
            cache_capacity: constants::MAX_CACHE_ENTRIES,
            cache_ttl_secs: constants::CACHE_TTL.as_secs(),
            debounce_ms: constants::DEBOUNCE_DELAY.as_millis() as u64,
            page_url: None,
        }
    }
}

impl PipelineConfig {
    /// 加载配置：搜索配置文件，再应用环境变量覆盖
    pub fn load() -> TranslateResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> TranslateResult<()> {
        if self.batch_size == 0 {
            return Err(TranslateError::Config("批次大小不能为0".to_string()));
        }
        if self.batch_size > constants::MAX_TEXTS_PER_REQUEST {
            return Err(TranslateError::Config(format!(
                "批次大小不能超过单次请求上限 {}",
                constants::MAX_TEXTS_PER_REQUEST
            )));
        }
        if self.max_concurrent_batches == 0 {
            return Err(TranslateError::Config("最大并发批次数不能为0".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(TranslateError::Config("缓存容量不能为0".to_string()));
        }
        if self.min_text_length > self.max_text_length {
            return Err(TranslateError::Config(
                "最小文本长度不能大于最大文本长度".to_string(),
            ));
        }
        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PAGETRANS_API_URL") {
            tracing::info!("环境变量覆盖 API URL: {}", url);
            self.api_url = url;
        }
        if let Ok(key) = std::env::var("PAGETRANS_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(size) = std::env::var("PAGETRANS_BATCH_SIZE") {
            if let Ok(size) = size.parse() {
                self.batch_size = size;
            }
        }
        if let Ok(n) = std::env::var("PAGETRANS_MAX_CONCURRENT_BATCHES") {
            if let Ok(n) = n.parse() {
                self.max_concurrent_batches = n;
            }
        }
        if let Ok(ttl) = std::env::var("PAGETRANS_CACHE_TTL_SECS") {
            if let Ok(ttl) = ttl.parse() {
                self.cache_ttl_secs = ttl;
            }
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// 从文件加载配置
    fn load_config() -> TranslateResult<Self> {
        for path in constants::CONFIG_PATHS {
            if Path::new(path).exists() {
                tracing::info!("加载配置文件: {}", path);
                return Self::load_from_file(path);
            }
        }

        tracing::debug!("未找到配置文件，使用默认配置");
        Ok(Self::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> TranslateResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslateError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            Ok(toml::from_str(&content)?)
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TranslateError::Config(format!("解析JSON配置失败: {}", e)))
        }
    }
}

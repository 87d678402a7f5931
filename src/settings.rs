//! 用户设置
//!
//! 语言偏好与按域名的自动翻译开关。存储层抽象为 `SettingsStore`
//! trait 由外部注入，变更通过 `tokio::sync::watch` 广播给订阅方。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;

use crate::error::{TranslateError, TranslateResult};

/// 单个域名的设置覆盖
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainSettings {
    pub auto_translate: bool,
    pub last_translated: Option<DateTime<Utc>>,
}

/// 全局设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub auto_translate: bool,
    pub domain_settings: HashMap<String, DomainSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "ko".to_string(),
            auto_translate: false,
            domain_settings: HashMap::new(),
        }
    }
}

impl Settings {
    /// 指定域名生效的自动翻译开关，域名覆盖优先于全局值
    pub fn auto_translate_for(&self, domain: Option<&str>) -> bool {
        match domain.and_then(|d| self.domain_settings.get(d)) {
            Some(ds) => ds.auto_translate,
            None => self.auto_translate,
        }
    }

    /// 写入域名覆盖并盖上翻译时间戳
    pub fn set_domain_auto_translate(&mut self, domain: &str, enabled: bool) {
        let entry = self.domain_settings.entry(domain.to_string()).or_default();
        entry.auto_translate = enabled;
        if enabled {
            entry.last_translated = Some(Utc::now());
        }
    }
}

/// 从页面地址提取域名
pub fn domain_of(page_url: &str) -> Option<String> {
    Url::parse(page_url)
        .ok()
        .and_then(|u| u.domain().map(|d| d.to_string()))
}

/// 设置存储抽象
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> TranslateResult<Settings>;
    fn save(&self, settings: &Settings) -> TranslateResult<()>;
    /// 订阅设置变更，接收端始终能读到最近一次保存的值
    fn subscribe(&self) -> watch::Receiver<Settings>;
}

/// 内存设置存储（测试与无持久化宿主用）
pub struct MemoryStore {
    current: Mutex<Settings>,
    tx: watch::Sender<Settings>,
}

impl MemoryStore {
    pub fn new(initial: Settings) -> Self {
        let (tx, _) = watch::channel(initial.clone());
        Self {
            current: Mutex::new(initial),
            tx,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> TranslateResult<Settings> {
        Ok(self.current.lock().unwrap().clone())
    }

    fn save(&self, settings: &Settings) -> TranslateResult<()> {
        *self.current.lock().unwrap() = settings.clone();
        let _ = self.tx.send(settings.clone());
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}

/// JSON 文件设置存储
pub struct JsonFileStore {
    path: PathBuf,
    tx: watch::Sender<Settings>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = Self::read_file(&path).unwrap_or_default();
        let (tx, _) = watch::channel(initial);
        Self { path, tx }
    }

    fn read_file(path: &PathBuf) -> Option<Settings> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> TranslateResult<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("设置文件不存在，使用默认设置");
                Ok(Settings::default())
            }
            Err(e) => Err(TranslateError::Config(format!("读取设置文件失败: {}", e))),
        }
    }

    fn save(&self, settings: &Settings) -> TranslateResult<()> {
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content)
            .map_err(|e| TranslateError::Config(format!("写入设置文件失败: {}", e)))?;
        let _ = self.tx.send(settings.clone());
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }
}

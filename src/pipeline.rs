//! 顶层编排器
//!
//! 把提取器、分类器、缓存、调度器、应用器、观察器与设置存储装配
//! 成完整的页面翻译管道。所有依赖从外部注入，文档与翻译服务都以
//! 共享句柄持有，没有全局单例。

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use crate::apply::Applier;
use crate::cache::TranslationCache;
use crate::config::PipelineConfig;
use crate::dom::{Document, Rect};
use crate::error::TranslateResult;
use crate::extract::{gate_by_language, sort_viewport_first, TextExtractor};
use crate::message::{Message, Reply};
use crate::provider::TranslateProvider;
use crate::schedule::{PipelineState, ScheduleReport, Scheduler};
use crate::selection::SelectionTranslator;
use crate::settings::{domain_of, SettingsStore};
use crate::watch::Watcher;

/// 管道状态摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStatus {
    pub enabled: bool,
    pub translated_count: usize,
}

/// 页面翻译管道
pub struct TranslatePipeline {
    config: PipelineConfig,
    doc: Arc<Mutex<Document>>,
    extractor: Arc<TextExtractor>,
    cache: Arc<TranslationCache>,
    applier: Arc<Applier>,
    scheduler: Arc<Scheduler>,
    selection: SelectionTranslator,
    provider: Arc<dyn TranslateProvider>,
    settings_store: Arc<dyn SettingsStore>,
    state: Arc<PipelineState>,
    watcher: Mutex<Option<Watcher>>,
    current_selection: Mutex<Option<(String, Option<Rect>)>>,
}

impl TranslatePipeline {
    pub fn new(
        config: PipelineConfig,
        doc: Arc<Mutex<Document>>,
        provider: Arc<dyn TranslateProvider>,
        settings_store: Arc<dyn SettingsStore>,
    ) -> TranslateResult<Self> {
        config.validate()?;
        let cache = Arc::new(TranslationCache::new(
            config.cache_capacity,
            config.cache_ttl(),
        ));
        let applier = Arc::new(Applier::new());
        let state = Arc::new(PipelineState::default());
        let scheduler = Arc::new(Scheduler::new(
            &config,
            provider.clone(),
            cache.clone(),
            applier.clone(),
            state.clone(),
        ));
        Ok(Self {
            extractor: Arc::new(TextExtractor::new(&config)),
            selection: SelectionTranslator::new(provider.clone()),
            config,
            doc,
            cache,
            applier,
            scheduler,
            provider,
            settings_store,
            state,
            watcher: Mutex::new(None),
            current_selection: Mutex::new(None),
        })
    }

    /// 开启整页翻译
    ///
    /// 全量提取、语言门控、视口优先排序后交给调度器，并启动变更
    /// 观察器。重复开启是安全的：在途集合挡住重复提交，观察器
    /// 不会被重复启动。
    pub async fn enable(&self) -> TranslateResult<ScheduleReport> {
        self.state.enabled.store(true, Ordering::SeqCst);
        let settings = self.settings_store.load()?;
        tracing::info!(
            "开启整页翻译: {} -> {}",
            settings.source_lang,
            settings.target_lang
        );

        let (units, shadow_roots) = {
            let doc = self.doc.lock().unwrap();
            let root = doc.root();
            let extraction = self.extractor.extract(&doc, root);
            let mut units = gate_by_language(extraction.units, &settings.source_lang);
            sort_viewport_first(&doc, &mut units);
            (units, extraction.shadow_roots)
        };

        {
            let mut watcher = self.watcher.lock().unwrap();
            if watcher.is_none() {
                *watcher = Some(Watcher::start(
                    self.doc.clone(),
                    self.extractor.clone(),
                    self.scheduler.clone(),
                    self.config.debounce(),
                    settings.source_lang.clone(),
                    settings.target_lang.clone(),
                    shadow_roots,
                ));
            }
        }

        let report = self
            .scheduler
            .schedule(
                self.doc.as_ref(),
                units,
                &settings.source_lang,
                &settings.target_lang,
            )
            .await;
        Ok(report)
    }

    /// 关闭整页翻译：停止观察、还原全部译文
    ///
    /// 在途请求的结果会在落地前检查启用标志，迟到的译文被直接
    /// 丢弃（只进缓存）。
    pub fn disable(&self) {
        self.state.enabled.store(false, Ordering::SeqCst);
        if let Some(watcher) = self.watcher.lock().unwrap().take() {
            watcher.stop();
        }
        let mut doc = self.doc.lock().unwrap();
        self.applier.restore_all(&mut doc);
        tracing::info!("整页翻译已关闭");
    }

    /// 切换整页翻译，返回新状态
    ///
    /// 新状态连同时间戳持久化为当前域名的覆盖设置。
    pub async fn toggle(&self) -> TranslateResult<bool> {
        let enabled = if self.state.is_enabled() {
            self.disable();
            false
        } else {
            self.enable().await?;
            true
        };

        if let Some(domain) = self.config.page_url.as_deref().and_then(domain_of) {
            let mut settings = self.settings_store.load()?;
            settings.set_domain_auto_translate(&domain, enabled);
            self.settings_store.save(&settings)?;
        }
        Ok(enabled)
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            enabled: self.state.is_enabled(),
            translated_count: self.applier.status().count,
        }
    }

    /// 记录当前选区，供快捷键路径使用
    pub fn set_selection(&self, text: &str, rect: Option<Rect>) {
        *self.current_selection.lock().unwrap() = Some((text.to_string(), rect));
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// 处理一条宿主消息
    ///
    /// 消息枚举是封闭的，这里穷尽匹配。
    pub async fn handle_message(&self, message: Message) -> Reply {
        match message {
            Message::TranslateText {
                texts,
                source_lang,
                target_lang,
            } => match self.provider.translate(&texts, &source_lang, &target_lang).await {
                Ok(pairs) => Reply::Translated { pairs },
                Err(e) => Reply::Error { message: e.to_string() },
            },
            Message::ToggleTranslation => match self.toggle().await {
                Ok(enabled) => Reply::Toggled { enabled },
                Err(e) => Reply::Error { message: e.to_string() },
            },
            Message::GetStatus => {
                // isTranslated 反映文档当前是否有已应用的译文，
                // 与管道开关是两回事：开着但还没翻出任何内容时为否
                let apply_status = self.applier.status();
                let auto_translate = match self.settings_store.load() {
                    Ok(settings) => {
                        let domain = self.config.page_url.as_deref().and_then(domain_of);
                        settings.auto_translate_for(domain.as_deref())
                    }
                    Err(_) => false,
                };
                Reply::Status {
                    is_translated: apply_status.is_translated,
                    count: apply_status.count,
                    auto_translate,
                }
            }
            Message::TranslateSelection { text, rect } => {
                self.reply_for_selection(&text, rect).await
            }
            Message::TranslateSelectionShortcut => {
                let selection = self.current_selection.lock().unwrap().clone();
                match selection {
                    Some((text, rect)) => self.reply_for_selection(&text, rect).await,
                    None => Reply::Error {
                        message: "当前没有选中内容".to_string(),
                    },
                }
            }
        }
    }

    async fn reply_for_selection(&self, text: &str, rect: Option<Rect>) -> Reply {
        let settings = match self.settings_store.load() {
            Ok(s) => s,
            Err(e) => return Reply::Error { message: e.to_string() },
        };
        let panel = self
            .selection
            .translate_selection(text, rect, &settings.source_lang, &settings.target_lang)
            .await;
        Reply::Selection {
            content: panel.content,
            is_error: panel.is_error,
        }
    }
}

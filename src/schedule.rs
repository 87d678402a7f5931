//! 批次调度器
//!
//! 把候选翻译单元在并发上限内分批送往翻译服务。调度顺序：
//! 先整体标记在途（与缓存结果无关，防止观察管道重复提交），
//! 再按缓存命中拆分，命中部分立即应用，未命中部分按批次大小
//! 切块、以滑动窗口并发处理。单个批次失败只影响自身，同窗口
//! 其余批次照常落地。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashSet;
use futures::future::join_all;

use crate::apply::Applier;
use crate::cache::{CacheKey, TranslationCache};
use crate::config::PipelineConfig;
use crate::dom::{Document, NodeId};
use crate::extract::TextUnit;
use crate::provider::TranslateProvider;

/// 管道共享状态：启用标志与在途节点集合
///
/// 翻译结果落地前都要检查启用标志，用户在请求在途时关闭翻译，
/// 迟到的结果必须被丢弃而不是写回文档。
#[derive(Default)]
pub struct PipelineState {
    pub enabled: AtomicBool,
    pub in_flight: DashSet<NodeId>,
}

impl PipelineState {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// 一次调度的结果摘要
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleReport {
    /// 经翻译服务落地的单元数
    pub translated: usize,
    /// 直接由缓存落地的单元数
    pub from_cache: usize,
    /// 失败的批次数
    pub failed_batches: usize,
    /// 因已在途而跳过的单元数
    pub skipped: usize,
}

/// 批次调度器
pub struct Scheduler {
    provider: Arc<dyn TranslateProvider>,
    cache: Arc<TranslationCache>,
    applier: Arc<Applier>,
    state: Arc<PipelineState>,
    batch_size: usize,
    max_concurrent_batches: usize,
}

impl Scheduler {
    pub fn new(
        config: &PipelineConfig,
        provider: Arc<dyn TranslateProvider>,
        cache: Arc<TranslationCache>,
        applier: Arc<Applier>,
        state: Arc<PipelineState>,
    ) -> Self {
        Self {
            provider,
            cache,
            applier,
            state,
            batch_size: config.batch_size,
            max_concurrent_batches: config.max_concurrent_batches,
        }
    }

    /// 调度一组翻译单元
    ///
    /// 输入顺序即优先级顺序，批次按该顺序切分与启动。
    pub async fn schedule(
        &self,
        doc: &Mutex<Document>,
        units: Vec<TextUnit>,
        source_lang: &str,
        target_lang: &str,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        // 标记在途，已在途的单元直接跳过
        let units: Vec<TextUnit> = units
            .into_iter()
            .filter(|unit| {
                if self.state.in_flight.insert(unit.node) {
                    true
                } else {
                    report.skipped += 1;
                    false
                }
            })
            .collect();
        if units.is_empty() {
            return report;
        }

        // 缓存拆分
        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let (hits, _) = self.cache.get_multiple(&texts, source_lang, target_lang);

        let mut misses = Vec::new();
        for (index, unit) in units.into_iter().enumerate() {
            match hits.get(&index) {
                Some(translated) => {
                    if self.state.is_enabled() {
                        let mut doc = doc.lock().unwrap();
                        self.applier.apply(&mut doc, unit.node, translated);
                    }
                    self.state.in_flight.remove(&unit.node);
                    report.from_cache += 1;
                }
                None => misses.push(unit),
            }
        }
        if misses.is_empty() {
            return report;
        }

        // 按批次大小切块，滑动窗口并发
        let batches: Vec<Vec<TextUnit>> = misses
            .chunks(self.batch_size)
            .map(|c| c.to_vec())
            .collect();
        tracing::info!(
            "调度 {} 个批次 (批次大小 {}, 并发上限 {})",
            batches.len(),
            self.batch_size,
            self.max_concurrent_batches
        );

        for window in batches.chunks(self.max_concurrent_batches) {
            let futures = window
                .iter()
                .map(|batch| self.process_batch(doc, batch, source_lang, target_lang));
            for outcome in join_all(futures).await {
                match outcome {
                    Ok(applied) => report.translated += applied,
                    Err(_) => report.failed_batches += 1,
                }
            }
        }
        report
    }

    /// 处理单个批次，返回落地的单元数
    async fn process_batch(
        &self,
        doc: &Mutex<Document>,
        batch: &[TextUnit],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<usize, ()> {
        let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
        let result = self
            .provider
            .translate(&texts, source_lang, target_lang)
            .await;

        // 不论成败，批次结束后节点离开在途集合
        let outcome = match result {
            Ok(pairs) if pairs.len() != batch.len() => {
                tracing::warn!(
                    "批次结果数量不匹配: 期望 {}, 实际 {}",
                    batch.len(),
                    pairs.len()
                );
                Err(())
            }
            Ok(pairs) => {
                let mut applied = 0;
                for (unit, pair) in batch.iter().zip(pairs.iter()) {
                    self.cache.set(
                        CacheKey::new(&unit.text, source_lang, target_lang),
                        pair.translated.clone(),
                    );
                    if self.state.is_enabled() {
                        let mut doc = doc.lock().unwrap();
                        if self.applier.apply(&mut doc, unit.node, &pair.translated) {
                            applied += 1;
                        }
                    }
                }
                Ok(applied)
            }
            Err(e) => {
                tracing::warn!("批次翻译失败 ({} 条): {}", batch.len(), e);
                Err(())
            }
        };
        for unit in batch {
            self.state.in_flight.remove(&unit.node);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;
    use crate::error::{TranslateError, TranslateResult};
    use crate::provider::TranslatedPair;
    use futures::future::BoxFuture;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// 记录调用形态的模拟翻译服务
    struct MockProvider {
        batch_sizes: Mutex<Vec<usize>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
        fail_containing: Option<String>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                batch_sizes: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                delay: Duration::from_millis(20),
                fail_containing: None,
            }
        }

        fn failing_on(text: &str) -> Self {
            Self {
                fail_containing: Some(text.to_string()),
                ..Self::new()
            }
        }
    }

    impl TranslateProvider for MockProvider {
        fn translate<'a>(
            &'a self,
            texts: &'a [String],
            _source_lang: &'a str,
            _target_lang: &'a str,
        ) -> BoxFuture<'a, TranslateResult<Vec<TranslatedPair>>> {
            Box::pin(async move {
                self.batch_sizes.lock().unwrap().push(texts.len());
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.active.fetch_sub(1, Ordering::SeqCst);

                if let Some(marker) = &self.fail_containing {
                    if texts.iter().any(|t| t.contains(marker)) {
                        return Err(TranslateError::Provider("模拟失败".to_string()));
                    }
                }
                Ok(texts
                    .iter()
                    .map(|t| TranslatedPair {
                        original: t.clone(),
                        translated: format!("译[{}]", t),
                    })
                    .collect())
            })
        }
    }

    struct Harness {
        doc: Mutex<Document>,
        scheduler: Scheduler,
        provider: Arc<MockProvider>,
        state: Arc<PipelineState>,
        cache: Arc<TranslationCache>,
        applier: Arc<Applier>,
    }

    fn harness(provider: MockProvider, config: PipelineConfig) -> Harness {
        let provider = Arc::new(provider);
        let cache = Arc::new(TranslationCache::new(
            config.cache_capacity,
            config.cache_ttl(),
        ));
        let applier = Arc::new(Applier::new());
        let state = Arc::new(PipelineState::default());
        state.enabled.store(true, Ordering::SeqCst);
        let scheduler = Scheduler::new(
            &config,
            provider.clone() as Arc<dyn TranslateProvider>,
            cache.clone(),
            applier.clone(),
            state.clone(),
        );
        Harness {
            doc: Mutex::new(Document::new(Rect::new(0.0, 0.0, 1280.0, 800.0))),
            scheduler,
            provider,
            state,
            cache,
            applier,
        }
    }

    fn add_units(doc: &Mutex<Document>, count: usize) -> Vec<TextUnit> {
        let mut doc = doc.lock().unwrap();
        let root = doc.root();
        (0..count)
            .map(|i| {
                let p = doc.append_element(root, "p").unwrap();
                let text = format!("sentence number {}", i);
                let node = doc.append_text(p, &text).unwrap();
                TextUnit { node, element: p, text }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batch_partitioning() {
        let h = harness(MockProvider::new(), PipelineConfig::default());
        let units = add_units(&h.doc, 20);

        let report = h.scheduler.schedule(&h.doc, units, "en", "ko").await;
        assert_eq!(report.translated, 20);
        // 20 条按批次大小 8 切成 8, 8, 4 且保持顺序
        assert_eq!(*h.provider.batch_sizes.lock().unwrap(), vec![8, 8, 4]);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let mut config = PipelineConfig::default();
        config.batch_size = 2;
        config.max_concurrent_batches = 6;
        let h = harness(MockProvider::new(), config);
        // 20 条 / 批次 2 = 10 个批次，窗口上限 6
        let units = add_units(&h.doc, 20);

        h.scheduler.schedule(&h.doc, units, "en", "ko").await;
        let max = h.provider.max_active.load(Ordering::SeqCst);
        assert!(max <= 6, "At most 6 batches in flight, saw {}", max);
        assert!(max > 1, "Batches within a window should overlap");
    }

    #[tokio::test]
    async fn test_in_flight_units_skipped() {
        let h = harness(MockProvider::new(), PipelineConfig::default());
        let units = add_units(&h.doc, 3);
        h.state.in_flight.insert(units[0].node);

        let report = h.scheduler.schedule(&h.doc, units.clone(), "en", "ko").await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.translated, 2);
        // 调度结束后自己标记的节点已离开在途集合，外部标记的还在
        assert!(h.state.in_flight.contains(&units[0].node));
        assert!(!h.state.in_flight.contains(&units[1].node));
    }

    #[tokio::test]
    async fn test_cache_hits_applied_without_provider() {
        let h = harness(MockProvider::new(), PipelineConfig::default());
        let units = add_units(&h.doc, 2);
        h.cache.set(
            CacheKey::new(&units[0].text, "en", "ko"),
            "缓存译文".to_string(),
        );

        let report = h.scheduler.schedule(&h.doc, units.clone(), "en", "ko").await;
        assert_eq!(report.from_cache, 1);
        assert_eq!(report.translated, 1);
        assert_eq!(*h.provider.batch_sizes.lock().unwrap(), vec![1]);
        assert_eq!(
            h.doc.lock().unwrap().text(units[0].node),
            Some("缓存译文")
        );
    }

    #[tokio::test]
    async fn test_batch_failure_is_isolated() {
        let mut config = PipelineConfig::default();
        config.batch_size = 1;
        let h = harness(MockProvider::failing_on("number 1"), config);
        let units = add_units(&h.doc, 3);

        let report = h.scheduler.schedule(&h.doc, units.clone(), "en", "ko").await;
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.translated, 2);
        let doc = h.doc.lock().unwrap();
        assert_eq!(doc.text(units[0].node), Some("译[sentence number 0]"));
        assert_eq!(doc.text(units[1].node), Some("sentence number 1"));
        drop(doc);
        assert!(h.state.in_flight.is_empty(), "Failed batch must clear in-flight marks");
    }

    /// 少回一条结果的违约实现
    struct TruncatingProvider;

    impl TranslateProvider for TruncatingProvider {
        fn translate<'a>(
            &'a self,
            texts: &'a [String],
            _source_lang: &'a str,
            _target_lang: &'a str,
        ) -> BoxFuture<'a, TranslateResult<Vec<TranslatedPair>>> {
            Box::pin(async move {
                Ok(texts
                    .iter()
                    .take(texts.len().saturating_sub(1))
                    .map(|t| TranslatedPair {
                        original: t.clone(),
                        translated: format!("译[{}]", t),
                    })
                    .collect())
            })
        }
    }

    #[tokio::test]
    async fn test_short_reply_fails_whole_batch() {
        let config = PipelineConfig::default();
        let cache = Arc::new(TranslationCache::new(config.cache_capacity, config.cache_ttl()));
        let applier = Arc::new(Applier::new());
        let state = Arc::new(PipelineState::default());
        state.enabled.store(true, Ordering::SeqCst);
        let scheduler = Scheduler::new(
            &config,
            Arc::new(TruncatingProvider),
            cache,
            applier.clone(),
            state.clone(),
        );
        let doc = Mutex::new(Document::new(Rect::new(0.0, 0.0, 1280.0, 800.0)));
        let units = add_units(&doc, 3);

        let report = scheduler.schedule(&doc, units.clone(), "en", "ko").await;
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.translated, 0);
        // 错位的结果一条都不落地，原文保持不变
        assert_eq!(doc.lock().unwrap().text(units[0].node), Some("sentence number 0"));
        assert_eq!(applier.status().count, 0);
        assert!(state.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_state_drops_results() {
        let h = harness(MockProvider::new(), PipelineConfig::default());
        let units = add_units(&h.doc, 2);
        h.state.enabled.store(false, Ordering::SeqCst);

        let report = h.scheduler.schedule(&h.doc, units.clone(), "en", "ko").await;
        assert_eq!(report.translated, 0);
        // 结果进了缓存但没有写回文档
        assert_eq!(h.doc.lock().unwrap().text(units[0].node), Some("sentence number 0"));
        assert!(h.cache.get(&CacheKey::new(&units[0].text, "en", "ko")).is_some());
        assert_eq!(h.applier.status().count, 0);
    }
}

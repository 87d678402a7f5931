//! 翻译缓存
//!
//! 按 (文本, 源语言, 目标语言) 为键的内存缓存，带TTL与容量上限。
//! 容量满时按LRU淘汰，过期条目在读取时剔除。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl CacheKey {
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        Self {
            text: text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }
}

/// 缓存统计
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// 命中率（0.0 - 1.0）
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }
}

struct Entry {
    translated: String,
    stored_at: Instant,
}

/// 翻译缓存
pub struct TranslationCache {
    entries: Mutex<LruCache<CacheKey, Entry>>,
    ttl: Duration,
    stats: CacheStats,
}

impl TranslationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// 查询单条译文，过期条目视为未命中并即时剔除
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.translated.clone())
            }
            Some(_) => {
                entries.pop(key);
                self.stats.expirations.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 写入译文，满容量时淘汰最久未使用的条目
    pub fn set(&self, key: CacheKey, translated: String) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == entries.cap().get() && !entries.contains(&key) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.put(
            key,
            Entry {
                translated,
                stored_at: Instant::now(),
            },
        );
    }

    /// 批量查询
    ///
    /// 返回 (原始下标 → 译文) 的命中映射和按原顺序排列的
    /// (原始下标, 文本) 未命中列表，调度器据此只把未命中部分
    /// 发往翻译服务。
    pub fn get_multiple(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> (std::collections::HashMap<usize, String>, Vec<(usize, String)>) {
        let mut hits = std::collections::HashMap::new();
        let mut misses = Vec::new();
        for (index, text) in texts.iter().enumerate() {
            let key = CacheKey::new(text, source_lang, target_lang);
            match self.get(&key) {
                Some(translated) => {
                    hits.insert(index, translated);
                }
                None => misses.push((index, text.clone())),
            }
        }
        tracing::debug!(
            "缓存批量查询: {} 命中, {} 未命中",
            hits.len(),
            misses.len()
        );
        (hits, misses)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空全部条目（统计保留）
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

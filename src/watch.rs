//! 文档变更观察管道
//!
//! 在根文档与每个影子根上注册观察者，把结构变更汇入同一条通道。
//! 首条变更到达时武装一个去抖动窗口，窗口到期后一次性抽干积累的
//! 节点，提取、门控、排序后交给调度器。处理期间新发现的影子根
//! 会被补注册观察者，动态挂接的子文档由此纳入观察范围。

use std::collections::HashSet;
use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::dom::{Document, MutationRecord, NodeId, ObserverId};
use crate::extract::{gate_by_language, sort_viewport_first, TextExtractor};
use crate::schedule::Scheduler;

/// 变更观察器
///
/// `start` 启动后台任务，`stop` 通知任务退出并注销全部观察者。
pub struct Watcher {
    shutdown: oneshot::Sender<()>,
    doc: Arc<Mutex<Document>>,
    observers: Arc<Mutex<Vec<ObserverId>>>,
}

impl Watcher {
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        doc: Arc<Mutex<Document>>,
        extractor: Arc<TextExtractor>,
        scheduler: Arc<Scheduler>,
        debounce: Duration,
        source_lang: String,
        target_lang: String,
        initial_shadow_roots: Vec<NodeId>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let observers = Arc::new(Mutex::new(Vec::new()));
        let mut observed = HashSet::new();

        {
            let mut doc = doc.lock().unwrap();
            let root = doc.root();
            let mut ids = observers.lock().unwrap();
            for target in std::iter::once(root).chain(initial_shadow_roots) {
                if observed.insert(target) {
                    ids.push(doc.observe(target, tx.clone()));
                }
            }
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        // 任务由关闭信号结束，句柄不保留
        let _ = tokio::spawn(run(
            doc.clone(),
            extractor,
            scheduler,
            debounce,
            source_lang,
            target_lang,
            rx,
            tx,
            observers.clone(),
            observed,
            shutdown_rx,
        ));
        tracing::info!("变更观察器已启动");
        Self { shutdown, doc, observers }
    }

    /// 停止观察：通知后台任务退出并注销全部观察者
    ///
    /// 刻意不强行中止任务：进行中的调度要跑完收尾，把自己标记的
    /// 节点从在途集合里摘出来，否则这些节点会被后续调度永远跳过。
    /// 迟到的翻译结果由启用标志拦在落地之前。
    pub fn stop(self) {
        let _ = self.shutdown.send(());
        let mut doc = self.doc.lock().unwrap();
        for id in self.observers.lock().unwrap().drain(..) {
            doc.unobserve(id);
        }
        tracing::info!("变更观察器已停止");
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    doc: Arc<Mutex<Document>>,
    extractor: Arc<TextExtractor>,
    scheduler: Arc<Scheduler>,
    debounce: Duration,
    source_lang: String,
    target_lang: String,
    mut rx: mpsc::UnboundedReceiver<MutationRecord>,
    tx: mpsc::UnboundedSender<MutationRecord>,
    observers: Arc<Mutex<Vec<ObserverId>>>,
    mut observed: HashSet<NodeId>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut pending: Vec<NodeId> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            // 退出只发生在两次 flush 之间，进行中的调度总能跑完收尾
            _ = &mut shutdown => break,
            record = rx.recv() => {
                match record {
                    Some(record) => {
                        // 首条变更武装去抖动窗口，后续变更并入同一窗口
                        if pending.is_empty() {
                            deadline = Some(Instant::now() + debounce);
                        }
                        pending.extend(record.added);
                    }
                    None => break,
                }
            }
            _ = sleep_until_armed(deadline), if deadline.is_some() => {
                deadline = None;
                let nodes = mem::take(&mut pending);
                tracing::debug!("去抖动窗口到期, 处理 {} 个新增节点", nodes.len());
                flush(
                    &doc, &extractor, &scheduler,
                    &source_lang, &target_lang,
                    nodes, &tx, &observers, &mut observed,
                ).await;
            }
        }
    }
}

async fn sleep_until_armed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        // select! 的守卫保证不会走到这里
        None => futures::future::pending().await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn flush(
    doc: &Arc<Mutex<Document>>,
    extractor: &TextExtractor,
    scheduler: &Scheduler,
    source_lang: &str,
    target_lang: &str,
    nodes: Vec<NodeId>,
    tx: &mpsc::UnboundedSender<MutationRecord>,
    observers: &Mutex<Vec<ObserverId>>,
    observed: &mut HashSet<NodeId>,
) {
    let mut units = Vec::new();
    {
        let mut doc = doc.lock().unwrap();
        let mut seen = HashSet::new();
        for node in nodes {
            // 新挂接的影子根自身就是一棵被观察树的根，要单独补注册
            if doc.contains(node)
                && doc.parent(node).is_none()
                && node != doc.root()
                && observed.insert(node)
            {
                let id = doc.observe(node, tx.clone());
                observers.lock().unwrap().push(id);
            }
            // 同一窗口里父子节点都可能出现，提取去重由 visited 集保证
            let extraction = extractor.extract(&doc, node);
            for unit in extraction.units {
                if seen.insert(unit.node) {
                    units.push(unit);
                }
            }
            for shadow in extraction.shadow_roots {
                if observed.insert(shadow) {
                    let id = doc.observe(shadow, tx.clone());
                    observers.lock().unwrap().push(id);
                }
            }
        }
        units = gate_by_language(units, source_lang);
        sort_viewport_first(&doc, &mut units);
    }
    if units.is_empty() {
        return;
    }
    scheduler
        .schedule(doc.as_ref(), units, source_lang, target_lang)
        .await;
}

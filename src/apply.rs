//! 文档应用/还原器
//!
//! 把译文写入文本节点并记录原文，保证整个翻译过程可逆。每个节点
//! 是一个 原文 → 译文 → 原文 的双态机：重复应用不会覆盖已记录的
//! 原文，还原后记录被清除。失效句柄一律安静跳过。

use std::collections::HashMap;
use std::sync::Mutex;

use crate::dom::{Document, NodeId};

/// 应用器状态摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStatus {
    pub is_translated: bool,
    pub count: usize,
}

/// 文档应用器
#[derive(Default)]
pub struct Applier {
    originals: Mutex<HashMap<NodeId, String>>,
}

impl Applier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把译文写入节点，首次应用时记录原文
    ///
    /// 节点已处于译文态时只更新显示文本，原文记录保持首次值，
    /// 否则连续两次应用会把第一次的译文当成"原文"记下来。
    pub fn apply(&self, doc: &mut Document, node: NodeId, translated: &str) -> bool {
        let mut originals = self.originals.lock().unwrap();
        if !originals.contains_key(&node) {
            let Some(original) = doc.text(node).map(|t| t.to_string()) else {
                tracing::debug!("应用译文时节点已失效，跳过");
                return false;
            };
            originals.insert(node, original);
        }
        if doc.set_text(node, translated) {
            true
        } else {
            originals.remove(&node);
            false
        }
    }

    /// 还原单个节点的原文并清除记录
    pub fn restore(&self, doc: &mut Document, node: NodeId) -> bool {
        let Some(original) = self.originals.lock().unwrap().remove(&node) else {
            return false;
        };
        // 节点可能在翻译期间被移除，记录照样清掉
        doc.set_text(node, &original)
    }

    /// 还原所有已翻译节点，返回成功写回的数量
    pub fn restore_all(&self, doc: &mut Document) -> usize {
        let drained: Vec<(NodeId, String)> =
            self.originals.lock().unwrap().drain().collect();
        let mut restored = 0;
        for (node, original) in drained {
            if doc.set_text(node, &original) {
                restored += 1;
            }
        }
        tracing::info!("还原完成: {} 个节点", restored);
        restored
    }

    /// 节点当前是否处于译文态
    pub fn is_translated(&self, node: NodeId) -> bool {
        self.originals.lock().unwrap().contains_key(&node)
    }

    pub fn status(&self) -> ApplyStatus {
        let count = self.originals.lock().unwrap().len();
        ApplyStatus {
            is_translated: count > 0,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Rect;

    fn doc_with_text(text: &str) -> (Document, NodeId) {
        let mut doc = Document::new(Rect::new(0.0, 0.0, 1280.0, 800.0));
        let p = doc.append_element(doc.root(), "p").unwrap();
        let node = doc.append_text(p, text).unwrap();
        (doc, node)
    }

    #[test]
    fn test_apply_and_restore() {
        let (mut doc, node) = doc_with_text("Hello");
        let applier = Applier::new();

        assert!(applier.apply(&mut doc, node, "안녕"));
        assert_eq!(doc.text(node), Some("안녕"));
        assert!(applier.is_translated(node));

        assert!(applier.restore(&mut doc, node));
        assert_eq!(doc.text(node), Some("Hello"));
        assert!(!applier.is_translated(node));
    }

    #[test]
    fn test_reapply_keeps_first_original() {
        let (mut doc, node) = doc_with_text("Hello");
        let applier = Applier::new();

        applier.apply(&mut doc, node, "안녕");
        applier.apply(&mut doc, node, "안녕하세요");
        assert_eq!(doc.text(node), Some("안녕하세요"));

        applier.restore(&mut doc, node);
        assert_eq!(doc.text(node), Some("Hello"), "Original must survive re-apply");
    }

    #[test]
    fn test_restore_all_reverts_everything() {
        let mut doc = Document::new(Rect::new(0.0, 0.0, 1280.0, 800.0));
        let p = doc.append_element(doc.root(), "p").unwrap();
        let a = doc.append_text(p, "Hello").unwrap();
        let b = doc.append_text(p, "World").unwrap();

        let applier = Applier::new();
        applier.apply(&mut doc, a, "안녕");
        applier.apply(&mut doc, b, "세계");
        assert_eq!(applier.status().count, 2);

        let restored = applier.restore_all(&mut doc);
        assert_eq!(restored, 2);
        assert_eq!(doc.text(a), Some("Hello"));
        assert_eq!(doc.text(b), Some("World"));
        assert_eq!(applier.status(), ApplyStatus { is_translated: false, count: 0 });
    }

    #[test]
    fn test_stale_node_is_silent_noop() {
        let (mut doc, node) = doc_with_text("Hello");
        let applier = Applier::new();
        applier.apply(&mut doc, node, "안녕");

        let parent = doc.parent_element(node).unwrap();
        doc.remove(parent);

        // 还原打不到节点，但记录被清除
        assert!(!applier.restore(&mut doc, node));
        assert!(!applier.is_translated(node));

        // 对失效节点应用译文同样安静失败
        assert!(!applier.apply(&mut doc, node, "다시"));
    }
}

//! 文本提取器
//!
//! 对文档做只读遍历，产出候选翻译单元。过滤顺序：结构过滤
//! （跳过标签集合与可编辑区域）、长度过滤、可见性过滤、内容
//! 过滤（拉丁/谚文字母占比阈值，URL与邮箱直接拒绝）。
//!
//! 遍历过程中发现的影子根会一并上报，观察管道靠它给动态挂接的
//! 子文档补注册观察者。

use std::collections::HashSet;

use regex::Regex;

use crate::config::{constants, PipelineConfig};
use crate::dom::{Document, NodeId};

/// 一个候选翻译单元：文本节点、其包含元素与修剪后的文本
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub node: NodeId,
    pub element: NodeId,
    pub text: String,
}

/// 一次提取的完整结果
#[derive(Debug, Default)]
pub struct Extraction {
    pub units: Vec<TextUnit>,
    /// 遍历中遇到的所有影子根（含此前已知的）
    pub shadow_roots: Vec<NodeId>,
}

/// 文本提取器
pub struct TextExtractor {
    min_text_length: usize,
    max_text_length: usize,
    translatable_char_threshold: f32,
    url_regex: Regex,
    email_regex: Regex,
}

impl TextExtractor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_text_length: config.min_text_length,
            max_text_length: config.max_text_length,
            translatable_char_threshold: config.translatable_char_threshold,
            url_regex: Regex::new(r"^(https?://|www\.)\S+$").unwrap(),
            email_regex: Regex::new(r"^[\w.+-]+@[\w-]+\.[\w.-]+$").unwrap(),
        }
    }

    /// 从指定根开始提取整棵子树的候选翻译单元
    pub fn extract(&self, doc: &Document, root: NodeId) -> Extraction {
        let mut result = Extraction::default();
        let mut visited = HashSet::new();
        self.walk(doc, root, &mut result, &mut visited);
        tracing::debug!(
            "提取完成: {} 个候选单元, {} 个影子根",
            result.units.len(),
            result.shadow_roots.len()
        );
        result
    }

    fn walk(
        &self,
        doc: &Document,
        node: NodeId,
        result: &mut Extraction,
        visited: &mut HashSet<NodeId>,
    ) {
        if !visited.insert(node) {
            return;
        }

        if doc.is_element(node) {
            if !self.element_passes(doc, node) {
                return;
            }
            if let Some(shadow) = doc.shadow_root(node) {
                result.shadow_roots.push(shadow);
                self.walk(doc, shadow, result, visited);
            }
            for child in doc.children(node) {
                self.walk(doc, child, result, visited);
            }
        } else if let Some(text) = doc.text(node) {
            let trimmed = text.trim();
            if !self.text_passes(trimmed) {
                return;
            }
            if let Some(element) = doc.parent_element(node) {
                result.units.push(TextUnit {
                    node,
                    element,
                    text: trimmed.to_string(),
                });
            }
        }
    }

    /// 结构与可见性过滤：不通过则整棵子树被剪掉
    fn element_passes(&self, doc: &Document, element: NodeId) -> bool {
        let Some(tag) = doc.tag(element) else {
            return false;
        };
        if constants::SKIP_ELEMENTS.contains(&tag) {
            return false;
        }
        if doc.is_editable(element) {
            return false;
        }
        doc.is_visible(element)
    }

    /// 长度与内容过滤
    fn text_passes(&self, trimmed: &str) -> bool {
        let len = trimmed.chars().count();
        if len < self.min_text_length || len > self.max_text_length {
            return false;
        }
        if self.url_regex.is_match(trimmed) || self.email_regex.is_match(trimmed) {
            return false;
        }
        self.letter_ratio(trimmed) >= self.translatable_char_threshold
    }

    /// 拉丁与谚文字母占全部字符的比例
    ///
    /// 只统计这两类脚本：提取面向拉丁/谚文源页面，纯汉字或假名
    /// 的文本在这一步就被拒绝，不会进入后面的语言判定。
    fn letter_ratio(&self, text: &str) -> f32 {
        let total = text.chars().count();
        if total == 0 {
            return 0.0;
        }
        let letters = text
            .chars()
            .filter(|&c| crate::lang::is_latin(c) || crate::lang::is_hangul(c))
            .count();
        letters as f32 / total as f32
    }
}

/// 语言门控：只保留判定结果匹配源语言的单元
///
/// `Mixed` 判定放行，其余要求精确匹配。目标页面里夹杂的
/// 其它语言内容不会被提交翻译。
pub fn gate_by_language(units: Vec<TextUnit>, source_code: &str) -> Vec<TextUnit> {
    units
        .into_iter()
        .filter(|unit| crate::lang::detect(&unit.text).matches_source(source_code))
        .collect()
}

/// 视口优先排序：在屏内容排在屏外内容之前，组内保持文档顺序
pub fn sort_viewport_first(doc: &Document, units: &mut [TextUnit]) {
    units.sort_by_key(|unit| !doc.in_viewport(unit.element));
}

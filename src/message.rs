//! 宿主消息表面
//!
//! 管道与宿主之间的通信是两个封闭枚举：请求 `Message` 与应答
//! `Reply`。管道对 `Message` 做穷尽匹配，新增消息种类必须同时
//! 改动处理端，不存在未知消息被悄悄吞掉的路径。

use serde::{Deserialize, Serialize};

use crate::dom::Rect;
use crate::provider::TranslatedPair;

/// 宿主发往管道的请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// 翻译一组给定文本（不触及文档）
    TranslateText {
        texts: Vec<String>,
        source_lang: String,
        target_lang: String,
    },
    /// 切换整页翻译
    ToggleTranslation,
    /// 查询当前翻译状态
    GetStatus,
    /// 翻译指定选区
    TranslateSelection { text: String, rect: Option<Rect> },
    /// 快捷键触发：翻译当前记录的选区
    TranslateSelectionShortcut,
}

/// 管道发回宿主的应答
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Translated { pairs: Vec<TranslatedPair> },
    Toggled { enabled: bool },
    Status {
        is_translated: bool,
        count: usize,
        auto_translate: bool,
    },
    Selection { content: String, is_error: bool },
    Error { message: String },
}

//! 划词即时翻译
//!
//! 对用户选中的文本做一次性翻译并以浮动面板模型呈现。刻意绕过
//! 缓存与在途集合：划词是低频的显式动作，结果也从不写回文档。

use std::sync::Arc;

use crate::config::constants;
use crate::dom::Rect;
use crate::provider::{validate_request, TranslateProvider};

/// 面板锚点：优先贴靠选区下缘，拿不到选区矩形时退到固定角落
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelAnchor {
    Near { x: f32, y: f32 },
    Corner,
}

/// 划词翻译结果面板模型
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPanel {
    pub content: String,
    pub anchor: PanelAnchor,
    pub is_error: bool,
    pub dismissed: bool,
}

impl SelectionPanel {
    fn new(content: String, anchor: PanelAnchor, is_error: bool) -> Self {
        Self {
            content,
            anchor,
            is_error,
            dismissed: false,
        }
    }

    /// 面板外的交互关闭面板，面板内的交互保持打开
    pub fn on_interaction(&mut self, inside_panel: bool) {
        if !inside_panel {
            self.dismissed = true;
        }
    }
}

/// 划词翻译器
pub struct SelectionTranslator {
    provider: Arc<dyn TranslateProvider>,
}

impl SelectionTranslator {
    pub fn new(provider: Arc<dyn TranslateProvider>) -> Self {
        Self { provider }
    }

    /// 翻译一段选中文本
    ///
    /// 选区按行拆分后受更紧的条数上限约束。任何失败都折叠成
    /// 带错误标记的面板，不向上冒泡。
    pub async fn translate_selection(
        &self,
        selection: &str,
        selection_rect: Option<Rect>,
        source_lang: &str,
        target_lang: &str,
    ) -> SelectionPanel {
        let anchor = match selection_rect {
            Some(rect) => PanelAnchor::Near {
                x: rect.x,
                y: rect.y + rect.height,
            },
            None => PanelAnchor::Corner,
        };

        let texts: Vec<String> = selection
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();

        if let Err(e) = validate_request(
            &texts,
            source_lang,
            target_lang,
            constants::MAX_SELECTION_TEXTS,
        ) {
            tracing::debug!("划词请求被拒绝: {}", e);
            return SelectionPanel::new("无法翻译所选内容".to_string(), anchor, true);
        }

        match self.provider.translate(&texts, source_lang, target_lang).await {
            Ok(pairs) => {
                let content = pairs
                    .iter()
                    .map(|p| p.translated.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                SelectionPanel::new(content, anchor, false)
            }
            Err(e) => {
                tracing::warn!("划词翻译失败: {}", e);
                SelectionPanel::new("翻译失败，请稍后重试".to_string(), anchor, true)
            }
        }
    }
}

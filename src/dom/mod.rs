//! 活动文档模型
//!
//! 管道操作的不是解析出来的静态标记，而是一份会被外部持续修改的
//! "活"文档。这里用版本化节点竞技场来建模：节点句柄携带世代号，
//! 外部变更使句柄失效后，所有解引用都会安静地失败而不是悬垂。

pub mod document;

pub use document::{Document, MutationRecord, NodeId, ObserverId};

/// 屏幕矩形（布局坐标）
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// 矩形面积，零面积元素视为不可见
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// 判断两个矩形是否相交
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// 元素的计算样式中与可见性相关的部分
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedStyle {
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub opacity: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display_none: false,
            visibility_hidden: false,
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    /// 样式本身是否隐藏了元素
    pub fn hides(&self) -> bool {
        self.display_none || self.visibility_hidden || self.opacity <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let viewport = Rect::new(0.0, 0.0, 1280.0, 800.0);
        let on_screen = Rect::new(100.0, 100.0, 200.0, 50.0);
        let below_fold = Rect::new(100.0, 2000.0, 200.0, 50.0);

        assert!(viewport.intersects(&on_screen));
        assert!(!viewport.intersects(&below_fold));
    }

    #[test]
    fn test_style_hides() {
        assert!(!ComputedStyle::default().hides());
        assert!(ComputedStyle { display_none: true, ..Default::default() }.hides());
        assert!(ComputedStyle { visibility_hidden: true, ..Default::default() }.hides());
        assert!(ComputedStyle { opacity: 0.0, ..Default::default() }.hides());
    }
}

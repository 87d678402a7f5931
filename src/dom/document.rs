//! 版本化节点竞技场
//!
//! 文档节点存放在槽位数组里，句柄是 (索引, 世代) 二元组。节点被
//! 移除时槽位世代号递增，旧句柄随之全部失效：任何解引用都返回
//! `None`/`false`，不会触及被回收的内容。这取代了源实现中裸节点
//! 引用加 try/catch 的做法。
//!
//! 结构性插入通过每个被观察根上注册的通道观察者上报（一个根一个
//! 观察者，影子根各自独立），文本内容的改写不会触发通知。

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;

use super::{ComputedStyle, Rect};

/// 节点句柄：竞技场索引 + 分配世代
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// 变更观察者句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// 一次结构变更通知：本次新插入的顶层节点
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub added: Vec<NodeId>,
}

#[derive(Debug)]
struct ElementData {
    tag: String,
    attrs: HashMap<String, String>,
    style: ComputedStyle,
    rect: Rect,
    editable: bool,
    shadow_root: Option<NodeId>,
}

#[derive(Debug)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// 活动文档
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    viewport: Rect,
    observers: HashMap<ObserverId, (NodeId, UnboundedSender<MutationRecord>)>,
    next_observer: u64,
}

impl Document {
    /// 创建带指定视口的空文档，根元素占满视口
    pub fn new(viewport: Rect) -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            viewport,
            observers: HashMap::new(),
            next_observer: 0,
        };
        let root = doc.alloc(Node {
            kind: NodeKind::Element(ElementData {
                tag: "body".to_string(),
                attrs: HashMap::new(),
                style: ComputedStyle::default(),
                rect: viewport,
                editable: false,
            shadow_root: None,
            }),
            parent: None,
            children: Vec::new(),
        });
        doc.root = root;
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    // ------------------------------------------------------------------
    // 结构操作
    // ------------------------------------------------------------------

    /// 向父元素追加一个子元素，父句柄失效时返回 `None`
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Option<NodeId> {
        self.get(parent)?;
        let id = self.alloc(Node {
            kind: NodeKind::Element(ElementData {
                tag: tag.to_string(),
                attrs: HashMap::new(),
                style: ComputedStyle::default(),
                // 默认一个小的可见矩形，测试中按需覆盖
                rect: Rect::new(0.0, 0.0, 100.0, 20.0),
                editable: false,
                shadow_root: None,
            }),
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        self.notify_added(id);
        Some(id)
    }

    /// 向父元素追加一个文本节点
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Option<NodeId> {
        self.get(parent)?;
        let id = self.alloc(Node {
            kind: NodeKind::Text(text.to_string()),
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        self.notify_added(id);
        Some(id)
    }

    /// 给宿主元素挂接一个影子根（嵌入式子文档）
    ///
    /// 影子根自身没有父节点，构成一棵独立的被观察子树。挂接行为
    /// 会向宿主所在根的观察者上报，使动态挂接的子文档能被发现。
    pub fn attach_shadow(&mut self, host: NodeId) -> Option<NodeId> {
        match self.get(host)?.kind {
            NodeKind::Element(_) => {}
            NodeKind::Text(_) => return None,
        }
        let root = self.alloc(Node {
            kind: NodeKind::Element(ElementData {
                tag: "shadow-root".to_string(),
                attrs: HashMap::new(),
                style: ComputedStyle::default(),
                rect: Rect::new(0.0, 0.0, 100.0, 20.0),
                editable: false,
                shadow_root: None,
            }),
            parent: None,
            children: Vec::new(),
        });
        if let Some(NodeKind::Element(el)) = self.get_mut(host).map(|n| &mut n.kind) {
            el.shadow_root = Some(root);
        }
        // 从宿主所在树的观察者视角上报新挂接的子文档根
        let owner = self.owning_root(host);
        self.notify_under(owner, root);
        Some(root)
    }

    /// 移除节点及其整棵子树，释放的槽位使既有句柄全部失效
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if let Some(parent) = self.get(id).and_then(|n| n.parent) {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        self.free_subtree(id);
        true
    }

    // ------------------------------------------------------------------
    // 节点访问（全部世代检查，失效句柄安静失败）
    // ------------------------------------------------------------------

    /// 句柄是否仍指向存活节点
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Element(el) => Some(el.tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.get(id), Some(Node { kind: NodeKind::Element(_), .. }))
    }

    /// 文本节点内容
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Text(t) => Some(t.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    /// 改写文本节点内容；句柄失效或非文本节点时返回 `false`
    ///
    /// 文本改写是应用器的写入路径，刻意不触发变更通知，否则
    /// 翻译写回会把自己重新喂回管道。
    pub fn set_text(&mut self, id: NodeId, text: &str) -> bool {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Text(t)) => {
                *t = text.to_string();
                true
            }
            _ => false,
        }
    }

    /// 文本节点的直接包含元素
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.get(id)?.parent;
        while let Some(p) = current {
            if self.is_element(p) {
                return Some(p);
            }
            current = self.get(p)?.parent;
        }
        None
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.get(id)?.kind {
            NodeKind::Element(el) => el.attrs.get(name).map(|s| s.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => {
                el.attrs.insert(name.to_string(), value.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn set_style(&mut self, id: NodeId, style: ComputedStyle) -> bool {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => {
                el.style = style;
                true
            }
            _ => false,
        }
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) -> bool {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => {
                el.rect = rect;
                true
            }
            _ => false,
        }
    }

    pub fn set_editable(&mut self, id: NodeId, editable: bool) -> bool {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => {
                el.editable = editable;
                true
            }
            _ => false,
        }
    }

    pub fn is_editable(&self, id: NodeId) -> bool {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => el.editable,
            _ => false,
        }
    }

    /// 元素是否可见：计算样式不隐藏且占据非零屏幕面积
    pub fn is_visible(&self, id: NodeId) -> bool {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => !el.style.hides() && el.rect.area() > 0.0,
            _ => false,
        }
    }

    /// 元素当前是否与视口相交
    pub fn in_viewport(&self, id: NodeId) -> bool {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element(el)) => el.rect.intersects(&self.viewport),
            _ => false,
        }
    }

    /// 元素上挂接的影子根
    pub fn shadow_root(&self, id: NodeId) -> Option<NodeId> {
        match &self.get(id)?.kind {
            NodeKind::Element(el) => el.shadow_root,
            NodeKind::Text(_) => None,
        }
    }

    /// 节点所属的被观察根（沿父链上溯到无父节点处）
    pub fn owning_root(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.get(current).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }

    // ------------------------------------------------------------------
    // 变更观察
    // ------------------------------------------------------------------

    /// 在指定根上注册结构变更观察者
    pub fn observe(&mut self, root: NodeId, sender: UnboundedSender<MutationRecord>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(id, (root, sender));
        id
    }

    /// 注销观察者
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        self.observers.remove(&id).is_some()
    }

    /// 当前注册的观察者数量
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify_added(&mut self, added: NodeId) {
        let owner = self.owning_root(added);
        self.notify_under(owner, added);
    }

    fn notify_under(&mut self, root: NodeId, added: NodeId) {
        // 接收端已关闭的观察者顺手清除
        self.observers
            .retain(|_, (observed, sender)| {
                if *observed != root {
                    return true;
                }
                sender.send(MutationRecord { added: vec![added] }).is_ok()
            });
    }

    // ------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let children = node.children.clone();
        let shadow = match &node.kind {
            NodeKind::Element(el) => el.shadow_root,
            NodeKind::Text(_) => None,
        };
        for child in children {
            self.free_subtree(child);
        }
        if let Some(shadow) = shadow {
            self.free_subtree(shadow);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }
}

use std::collections::HashMap;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node_type: NodeType,
}

#[derive(Debug, Clone)]
struct Element {
    tag_name: String,
    attrs: HashMap<String, String>,
}

/// Arena-backed element tree standing in for the external DOM provider.
///
/// Only what the dispatch path and the navigation layer need is modelled:
/// containment, tag names, attributes and an id index. Node ids are never
/// reused, so a removed node keeps answering `parent()` (with `None`) and
/// `attr()` for scripts that still hold it.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// A tree holding only the document node.
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    /// `<html><head></head><body></body></html>` under the document node.
    pub fn blank() -> Self {
        let mut dom = Self::new();
        let html = dom.create_node(Some(dom.root), NodeType::Element(Element::new("html", &[])));
        dom.create_node(Some(html), NodeType::Element(Element::new("head", &[])));
        dom.create_node(Some(html), NodeType::Element(Element::new("body", &[])));
        dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> Option<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .find(|node| self.tag_name(*node) == Some("body"))
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    fn node(&self, node_id: NodeId) -> Result<&Node> {
        self.nodes
            .get(node_id.0)
            .ok_or_else(|| Error::NodeNotFound(format!("node {} is not part of this tree", node_id.0)))
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        node_id.0 < self.nodes.len()
    }

    pub fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId> {
        if !self.can_have_children(parent) {
            return Err(Error::Hierarchy(format!(
                "node {} cannot have children",
                parent.0
            )));
        }
        let id = self.create_node(Some(parent), NodeType::Element(Element::new(tag_name, attrs)));
        if self.is_connected(id) {
            if let Some(id_attr) = self.attr(id, "id").map(str::to_string) {
                self.id_index.entry(id_attr).or_insert(id);
            }
        }
        Ok(id)
    }

    pub fn create_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        if !self.can_have_children(parent) {
            return Err(Error::Hierarchy(format!(
                "node {} cannot have children",
                parent.0
            )));
        }
        Ok(self.create_node(Some(parent), NodeType::Text(text.to_string())))
    }

    fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node_id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_document(&self, node_id: NodeId) -> bool {
        node_id == self.root
    }

    pub fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.is_descendant_of(node_id, self.root)
    }

    /// Inclusive ancestor walk, nearest first.
    pub fn closest(&self, node_id: NodeId, tags: &[&str]) -> Option<NodeId> {
        let mut cursor = Some(node_id);
        while let Some(current) = cursor {
            if self
                .tag_name(current)
                .is_some_and(|tag| tags.iter().any(|wanted| tag.eq_ignore_ascii_case(wanted)))
            {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index
            .get(id)
            .copied()
            .filter(|node| self.is_connected(*node))
    }

    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.attr(node_id, name).is_some()
    }

    pub fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let lowered = name.to_ascii_lowercase();
        let element = self.element_mut(node_id).ok_or_else(|| {
            Error::NodeNotFound(format!("setAttribute target {} is not an element", node_id.0))
        })?;
        element.attrs.insert(lowered.clone(), value.to_string());
        if lowered == "id" {
            self.rebuild_id_index();
        }
        Ok(())
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        match self.nodes.get(node_id.0).map(|node| &node.node_type) {
            Some(NodeType::Document | NodeType::Element(_)) => self
                .children(node_id)
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
            Some(NodeType::Text(text)) => text.clone(),
            None => String::new(),
        }
    }

    fn can_have_children(&self, node_id: NodeId) -> bool {
        matches!(
            self.nodes.get(node_id.0).map(|node| &node.node_type),
            Some(NodeType::Document | NodeType::Element(_))
        )
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if !self.can_have_children(parent) {
            return Err(Error::Hierarchy("appendChild target cannot have children".into()));
        }
        if child == self.root || child == parent || self.is_descendant_of(parent, child) {
            return Err(Error::Hierarchy("appendChild would create a cycle".into()));
        }
        if let Some(old_parent) = self.parent(child) {
            self.nodes[old_parent.0].children.retain(|node| *node != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.rebuild_id_index();
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.parent(child) != Some(parent) {
            return Err(Error::NodeNotFound(format!(
                "node {} is not a child of node {}",
                child.0, parent.0
            )));
        }
        self.nodes[parent.0].children.retain(|node| *node != child);
        self.nodes[child.0].parent = None;
        self.rebuild_id_index();
        Ok(())
    }

    /// Pre-order, inclusive of `node_id`.
    pub fn subtree(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(node_id) {
            return out;
        }
        let mut stack = vec![node_id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Connected elements with one of `tags`, in document order.
    pub fn elements_by_tag(&self, tags: &[&str]) -> Vec<NodeId> {
        self.subtree(self.root)
            .into_iter()
            .filter(|node| {
                self.tag_name(*node)
                    .is_some_and(|tag| tags.iter().any(|wanted| tag.eq_ignore_ascii_case(wanted)))
            })
            .collect()
    }

    fn rebuild_id_index(&mut self) {
        let mut index = HashMap::new();
        for node in self.subtree(self.root) {
            if let Some(id) = self.attr(node, "id") {
                index.entry(id.to_string()).or_insert(node);
            }
        }
        self.id_index = index;
    }
}

impl Element {
    fn new(tag_name: &str, attrs: &[(&str, &str)]) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_document_has_body_under_html() {
        let dom = Dom::blank();
        let body = dom.body().expect("body");
        let html = dom.parent(body).expect("html");
        assert_eq!(dom.tag_name(html), Some("html"));
        assert_eq!(dom.parent(html), Some(dom.root()));
    }

    #[test]
    fn id_index_tracks_connection_state() -> Result<()> {
        let mut dom = Dom::blank();
        let body = dom.body().expect("body");
        let div = dom.create_element(body, "DIV", &[("id", "outer")])?;
        assert_eq!(dom.by_id("outer"), Some(div));
        assert_eq!(dom.tag_name(div), Some("div"));

        dom.remove_child(body, div)?;
        assert_eq!(dom.by_id("outer"), None);
        assert_eq!(dom.parent(div), None);
        assert_eq!(dom.attr(div, "id"), Some("outer"));

        dom.append_child(body, div)?;
        assert_eq!(dom.by_id("outer"), Some(div));
        Ok(())
    }

    #[test]
    fn append_child_rejects_cycles() -> Result<()> {
        let mut dom = Dom::blank();
        let body = dom.body().expect("body");
        let outer = dom.create_element(body, "div", &[])?;
        let inner = dom.create_element(outer, "span", &[])?;
        assert!(matches!(
            dom.append_child(inner, outer),
            Err(Error::Hierarchy(_))
        ));
        assert!(matches!(
            dom.append_child(inner, dom.root()),
            Err(Error::Hierarchy(_))
        ));
        Ok(())
    }

    #[test]
    fn closest_is_inclusive_and_subtree_is_document_order() -> Result<()> {
        let mut dom = Dom::blank();
        let body = dom.body().expect("body");
        let anchor = dom.create_element(body, "a", &[("href", "x.html")])?;
        let span = dom.create_element(anchor, "span", &[])?;
        let text = dom.create_text(span, "go")?;
        assert_eq!(dom.closest(text, &["a", "area"]), Some(anchor));
        assert_eq!(dom.closest(anchor, &["a"]), Some(anchor));
        assert_eq!(dom.subtree(anchor), vec![anchor, span, text]);
        assert_eq!(dom.text_content(anchor), "go");
        Ok(())
    }
}

//! Owned element tree produced by [`crate::markup::normalize`].

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with namespace-free names.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Pre-order position in the tree, used to keep selector results in
    /// document order.
    order: usize,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            order: 0,
        }
    }

    /// Builder-style attribute setter, mostly useful in tests.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// All proper descendants in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Every descendant text node, in document order.
    pub fn text_nodes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_text(self, &mut out);
        out
    }

    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.text_nodes().concat()
    }

    /// Remove every descendant matching `pred`, together with its subtree.
    /// Text that follows a removed element stays in place.
    pub fn remove_where(&mut self, pred: &dyn Fn(&Element) -> bool) -> usize {
        let before = self.children.len();
        self.children.retain(|c| match c {
            Node::Element(e) => !pred(e),
            Node::Text(_) => true,
        });
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            if let Node::Element(e) = child {
                removed += e.remove_where(pred);
            }
        }
        removed
    }

    /// Reassign pre-order positions. Called once after the tree is built.
    pub fn renumber(&mut self) {
        let mut next = 0;
        assign_order(self, &mut next);
    }
}

fn collect_descendants<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
    for child in el.child_elements() {
        out.push(child);
        collect_descendants(child, out);
    }
}

fn collect_text<'a>(el: &'a Element, out: &mut Vec<&'a str>) {
    for child in &el.children {
        match child {
            Node::Text(t) => out.push(t),
            Node::Element(e) => collect_text(e, out),
        }
    }
}

fn assign_order(el: &mut Element, next: &mut usize) {
    el.order = *next;
    *next += 1;
    for child in &mut el.children {
        if let Node::Element(e) = child {
            assign_order(e, next);
        }
    }
}

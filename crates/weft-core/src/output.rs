//! The renderable tree produced by the render phase.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// A rendered node. Compound variants share their payload behind `Rc`, so a
/// memoized instance hands back the identical tree across cycles.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Empty,
    Text(Rc<str>),
    Element(Rc<ElementNode>),
    Fragment(Rc<Vec<Output>>),
}

#[derive(Debug, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub key: String,
    pub attrs: IndexMap<String, Value>,
    pub children: Vec<Output>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>, key: impl Into<String>) -> ElementNode {
        ElementNode {
            tag: tag.into(),
            key: key.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }
}

impl Output {
    pub fn text(text: impl Into<Rc<str>>) -> Output {
        Output::Text(text.into())
    }

    pub fn element(node: ElementNode) -> Output {
        Output::Element(Rc::new(node))
    }

    /// Wrap children in a fragment; an empty list collapses to `Empty`.
    pub fn fragment(items: Vec<Output>) -> Output {
        if items.is_empty() {
            Output::Empty
        } else {
            Output::Fragment(Rc::new(items))
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Output::Empty)
    }

    /// Identity comparison, mirroring [`Value::same`].
    pub fn same(&self, other: &Output) -> bool {
        match (self, other) {
            (Output::Empty, Output::Empty) => true,
            (Output::Text(a), Output::Text(b)) => Rc::ptr_eq(a, b) || a == b,
            (Output::Element(a), Output::Element(b)) => Rc::ptr_eq(a, b),
            (Output::Fragment(a), Output::Fragment(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Flatten to a markup-like string for assertions and debugging.
    /// Render keys are omitted so the result is stable across runs.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            Output::Empty => {}
            Output::Text(text) => out.push_str(text),
            Output::Element(node) => {
                out.push('<');
                out.push_str(&node.tag);
                for (name, value) in &node.attrs {
                    if value.is_null() {
                        continue;
                    }
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&value.to_text());
                    out.push('"');
                }
                if node.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in &node.children {
                        child.write(out);
                    }
                    out.push_str("</");
                    out.push_str(&node.tag);
                    out.push('>');
                }
            }
            Output::Fragment(items) => {
                for item in items.iter() {
                    item.write(out);
                }
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Output::Empty
    }
}

/// The uniform shape every render returns, whatever the hook produced.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderResult {
    pub content: Output,
}

impl RenderResult {
    pub fn new(content: Output) -> RenderResult {
        RenderResult { content }
    }

    pub fn empty() -> RenderResult {
        RenderResult {
            content: Output::Empty,
        }
    }

    pub fn same(&self, other: &RenderResult) -> bool {
        self.content.same(&other.content)
    }
}

impl From<Output> for RenderResult {
    fn from(content: Output) -> Self {
        RenderResult { content }
    }
}

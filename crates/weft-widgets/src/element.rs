use std::rc::Rc;

use indexmap::IndexMap;

use weft_core::{
    Controller, ControllerInit, ElementNode, Output, Path, PropertySpec, RenderResult, Value,
    Widget, WidgetBuilder,
};

fn attr_field(name: &str) -> String {
    format!("attr.{}", name)
}

/// Builder for a generic element widget: a tagged output node with bound
/// attributes, child widgets, event attributes and declarative properties.
pub struct ElementBuilder {
    tag: Rc<str>,
    attrs: Vec<String>,
    children: Vec<Rc<Widget>>,
    widget: WidgetBuilder,
}

pub fn element(tag: impl Into<Rc<str>>) -> ElementBuilder {
    let tag = tag.into();
    ElementBuilder {
        widget: Widget::builder(Rc::clone(&tag)),
        tag,
        attrs: Vec::new(),
        children: Vec::new(),
    }
}

impl ElementBuilder {
    /// Bind the named attribute to the store value at `path`. Null values
    /// are dropped from the rendered node.
    pub fn attr(mut self, name: impl Into<String>, path: impl Into<Path>) -> Self {
        let name = name.into();
        self.widget = self.widget.bind(attr_field(&name), path);
        self.attrs.push(name);
        self
    }

    pub fn attr_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        self.widget = self.widget.bind_value(attr_field(&name), value);
        self.attrs.push(name);
        self
    }

    /// Derive the named attribute from the whole store view.
    pub fn attr_compute(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&Value) -> Value + 'static,
    ) -> Self {
        let name = name.into();
        self.widget = self.widget.bind_compute(attr_field(&name), f);
        self.attrs.push(name);
        self
    }

    pub fn visible(mut self, path: impl Into<Path>) -> Self {
        self.widget = self.widget.visible_path(path);
        self
    }

    pub fn child(mut self, child: Rc<Widget>) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Rc<Widget>>) -> Self {
        self.children.extend(children);
        self
    }

    /// Declare an event attribute surfaced through `Instance::event_handlers`.
    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.widget = self.widget.event_attribute(event);
        self
    }

    pub fn property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.widget = self.widget.property(name, spec);
        self
    }

    pub fn callback(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&weft_core::Instance, &[Value]) -> Value + 'static,
    ) -> Self {
        self.widget = self.widget.callback(name, f);
        self
    }

    pub fn callback_method(
        mut self,
        name: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.widget = self.widget.callback_method(name, method);
        self
    }

    pub fn controller(
        mut self,
        factory: impl Fn(&ControllerInit<'_>) -> Controller + 'static,
    ) -> Self {
        self.widget = self.widget.controller(factory);
        self
    }

    pub fn build(self) -> Rc<Widget> {
        let ElementBuilder {
            tag,
            attrs,
            children,
            mut widget,
        } = self;
        if !children.is_empty() {
            widget = widget.explore(move |context, instance, _data| {
                let mut live = Vec::with_capacity(children.len());
                for child_widget in &children {
                    let child = instance.get_child(child_widget, None, None);
                    if child.schedule_explore_if_visible(context) {
                        live.push(child);
                    }
                }
                instance.set_children(live);
            });
        }
        let attrs = Rc::new(attrs);
        widget
            .render(move |context, instance, key| {
                let data = instance.data();
                let mut resolved = IndexMap::new();
                for name in attrs.iter() {
                    if let Some(value) = data.get(&attr_field(name)) {
                        if !value.is_null() {
                            resolved.insert(name.clone(), value.clone());
                        }
                    }
                }
                let children = instance.render_children(context)?;
                Ok(RenderResult::new(Output::element(ElementNode {
                    tag: tag.to_string(),
                    key: key.to_string(),
                    attrs: resolved,
                    children,
                })))
            })
            .build()
    }
}

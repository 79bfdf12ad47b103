use std::rc::Rc;

use indexmap::IndexMap;

use weft_core::{ElementNode, Output, RenderResult, Value, Widget};

use crate::content::body_placeholder;

/// Chrome for `WidgetBuilder::outer_layout`: wraps the instance it decorates
/// in a `frame` element, with the body slot rendering the wrapped output.
pub fn frame_layout(title: impl Into<Value>) -> Rc<Widget> {
    let body = body_placeholder();
    Widget::builder("frame-layout")
        .bind_value("title", title)
        .explore(move |context, instance, _data| {
            let child = instance.get_child(&body, None, None);
            if child.schedule_explore_if_visible(context) {
                instance.set_children(vec![child]);
            } else {
                instance.set_children(Vec::new());
            }
        })
        .render(|context, instance, key| {
            let data = instance.data();
            let mut attrs = IndexMap::new();
            if let Some(title) = data.get("title") {
                if !title.is_null() {
                    attrs.insert("title".to_string(), title.clone());
                }
            }
            let children = instance.render_children(context)?;
            Ok(RenderResult::new(Output::element(ElementNode {
                tag: "frame".to_string(),
                key: key.to_string(),
                attrs,
                children,
            })))
        })
        .build()
}

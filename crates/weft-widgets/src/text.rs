use std::rc::Rc;

use weft_core::{Output, Path, RenderResult, Value, Widget};

fn text_widget() -> weft_core::WidgetBuilder {
    Widget::builder("text").render(|_context, instance, _key| {
        let data = instance.data();
        let text = data.get("text").map(Value::to_text).unwrap_or_default();
        Ok(RenderResult::new(Output::text(text)))
    })
}

/// A text node bound to the store value at `path`.
pub fn text(path: impl Into<Path>) -> Rc<Widget> {
    text_widget().bind("text", path).build()
}

/// A text node with a fixed value.
pub fn label(value: impl Into<Value>) -> Rc<Widget> {
    text_widget().bind_value("text", value).build()
}

use std::rc::Rc;

use weft_core::{Output, RenderResult, Widget};

/// A widget that mounts a fixed list of children and renders them as a
/// fragment. Invisible children are dropped for the cycle but stay cached.
pub fn container(children: Vec<Rc<Widget>>) -> Rc<Widget> {
    Widget::builder("container")
        .explore(move |context, instance, _data| {
            let mut live = Vec::with_capacity(children.len());
            for child_widget in &children {
                let child = instance.get_child(child_widget, None, None);
                if child.schedule_explore_if_visible(context) {
                    live.push(child);
                }
            }
            instance.set_children(live);
        })
        .render(|context, instance, _key| {
            let rendered = instance.render_children(context)?;
            Ok(RenderResult::new(Output::fragment(rendered)))
        })
        .build()
}

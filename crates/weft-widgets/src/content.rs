use std::rc::Rc;

use weft_core::{Instance, RenderResult, Widget, BODY_SLOT};

/// A slot rendering content projected under `name`. Adoption is two-way:
/// content explored before the slot is picked up from the traversal
/// context, content explored after it arrives through a registered hook.
pub fn content_placeholder(name: impl Into<String>) -> Rc<Widget> {
    let name = name.into();
    Widget::builder("content-placeholder")
        .explore(move |context, instance, _data| {
            match context.content(&name) {
                Some(content) => instance.set_children(vec![content]),
                None => {
                    instance.set_children(Vec::new());
                    let target = instance.clone();
                    context.register_placeholder(
                        name.clone(),
                        Rc::new(move |content: &Instance| {
                            target.set_children(vec![content.clone()]);
                        }),
                    );
                }
            }
        })
        .prepare(|_context, instance| {
            // adoption is settled once explore finishes; an updated content
            // instance must punch through the hosts' memoized output
            if instance
                .children()
                .first()
                .is_some_and(Instance::should_update)
            {
                instance.mark_updated();
            }
        })
        .render(|context, instance, _key| {
            let adopted = instance.children();
            match adopted.first() {
                Some(content) => {
                    // open the gate only for the delegated render so the
                    // declaring parent keeps producing empty output
                    content.set_should_render_content(true);
                    let result = content.render(context, content.key().prefix());
                    content.set_should_render_content(false);
                    result
                }
                None => Ok(RenderResult::empty()),
            }
        })
        .build()
}

/// The slot an outer layout fills with the instance it wraps.
pub fn body_placeholder() -> Rc<Widget> {
    content_placeholder(BODY_SLOT)
}

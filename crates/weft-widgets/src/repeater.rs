use std::rc::Rc;

use weft_core::{Output, Path, RenderResult, Value, Widget};

/// Mount one `item` instance per entry of the list at `records`, keyed by
/// position.
pub fn repeater(records: impl Into<Path>, item: Rc<Widget>) -> Rc<Widget> {
    repeater_keyed(records, None, item)
}

/// Keyed variant: with a `key_field`, instances follow their record across
/// reorders and keep their state and per-record store binding.
pub fn repeater_keyed(
    records: impl Into<Path>,
    key_field: Option<&str>,
    item: Rc<Widget>,
) -> Rc<Widget> {
    let records: Path = records.into();
    let key_path = key_field.map(Path::parse);
    let list_path = records.clone();
    Widget::builder("repeater")
        .bind("records", records)
        .explore(move |context, instance, data| {
            let store = instance.store();
            let items = match data.get("records").and_then(Value::as_list) {
                Some(items) => items.to_vec(),
                None => {
                    if !matches!(data.get("records"), None | Some(Value::Null)) {
                        log::debug!(
                            target: "weft::repeater",
                            "{} records value is not a list",
                            instance.id()
                        );
                    }
                    Vec::new()
                }
            };
            let mut live = Vec::with_capacity(items.len());
            for (index, record) in items.iter().enumerate() {
                let key = match &key_path {
                    Some(path) => record
                        .get_path(path)
                        .map(Value::to_text)
                        .unwrap_or_else(|| index.to_string()),
                    None => index.to_string(),
                };
                let prefix = format!("item-{}", key);
                let item_store = store.zoom(list_path.index(index));
                let child = instance.get_child(&item, Some(&prefix), Some(&item_store));
                if child.schedule_explore_if_visible(context) {
                    live.push(child);
                }
            }
            instance.set_children(live);
        })
        .render(|context, instance, _key| {
            Ok(RenderResult::new(Output::fragment(
                instance.render_children(context)?,
            )))
        })
        .build()
}

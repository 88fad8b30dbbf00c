//! Slot distribution
//!
//! Light DOM children are sorted into the declared slots by their `slot`
//! attribute and published into component state in light DOM order. Children
//! that are custom elements without a definition yet are waited for, bounded
//! by the scheduler's `upgrade_timeout`.

use std::collections::HashMap;
use std::pin::pin;
use std::rc::Rc;

use futures::future::{Either, FutureExt, LocalBoxFuture, join_all, select};
use indexmap::{IndexMap, IndexSet};
use lumen_dom::{
    CustomState, Document, Event, Listener, ListenerOptions, MutationCallback, MutationObserverInit,
    MutationRecord, NodeId, Value,
};
use smol::Timer;

use crate::class::HookKind;
use crate::component::{ComponentCore, MonitoredProps};
use crate::metadata::{ElementMetadata, ListenFor, SlotType};
use crate::runtime::{PROPERTY_CHANGE_EVENT, Runtime};

pub const DEFAULT_SLOT: &str = "default";

/// Slot a child is distributed to. Text goes to the default slot; generated
/// individual slot names (`items-3`) map back to their slot (`items`).
pub fn slot_name_of(doc: &Document, node: NodeId) -> String {
    if !doc.is_element(node) {
        return DEFAULT_SLOT.to_string();
    }
    match doc.get_attribute(node, "slot") {
        Some(slot) if !slot.is_empty() => strip_individual_suffix(&slot).to_string(),
        _ => DEFAULT_SLOT.to_string(),
    }
}

fn strip_individual_suffix(slot: &str) -> &str {
    match slot.rsplit_once('-') {
        Some((base, n)) if !base.is_empty() && !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => slot,
    }
}

impl Runtime {
    /// Re-distribute children on every light DOM change of a slotted host
    pub(crate) fn observe_children(&self, core: &Rc<ComponentCore>) {
        if !core.metadata.has_slots() {
            return;
        }
        let host = core.host;
        let weak = self.weak();
        let callback: MutationCallback = Rc::new(move |records: Vec<MutationRecord>| {
            let Some(runtime) = weak.upgrade() else {
                return;
            };
            tracing::debug!(?host, records = records.len(), "Light DOM changed");
            if let Some(core) = runtime.component(host) {
                runtime.children_changed(&core);
            }
        });
        let options = MutationObserverInit {
            child_list: true,
            subtree: true,
            character_data: true,
            ..Default::default()
        };
        if let Err(err) = self.document().observe(host, options, callback) {
            self.report(err.into());
        }
    }

    fn children_changed(&self, core: &Rc<ComponentCore>) {
        if let Some(pending) = self.process_children(core) {
            self.spawn(pending);
        }
    }

    /// Update slots and run the children-changed hook. Returns the rest of
    /// the work when it has to wait for undefined children.
    pub(crate) fn process_children(&self, core: &Rc<ComponentCore>) -> Option<LocalBoxFuture<'static, ()>> {
        if !core.metadata.has_slots() {
            self.run_hook(core, HookKind::ChildrenChanged);
            return None;
        }
        self.update_slots(core)
    }

    fn update_slots(&self, core: &Rc<ComponentCore>) -> Option<LocalBoxFuture<'static, ()>> {
        let doc = self.document().clone();
        let metadata = core.metadata.clone();

        let (generation, listeners) = {
            let mut slots = core.slots.borrow_mut();
            slots.generation += 1;
            slots.monitored.clear();
            slots.individual.clear();
            (slots.generation, std::mem::take(&mut slots.listeners))
        };
        for (child, id) in listeners {
            doc.remove_event_listener(child, id);
        }
        {
            let mut state = core.state.borrow_mut();
            for slot in metadata.slots().keys() {
                state.insert(metadata.slot_property_name(slot).to_string(), Value::List(Vec::new()));
            }
        }
        self.invalidate(core);

        let can_slot_text = metadata
            .slot(DEFAULT_SLOT)
            .is_some_and(|slot| slot.ty == SlotType::Node);
        let children = if can_slot_text {
            doc.children(core.host)
        } else {
            doc.element_children(core.host)
        };

        let mut counters: HashMap<String, usize> = HashMap::new();
        let mut individual = Vec::new();
        let mut assigned = Vec::new();
        let mut undefined = IndexSet::new();
        for child in children {
            let slot = slot_name_of(&doc, child);
            let Some(decl) = metadata.slot(&slot) else {
                tracing::warn!(
                    "Unknown slotName: {}, ignoring {:?}. Valid values are: {}",
                    slot,
                    child,
                    metadata.slots().keys().cloned().collect::<Vec<_>>().join(", ")
                );
                continue;
            };
            if decl.individual_slots {
                let next = counters.entry(slot.clone()).or_insert(0);
                *next += 1;
                individual.push((child, format!("{slot}-{next}")));
            }
            if doc.custom_state(child) == Some(CustomState::Undefined) {
                if let Some(name) = doc.local_name(child) {
                    undefined.insert(name);
                }
            }
            assigned.push((child, slot));
        }
        core.slots.borrow_mut().individual = individual;

        if undefined.is_empty() {
            self.finish_slots(core, assigned);
            return None;
        }

        let definitions: Vec<_> = undefined.iter().map(|name| doc.when_defined(name)).collect();
        let timeout = self.scheduler().config().upgrade_timeout;
        let weak = self.weak();
        let core = core.clone();
        Some(
            async move {
                let defined = join_all(definitions);
                if let Either::Right(_) = select(pin!(defined), pin!(Timer::after(timeout))).await {
                    tracing::warn!(
                        ?timeout,
                        "Slotted custom elements not defined in time: {}",
                        undefined.iter().cloned().collect::<Vec<_>>().join(" ; ")
                    );
                }
                let Some(runtime) = weak.upgrade() else {
                    return;
                };
                if core.slots.borrow().generation != generation {
                    return;
                }
                for (child, _) in &assigned {
                    runtime.document().upgrade(*child);
                }
                runtime.finish_slots(&core, assigned);
            }
            .boxed_local(),
        )
    }

    fn finish_slots(&self, core: &Rc<ComponentCore>, assigned: Vec<(NodeId, String)>) {
        let doc = self.document();
        let metadata = core.metadata.clone();
        let mut by_property: IndexMap<String, Vec<Value>> = IndexMap::new();
        for (child, slot) in assigned {
            let Some(decl) = metadata.slot(&slot) else {
                continue;
            };
            let child = match ElementMetadata::validate_slot_value(doc, child, decl) {
                Ok(child) => child,
                Err(err) => {
                    self.report(err);
                    continue;
                }
            };
            if let Some(listen_for) = &decl.listen_for {
                self.monitor_child(core, child, &slot, listen_for);
            }
            by_property
                .entry(metadata.slot_property_name(&slot).to_string())
                .or_default()
                .push(Value::Node(child));
        }
        {
            let mut state = core.state.borrow_mut();
            for (property, nodes) in by_property {
                state.insert(property, Value::List(nodes));
            }
        }
        self.invalidate(core);
        self.run_hook(core, HookKind::ChildrenChanged);
    }

    /// Invalidate the host when a slotted component changes a listed property
    fn monitor_child(&self, core: &Rc<ComponentCore>, child: NodeId, slot: &str, listen_for: &ListenFor) {
        let Some(child_core) = self.component(child) else {
            return;
        };
        let monitored = match listen_for {
            ListenFor::Props(props) => MonitoredProps {
                observed: props.clone(),
                excluded: Vec::new(),
            },
            ListenFor::Filter { props, exclude } => MonitoredProps {
                observed: props.clone().unwrap_or_else(|| {
                    child_core
                        .metadata
                        .props_list()
                        .into_iter()
                        .map(str::to_string)
                        .collect()
                }),
                excluded: exclude.clone(),
            },
        };
        core.slots
            .borrow_mut()
            .monitored
            .entry(slot.to_string())
            .or_insert(monitored);

        let weak = self.weak();
        let parent = core.host;
        let listener: Listener = Rc::new(move |event: &mut Event| {
            if event.target() != Some(child) {
                return;
            }
            if let Some(runtime) = weak.upgrade() {
                runtime.child_property_changed(parent, child, event);
            }
        });
        let id = self.document().add_event_listener(
            child,
            PROPERTY_CHANGE_EVENT,
            listener,
            ListenerOptions::default(),
        );
        core.slots.borrow_mut().listeners.push((child, id));
    }

    fn child_property_changed(&self, parent: NodeId, child: NodeId, event: &Event) {
        if self.document().parent(child) != Some(parent) {
            return;
        }
        let Some(core) = self.component(parent) else {
            return;
        };
        let Some(name) = event.detail.get("name").and_then(Value::as_str) else {
            return;
        };
        let slot = slot_name_of(self.document(), child);
        let observed = core
            .slots
            .borrow()
            .monitored
            .get(&slot)
            .is_some_and(|monitored| monitored.matches(name));
        if observed {
            self.invalidate(&core);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_name_of() {
        let doc = Document::new();
        let text = doc.create_text_node("hi");
        let plain = doc.create_element("div");
        let named = doc.create_element("div");
        doc.set_attribute(named, "slot", "footer").unwrap();
        let generated = doc.create_element("div");
        doc.set_attribute(generated, "slot", "items-12").unwrap();
        let dashed = doc.create_element("div");
        doc.set_attribute(dashed, "slot", "value-state-message").unwrap();

        assert_eq!(slot_name_of(&doc, text), "default");
        assert_eq!(slot_name_of(&doc, plain), "default");
        assert_eq!(slot_name_of(&doc, named), "footer");
        assert_eq!(slot_name_of(&doc, generated), "items");
        assert_eq!(slot_name_of(&doc, dashed), "value-state-message");
    }

    #[test]
    fn test_strip_individual_suffix() {
        assert_eq!(strip_individual_suffix("a-1-2"), "a-1");
        assert_eq!(strip_individual_suffix("-3"), "-3");
        assert_eq!(strip_individual_suffix("tab-"), "tab-");
    }
}

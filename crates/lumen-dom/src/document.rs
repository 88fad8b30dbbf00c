//! Document
//!
//! Shared handle over a [`DomTree`] that layers the behaviour scripts observe
//! on top of raw structure: custom element reactions, mutation records,
//! listener registration and event dispatch.
//!
//! Every public method releases its internal borrows before invoking author
//! code, so listeners, observers and reactions may re-enter the document.

use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use crate::custom_elements::{CustomElementRegistry, ElementReactions};
use crate::deferred::Promise;
use crate::events::{event_path, retarget, Event, EventPhase, Listener, ListenerId, ListenerOptions};
use crate::node::{Attribute, CustomState, Namespace, NodeType};
use crate::observer::{MutationCallback, MutationObserverInit, MutationRecord, ObserverRegistry};
use crate::tree::DomTree;
use crate::{DomError, NodeId, Value};

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    event_type: String,
    options: ListenerOptions,
    callback: Listener,
}

enum Reaction {
    Upgrade(NodeId),
    Connected(NodeId),
    Disconnected(NodeId),
    AttributeChanged {
        element: NodeId,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

struct DocumentInner {
    tree: RefCell<DomTree>,
    html: NodeId,
    head: NodeId,
    body: NodeId,
    listeners: RefCell<HashMap<NodeId, Vec<ListenerEntry>>>,
    next_listener: Cell<u64>,
    observers: RefCell<ObserverRegistry>,
    mutation_notifier: RefCell<Option<Rc<dyn Fn()>>>,
    registry: RefCell<CustomElementRegistry>,
    globals: RefCell<HashSet<String>>,
    mutation_count: Cell<u64>,
}

/// Shared document handle
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
}

/// Non-owning document handle
#[derive(Clone)]
pub struct WeakDocument {
    inner: Weak<DocumentInner>,
}

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.inner.upgrade().map(|inner| Document { inner })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.inner.tree.borrow().len())
            .finish()
    }
}

impl Document {
    /// Empty `<html><head></head><body></body></html>` document
    pub fn new() -> Self {
        let mut tree = DomTree::new();
        let root = tree.create_document();
        let html = tree.create_element("html", Namespace::Html);
        let head = tree.create_element("head", Namespace::Html);
        let body = tree.create_element("body", Namespace::Html);
        // fresh nodes, cannot fail
        let _ = tree.append_child(root, html);
        let _ = tree.append_child(html, head);
        let _ = tree.append_child(html, body);

        Self {
            inner: Rc::new(DocumentInner {
                tree: RefCell::new(tree),
                html,
                head,
                body,
                listeners: RefCell::new(HashMap::new()),
                next_listener: Cell::new(1),
                observers: RefCell::new(ObserverRegistry::default()),
                mutation_notifier: RefCell::new(None),
                registry: RefCell::new(CustomElementRegistry::new()),
                globals: RefCell::new(HashSet::new()),
                mutation_count: Cell::new(0),
            }),
        }
    }

    /// Handle that does not keep the document alive
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same document
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn document_element(&self) -> NodeId {
        self.inner.html
    }

    pub fn head(&self) -> NodeId {
        self.inner.head
    }

    pub fn body(&self) -> NodeId {
        self.inner.body
    }

    fn tree(&self) -> Ref<'_, DomTree> {
        self.inner.tree.borrow()
    }

    /// Run `f` against the underlying tree
    pub fn with_tree<R>(&self, f: impl FnOnce(&DomTree) -> R) -> R {
        f(&self.tree())
    }

    /// Number of structural, attribute and character data mutations so far
    pub fn mutation_count(&self) -> u64 {
        self.inner.mutation_count.get()
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    /// Create an HTML element. Defined custom elements are upgraded right away.
    pub fn create_element(&self, name: &str) -> NodeId {
        self.create_element_ns(&name.to_ascii_lowercase(), Namespace::Html)
    }

    pub fn create_element_ns(&self, name: &str, namespace: Namespace) -> NodeId {
        let id = self.inner.tree.borrow_mut().create_element(name, namespace);
        if self.is_defined(name) {
            self.run_reactions(vec![Reaction::Upgrade(id)]);
        }
        id
    }

    pub fn create_text_node(&self, data: &str) -> NodeId {
        self.inner.tree.borrow_mut().create_text(data)
    }

    pub fn create_comment(&self, data: &str) -> NodeId {
        self.inner.tree.borrow_mut().create_comment(data)
    }

    pub fn create_document_fragment(&self) -> NodeId {
        self.inner.tree.borrow_mut().create_fragment()
    }

    /// Copy a subtree of another tree into this document, upgrading defined
    /// custom elements in tree order.
    pub fn import_node(&self, src: &DomTree, node: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let id = self.inner.tree.borrow_mut().import_node(src, node, deep)?;
        self.upgrade(id);
        Ok(id)
    }

    pub fn clone_node(&self, node: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let id = self.inner.tree.borrow_mut().clone_node(node, deep)?;
        self.upgrade(id);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` (or a fragment's children) before `reference`
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if self.tree().is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        // a connected node being moved is disconnected first
        let old_parent = self.parent(child);
        if let Some(old_parent) = old_parent {
            if self.node_type(child) != Some(NodeType::DocumentFragment) && reference != Some(child) {
                self.remove_child(old_parent, child)?;
            }
        }

        let (record, reactions, notify) = {
            let mut tree = self.inner.tree.borrow_mut();
            let inserted = tree.insert_before(parent, child, reference)?;
            if inserted.is_empty() {
                return Ok(());
            }
            let first = inserted[0];
            let last = inserted[inserted.len() - 1];
            let record = MutationRecord::child_list(
                parent,
                inserted.clone(),
                Vec::new(),
                tree.prev_sibling(first),
                tree.next_sibling(last),
            );
            let reactions = if tree.is_connected(parent) {
                self.connect_reactions(&tree, &inserted)
            } else {
                Vec::new()
            };
            let notify = self.inner.observers.borrow_mut().queue(&tree, &record);
            (record, reactions, notify)
        };
        tracing::trace!(parent = ?parent, added = record.added_nodes.len(), "insert");
        self.bump();
        self.run_reactions(reactions);
        if notify {
            self.notify_mutation();
        }
        Ok(())
    }

    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let (reactions, notify) = {
            let mut tree = self.inner.tree.borrow_mut();
            if tree.parent(child) != Some(parent) {
                return Err(DomError::NotAChild { parent, child });
            }
            let reactions = if tree.is_connected(parent) {
                self.disconnect_reactions(&tree, child)
            } else {
                Vec::new()
            };
            let prev = tree.prev_sibling(child);
            let next = tree.next_sibling(child);
            tree.remove_child(parent, child)?;
            let record = MutationRecord::child_list(parent, Vec::new(), vec![child], prev, next);
            let notify = self.inner.observers.borrow_mut().queue(&tree, &record);
            (reactions, notify)
        };
        self.bump();
        self.run_reactions(reactions);
        if notify {
            self.notify_mutation();
        }
        Ok(())
    }

    /// Detach a node from its parent, if any
    pub fn remove(&self, node: NodeId) -> Result<(), DomError> {
        match self.parent(node) {
            Some(parent) => self.remove_child(parent, node),
            None => Ok(()),
        }
    }

    /// Remove all children of `node`
    pub fn clear_children(&self, node: NodeId) -> Result<(), DomError> {
        while let Some(child) = self.first_child(node) {
            self.remove_child(node, child)?;
        }
        Ok(())
    }

    fn connect_reactions(&self, tree: &DomTree, inserted: &[NodeId]) -> Vec<Reaction> {
        let registry = self.inner.registry.borrow();
        let mut reactions = Vec::new();
        for &node in inserted {
            for id in tree.shadow_including_inclusive_descendants(node) {
                let Some(element) = tree.element(id) else { continue };
                match element.custom_state {
                    CustomState::Custom => reactions.push(Reaction::Connected(id)),
                    CustomState::Undefined if registry.is_defined(&element.local_name) => {
                        reactions.push(Reaction::Upgrade(id));
                        reactions.push(Reaction::Connected(id));
                    }
                    _ => {}
                }
            }
        }
        reactions
    }

    fn disconnect_reactions(&self, tree: &DomTree, node: NodeId) -> Vec<Reaction> {
        tree.shadow_including_inclusive_descendants(node)
            .into_iter()
            .filter(|&id| {
                tree.element(id)
                    .is_some_and(|e| e.custom_state == CustomState::Custom)
            })
            .map(Reaction::Disconnected)
            .collect()
    }

    fn bump(&self) {
        self.inner.mutation_count.set(self.inner.mutation_count.get() + 1);
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree().parent(node)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree().children(node).collect()
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree().element_children(node)
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree().first_child(node)
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.tree().last_child(node)
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.tree().next_sibling(node)
    }

    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.tree().prev_sibling(node)
    }

    pub fn node_type(&self, node: NodeId) -> Option<NodeType> {
        self.tree().node_type(node)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.tree().is_element(node)
    }

    pub fn local_name(&self, node: NodeId) -> Option<String> {
        self.tree().local_name(node).map(str::to_string)
    }

    pub fn custom_state(&self, node: NodeId) -> Option<CustomState> {
        self.tree().element(node).map(|e| e.custom_state)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.tree().is_connected(node)
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.tree().inner_html(node)
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        self.tree().outer_html(node)
    }

    /// Connected elements with the given local name, in tree order
    pub fn elements_by_tag(&self, name: &str) -> Vec<NodeId> {
        let tree = self.tree();
        tree.descendants(NodeId::ROOT)
            .into_iter()
            .filter(|&id| tree.local_name(id) == Some(name))
            .collect()
    }

    /// Elements under `root` carrying attribute `name`
    pub fn find_by_attribute(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        let tree = self.tree();
        tree.descendants(root)
            .into_iter()
            .filter(|&id| tree.attribute(id, name).is_some())
            .collect()
    }

    // ------------------------------------------------------------------
    // Attributes and character data
    // ------------------------------------------------------------------

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree().attribute(node, name).map(str::to_string)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.tree().attribute(node, name).is_some()
    }

    pub fn attributes(&self, node: NodeId) -> Vec<Attribute> {
        self.tree()
            .element(node)
            .map(|e| e.attrs.clone())
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = self.attribute_name(node, name);
        let old = self.inner.tree.borrow_mut().set_attribute(node, &name, value)?;
        self.attribute_mutated(node, &name, old, Some(value.to_string()));
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let name = self.attribute_name(node, name);
        let old = self.inner.tree.borrow_mut().remove_attribute(node, &name)?;
        if old.is_some() {
            self.attribute_mutated(node, &name, old, None);
        }
        Ok(())
    }

    /// Add or remove a valueless attribute
    pub fn toggle_attribute(&self, node: NodeId, name: &str, force: bool) -> Result<(), DomError> {
        match (force, self.has_attribute(node, name)) {
            (true, false) => self.set_attribute(node, name, ""),
            (false, true) => self.remove_attribute(node, name),
            _ => Ok(()),
        }
    }

    fn attribute_name(&self, node: NodeId, name: &str) -> String {
        match self.tree().element(node) {
            Some(e) if e.namespace == Namespace::Html => name.to_ascii_lowercase(),
            _ => name.to_string(),
        }
    }

    fn attribute_mutated(&self, node: NodeId, name: &str, old: Option<String>, new: Option<String>) {
        let (reaction, notify) = {
            let tree = self.inner.tree.borrow();
            let record = MutationRecord::attribute(node, name, old.clone());
            let notify = self.inner.observers.borrow_mut().queue(&tree, &record);
            let observed = tree.element(node).is_some_and(|e| {
                e.custom_state == CustomState::Custom
                    && self
                        .inner
                        .registry
                        .borrow()
                        .get(&e.local_name)
                        .is_some_and(|d| d.observed_attributes.iter().any(|a| a == name))
            });
            let reaction = observed.then(|| Reaction::AttributeChanged {
                element: node,
                name: name.to_string(),
                old,
                new,
            });
            (reaction, notify)
        };
        self.bump();
        if let Some(reaction) = reaction {
            self.run_reactions(vec![reaction]);
        }
        if notify {
            self.notify_mutation();
        }
    }

    /// Data of a text or comment node
    pub fn text(&self, node: NodeId) -> Option<String> {
        self.tree().character_data(node).map(str::to_string)
    }

    /// Replace the data of a text or comment node
    pub fn set_text(&self, node: NodeId, data: &str) -> Result<(), DomError> {
        let notify = {
            let mut tree = self.inner.tree.borrow_mut();
            let old = tree.set_character_data(node, data)?;
            let record = MutationRecord::character_data(node, old);
            self.inner.observers.borrow_mut().queue(&tree, &record)
        };
        self.bump();
        if notify {
            self.notify_mutation();
        }
        Ok(())
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.tree().text_content(node)
    }

    /// Replace all children with a single text node (or nothing for "")
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        if matches!(self.node_type(node), Some(NodeType::Text) | Some(NodeType::Comment)) {
            return self.set_text(node, text);
        }
        self.clear_children(node)?;
        if !text.is_empty() {
            let child = self.create_text_node(text);
            self.append_child(node, child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property through the element's definition, falling back to
    /// the own property bag.
    pub fn get_property(&self, node: NodeId, name: &str) -> Value {
        if let Some(sink) = self.reactions_for(node) {
            if let Some(value) = sink.get_property(node, name) {
                return value;
            }
        }
        self.tree()
            .element(node)
            .and_then(|e| e.properties.get(name).cloned())
            .unwrap_or_default()
    }

    /// Assign a property through the element's definition, falling back to
    /// the own property bag.
    pub fn set_property(&self, node: NodeId, name: &str, value: Value) -> Result<(), DomError> {
        if let Some(sink) = self.reactions_for(node) {
            if sink.set_property(node, name, &value)? {
                return Ok(());
            }
        }
        let mut tree = self.inner.tree.borrow_mut();
        let element = tree.element_mut(node).ok_or(DomError::NotAnElement(node))?;
        element.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a value stored in the own property bag
    pub fn take_own_property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.inner
            .tree
            .borrow_mut()
            .element_mut(node)?
            .properties
            .remove(name)
    }

    // ------------------------------------------------------------------
    // Shadow DOM
    // ------------------------------------------------------------------

    pub fn attach_shadow(&self, host: NodeId) -> Result<NodeId, DomError> {
        self.inner.tree.borrow_mut().attach_shadow(host)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.tree().shadow_root(host)
    }

    /// Host of a shadow root
    pub fn host(&self, root: NodeId) -> Option<NodeId> {
        self.tree().shadow_host(root)
    }

    /// Shadow root or document the node lives in
    pub fn root_node(&self, node: NodeId) -> NodeId {
        self.tree().root(node)
    }

    pub fn assigned_nodes(&self, slot: NodeId, flatten: bool) -> Vec<NodeId> {
        self.tree().assigned_nodes(slot, flatten)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register a listener. Registering the same callback for the same type
    /// and capture flag again returns the existing registration.
    pub fn add_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        callback: Listener,
        options: ListenerOptions,
    ) -> ListenerId {
        let mut listeners = self.inner.listeners.borrow_mut();
        let entries = listeners.entry(node).or_default();
        if let Some(existing) = entries.iter().find(|e| {
            e.event_type == event_type
                && e.options.capture == options.capture
                && Rc::ptr_eq(&e.callback, &callback)
        }) {
            return existing.id;
        }
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        entries.push(ListenerEntry {
            id,
            event_type: event_type.to_string(),
            options,
            callback,
        });
        id
    }

    pub fn remove_event_listener(&self, node: NodeId, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let Some(entries) = listeners.get_mut(&node) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        before != entries.len()
    }

    /// Number of listeners registered on `node` for `event_type`
    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .get(&node)
            .map_or(0, |entries| entries.iter().filter(|e| e.event_type == event_type).count())
    }

    fn is_registered(&self, node: NodeId, id: ListenerId) -> bool {
        self.inner
            .listeners
            .borrow()
            .get(&node)
            .is_some_and(|entries| entries.iter().any(|e| e.id == id))
    }

    /// Dispatch `event` at `target`. Returns false when the default action
    /// was prevented.
    pub fn dispatch_event(&self, target: NodeId, event: &mut Event) -> bool {
        let plan: Vec<(NodeId, NodeId)> = {
            let tree = self.tree();
            let path = event_path(&tree, target, event.composed);
            event.begin(target, path.clone());
            path.into_iter()
                .map(|node| (node, retarget(&tree, target, node)))
                .collect()
        };
        tracing::trace!(event = event.event_type(), ?target, len = plan.len(), "dispatch");

        for &(node, seen_target) in plan.iter().rev() {
            if event.halts_propagation() {
                break;
            }
            let phase = if node == seen_target {
                EventPhase::AtTarget
            } else {
                EventPhase::Capturing
            };
            event.enter(node, seen_target, phase);
            self.invoke(node, event, true);
        }

        for &(node, seen_target) in &plan {
            if event.halts_propagation() {
                break;
            }
            let phase = if node == seen_target {
                EventPhase::AtTarget
            } else if event.bubbles {
                EventPhase::Bubbling
            } else {
                continue;
            };
            event.enter(node, seen_target, phase);
            self.invoke(node, event, false);
        }

        event.finish(target);
        !event.default_prevented()
    }

    fn invoke(&self, node: NodeId, event: &mut Event, capture: bool) {
        let entries: Vec<ListenerEntry> = match self.inner.listeners.borrow().get(&node) {
            Some(entries) => entries
                .iter()
                .filter(|e| e.event_type == event.event_type() && e.options.capture == capture)
                .cloned()
                .collect(),
            None => return,
        };
        for entry in entries {
            if event.is_immediate_propagation_stopped() {
                break;
            }
            // a previous listener may have removed this one
            if !self.is_registered(node, entry.id) {
                continue;
            }
            if entry.options.once {
                self.remove_event_listener(node, entry.id);
            }
            event.set_passive(entry.options.passive);
            (entry.callback)(event);
            event.set_passive(false);
        }
    }

    // ------------------------------------------------------------------
    // Mutation observers
    // ------------------------------------------------------------------

    /// Observe `target`. A node can only be observed once at a time.
    pub fn observe(
        &self,
        target: NodeId,
        options: MutationObserverInit,
        callback: MutationCallback,
    ) -> Result<(), DomError> {
        self.inner.observers.borrow_mut().observe(target, options, callback)
    }

    pub fn unobserve(&self, target: NodeId) -> bool {
        self.inner.observers.borrow_mut().unobserve(target)
    }

    pub fn is_observed(&self, target: NodeId) -> bool {
        self.inner.observers.borrow().is_observed(target)
    }

    /// Called once per batch of queued records; schedule
    /// [`Document::deliver_mutation_records`] from it.
    pub fn set_mutation_notifier(&self, notifier: Rc<dyn Fn()>) {
        *self.inner.mutation_notifier.borrow_mut() = Some(notifier);
    }

    fn notify_mutation(&self) {
        let notifier = self.inner.mutation_notifier.borrow().clone();
        if let Some(notifier) = notifier {
            notifier();
        }
    }

    /// Hand queued records to their observers. Returns the number of batches.
    pub fn deliver_mutation_records(&self) -> usize {
        let pending = self.inner.observers.borrow_mut().take_pending();
        let batches = pending.len();
        for (callback, records) in pending {
            callback(records);
        }
        batches
    }

    // ------------------------------------------------------------------
    // Custom elements
    // ------------------------------------------------------------------

    /// Define a custom element and upgrade connected candidates
    pub fn define(
        &self,
        name: &str,
        observed_attributes: Vec<String>,
        reactions: Weak<dyn ElementReactions>,
    ) -> Result<(), DomError> {
        self.inner
            .registry
            .borrow_mut()
            .define(name, observed_attributes, reactions)?;

        let reactions = {
            let tree = self.tree();
            tree.shadow_including_inclusive_descendants(NodeId::ROOT)
                .into_iter()
                .filter(|&id| {
                    tree.element(id).is_some_and(|e| {
                        e.local_name == name && e.custom_state == CustomState::Undefined
                    })
                })
                .flat_map(|id| [Reaction::Upgrade(id), Reaction::Connected(id)])
                .collect()
        };
        self.run_reactions(reactions);
        Ok(())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.inner.registry.borrow().is_defined(name)
    }

    /// Completes once `name` is defined
    pub fn when_defined(&self, name: &str) -> Promise {
        self.inner.registry.borrow_mut().when_defined(name)
    }

    /// Upgrade defined custom elements in the subtree of `node`
    pub fn upgrade(&self, node: NodeId) {
        let reactions = {
            let tree = self.tree();
            let registry = self.inner.registry.borrow();
            tree.shadow_including_inclusive_descendants(node)
                .into_iter()
                .filter(|&id| {
                    tree.element(id).is_some_and(|e| {
                        e.custom_state == CustomState::Undefined && registry.is_defined(&e.local_name)
                    })
                })
                .map(Reaction::Upgrade)
                .collect()
        };
        self.run_reactions(reactions);
    }

    /// Reactions sink of an upgraded custom element
    pub fn reactions_for(&self, node: NodeId) -> Option<Rc<dyn ElementReactions>> {
        let tree = self.tree();
        let element = tree.element(node)?;
        if element.custom_state != CustomState::Custom {
            return None;
        }
        self.inner.registry.borrow().get(&element.local_name)?.reactions()
    }

    fn sink_by_name(&self, node: NodeId) -> Option<Rc<dyn ElementReactions>> {
        let tree = self.tree();
        let name = tree.local_name(node)?;
        self.inner.registry.borrow().get(name)?.reactions()
    }

    fn run_reactions(&self, reactions: Vec<Reaction>) {
        for reaction in reactions {
            match reaction {
                Reaction::Upgrade(id) => {
                    let Some(sink) = self.sink_by_name(id) else { continue };
                    {
                        let mut tree = self.inner.tree.borrow_mut();
                        match tree.element_mut(id) {
                            Some(e) if e.custom_state != CustomState::Custom => {
                                e.custom_state = CustomState::Custom;
                            }
                            _ => continue,
                        }
                    }
                    sink.upgrade(id);
                }
                Reaction::Connected(id) => {
                    if let Some(sink) = self.reactions_for(id) {
                        sink.connected(id);
                    }
                }
                Reaction::Disconnected(id) => {
                    if let Some(sink) = self.reactions_for(id) {
                        sink.disconnected(id);
                    }
                }
                Reaction::AttributeChanged {
                    element,
                    name,
                    old,
                    new,
                } => {
                    if let Some(sink) = self.reactions_for(element) {
                        sink.attribute_changed(element, &name, old.as_deref(), new.as_deref());
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Global flags
    // ------------------------------------------------------------------

    /// Set a document wide flag. Returns true if it was not set before.
    pub fn set_global_flag(&self, key: &str) -> bool {
        self.inner.globals.borrow_mut().insert(key.to_string())
    }

    pub fn has_global_flag(&self, key: &str) -> bool {
        self.inner.globals.borrow().contains(key)
    }
}

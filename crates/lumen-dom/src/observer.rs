//! DOM Observers
//!
//! Mutation observers keyed by observed node. A node carries at most one
//! observer; records are queued and delivered in a later checkpoint.

use std::rc::Rc;

use crate::tree::DomTree;
use crate::{DomError, NodeId};

/// Mutation observer callback
pub type MutationCallback = Rc<dyn Fn(Vec<MutationRecord>)>;

/// Mutation observer options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub character_data_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

/// Mutation record
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

impl MutationRecord {
    pub(crate) fn child_list(
        target: NodeId,
        added_nodes: Vec<NodeId>,
        removed_nodes: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target,
            added_nodes,
            removed_nodes,
            previous_sibling,
            next_sibling,
            attribute_name: None,
            old_value: None,
        }
    }

    pub(crate) fn attribute(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }

    pub(crate) fn character_data(target: NodeId, old_value: String) -> Self {
        Self {
            mutation_type: MutationType::CharacterData,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: None,
            old_value: Some(old_value),
        }
    }
}

struct Registration {
    target: NodeId,
    options: MutationObserverInit,
    callback: MutationCallback,
    records: Vec<MutationRecord>,
}

impl Registration {
    fn wants(&self, tree: &DomTree, record: &MutationRecord) -> bool {
        let in_scope = record.target == self.target
            || (self.options.subtree && tree.is_inclusive_ancestor(self.target, record.target));
        if !in_scope {
            return false;
        }
        match record.mutation_type {
            MutationType::ChildList => self.options.child_list,
            MutationType::CharacterData => self.options.character_data,
            MutationType::Attributes => {
                self.options.attributes
                    && match (&self.options.attribute_filter, &record.attribute_name) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        _ => true,
                    }
            }
        }
    }

    fn accept(&mut self, record: &MutationRecord) {
        let mut record = record.clone();
        let keep_old = match record.mutation_type {
            MutationType::Attributes => self.options.attribute_old_value,
            MutationType::CharacterData => self.options.character_data_old_value,
            MutationType::ChildList => false,
        };
        if !keep_old {
            record.old_value = None;
        }
        self.records.push(record);
    }
}

/// Node to observer registry
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    registrations: Vec<Registration>,
    delivery_queued: bool,
}

impl ObserverRegistry {
    /// Register an observer for `target`; a second registration is an error
    pub fn observe(
        &mut self,
        target: NodeId,
        options: MutationObserverInit,
        callback: MutationCallback,
    ) -> Result<(), DomError> {
        if self.is_observed(target) {
            return Err(DomError::AlreadyObserved(target));
        }
        self.registrations.push(Registration {
            target,
            options,
            callback,
            records: Vec::new(),
        });
        Ok(())
    }

    /// Drop the observer of `target` together with its undelivered records
    pub fn unobserve(&mut self, target: NodeId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.target != target);
        before != self.registrations.len()
    }

    pub fn is_observed(&self, target: NodeId) -> bool {
        self.registrations.iter().any(|r| r.target == target)
    }

    /// Queue a record for every interested observer. Returns true when a
    /// delivery checkpoint needs to be scheduled.
    pub fn queue(&mut self, tree: &DomTree, record: &MutationRecord) -> bool {
        let mut queued = false;
        for registration in &mut self.registrations {
            if registration.wants(tree, record) {
                registration.accept(record);
                queued = true;
            }
        }
        if queued && !self.delivery_queued {
            self.delivery_queued = true;
            return true;
        }
        false
    }

    /// Take every non-empty record batch with its callback
    pub fn take_pending(&mut self) -> Vec<(MutationCallback, Vec<MutationRecord>)> {
        self.delivery_queued = false;
        self.registrations
            .iter_mut()
            .filter(|r| !r.records.is_empty())
            .map(|r| (r.callback.clone(), std::mem::take(&mut r.records)))
            .collect()
    }
}

//! Lumen Elements
//!
//! Reactive custom elements on top of [`lumen_dom`] and [`lumen_template`].
//! A component class declares typed properties, slots and events in its
//! metadata; the [`Runtime`] keeps each instance's validated state in sync
//! with its attributes, distributes light DOM children into slots, batches
//! invalidations into frame-aligned render tasks and routes native events to
//! the component that owns their target.
//!
//! ```ignore
//! let runtime = Runtime::new(&doc)?;
//! runtime.define(Rc::new(counter_class()))?;
//! let counter = runtime.create_element("my-counter")?;
//! doc.append_child(NodeId::ROOT, counter.host())?;
//! counter.set("count", 5)?;
//! runtime.animation_frame()?;
//! ```

mod class;
mod component;
mod config;
mod data_type;
mod event_router;
mod metadata;
mod runtime;
mod scheduler;
mod slots;
mod theming;

pub use class::{ElementClass, ElementClassBuilder, Hook, HookKind, NativeHandler, TemplateFn};
pub use component::{EVENT_PREFIX, ElementRef};
pub use config::{
    ALWAYS_FIRE_EVENTS, AnimationMode, CONFIG_ATTRIBUTE, Configuration, FrameMode, NoConflict,
    SchedulerConfig, URL_PARAM_PREFIX,
};
pub use data_type::{DataType, Enumeration, Integer};
pub use event_router::{EventRouter, MANAGED_EVENTS, ROUTER_FLAG, route_event};
pub use metadata::{
    ElementMetadata, EventDecl, ListenFor, MetadataDescriptor, PropertyDecl, PropertyType,
    SlotDecl, SlotType, camel_to_kebab, is_valid_property_name, kebab_to_camel,
};
pub use runtime::{
    COMPACT_SIZE_ATTRIBUTE, PROPERTY_CHANGE_EVENT, Runtime, RuntimeBuilder, STATE_FINALIZED_EVENT,
};
pub use scheduler::{RenderQueue, RenderScheduler, RenderTarget, SchedulerError};
pub use slots::{DEFAULT_SLOT, slot_name_of};
#[cfg(feature = "http")]
pub use theming::HttpFetcher;
pub use theming::{
    MemoryFetcher, ResourceFetcher, THEME_PROPERTIES_ATTRIBUTE, ThemeError, ThemeManager,
    inject_theme_properties,
};

use lumen_dom::{DomError, NodeId};
use lumen_template::TemplateError;

/// Component errors
#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("invalid component metadata: {0}")]
    Config(String),

    #[error("node {node:?} is not a valid {expected} for its slot")]
    SlotType { node: NodeId, expected: String },

    #[error("slot property `{0}` cannot be assigned")]
    SlotAssignment(String),

    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("node {0:?} is not a component of this runtime")]
    NotAComponent(NodeId),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Theme(#[from] ThemeError),

    #[error("invalid configuration: {0}")]
    Configuration(#[from] serde_json::Error),

    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),
}

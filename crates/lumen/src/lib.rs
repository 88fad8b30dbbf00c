//! Lumen
//!
//! Reactive web components for an in-process DOM.
//!
//! # Goals
//! - Declarative components with typed, validated state
//! - At most one render per component per frame
//! - Incremental DOM patching through cached templates
//!
//! # Example
//! ```rust,ignore
//! use lumen::prelude::*;
//!
//! lumen::init_logging();
//! let doc = Document::new();
//! let runtime = lumen::boot(&doc)?;
//! runtime.define(
//!     ElementClass::builder("my-greeting")
//!         .metadata(MetadataDescriptor::new().property("name", PropertyDecl::string()))
//!         .template(|el| html!("<p>Hello ${}!</p>", el.get("name")))
//!         .build(),
//! )?;
//! ```

use std::rc::Rc;

use tracing_subscriber::EnvFilter;

pub use lumen_element::{
    Configuration, ElementClass, ElementError, ElementRef, Runtime, RuntimeBuilder, SchedulerConfig,
};

// Re-export sub-crates for advanced usage
pub use lumen_dom as dom;
pub use lumen_element as element;
pub use lumen_html as html;
pub use lumen_template as template;

/// Lumen version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable read by [`init_logging`]
pub const LOG_ENV: &str = "LUMEN_LOG";

/// Everything a component author needs
pub mod prelude {
    pub use lumen_dom::{Document, Event, EventInit, NodeId, Value};
    pub use lumen_element::{
        Configuration, ElementClass, ElementError, ElementRef, HookKind, Integer, ListenFor,
        MetadataDescriptor, PropertyDecl, Runtime, SchedulerConfig, SlotDecl,
    };
    pub use lumen_template::{EventHandler, RenderOptions, TemplateResult, html, if_defined, svg};
}

/// Install a `tracing` fmt subscriber filtered by `LUMEN_LOG` (default
/// `info`). Returns false if a global subscriber was already set.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

/// Runtime configured from `doc` with its theme applied
pub fn boot(doc: &lumen_dom::Document) -> Result<Rc<Runtime>, ElementError> {
    let runtime = Runtime::new(doc)?;
    runtime.run(runtime.boot());
    tracing::info!(version = VERSION, theme = %runtime.theming().current_theme(), "Lumen started");
    Ok(runtime)
}

//! Lumen Templates
//!
//! Templates are written once per call site with the [`html!`] and [`svg!`]
//! macros. Each distinct literal shape is parsed a single time into an inert
//! skeleton plus an ordered list of binding descriptors; rendering clones the
//! skeleton into the document and wires one [`Part`] per binding. Later
//! renders of the same shape only push new values through the existing parts,
//! and a part touches the DOM only when its value actually changed.
//!
//! ```ignore
//! let result = html!("<p class=\"${}\">${}</p>", "greeting", name);
//! renderer.render(result, container, &RenderOptions::default())?;
//! ```

mod cache;
mod instance;
mod node_part;
mod parts;
mod processor;
mod render;
mod result;
mod template;
mod value;

pub use cache::TemplateCache;
pub use instance::TemplateInstance;
pub use node_part::NodePart;
pub use parts::{
    AttributeCommitter, AttributePart, BooleanAttributePart, EventPart, Part, PropertyCommitter,
};
pub use processor::{DefaultTemplateProcessor, TemplateProcessor};
pub use render::{RenderContext, RenderOptions, Renderer};
pub use result::{TemplateKind, TemplateResult};
pub use template::{Template, TemplatePart};
pub use value::{
    Directive, DirectiveContext, EventHandler, HandleEvent, PartKind, PartValue, if_defined,
};

use lumen_dom::DomError;
use lumen_html::HtmlError;

/// Template errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("boolean attribute `{0}` can only contain a single expression")]
    BooleanAttribute(String),

    #[error("bound attribute `{0}` is missing from the parsed template")]
    MissingAttribute(String),

    #[error("template skeleton does not match its binding descriptors")]
    MalformedTemplate,

    #[error("node part is not attached to a parent")]
    DetachedPart,

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Html(#[from] HtmlError),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// Split a macro template literal at its `${}` holes
#[doc(hidden)]
pub fn split_template(literal: &'static str) -> Box<[&'static str]> {
    literal.split("${}").collect()
}

/// Build an HTML [`TemplateResult`]. Holes are written as `${}` and filled by
/// the trailing arguments in order. Each invocation site owns a stable
/// literal array, so repeated renders reuse the parsed template.
#[macro_export]
macro_rules! html {
    ($template:literal $(, $value:expr)* $(,)?) => {{
        static STRINGS: ::std::sync::OnceLock<::std::boxed::Box<[&'static str]>> =
            ::std::sync::OnceLock::new();
        let strings: &'static [&'static str] =
            STRINGS.get_or_init(|| $crate::split_template($template));
        $crate::TemplateResult::new(
            strings,
            ::std::vec![$($crate::PartValue::from($value)),*],
            $crate::TemplateKind::Html,
        )
    }};
}

/// Build an SVG [`TemplateResult`]; content is parsed in the SVG namespace
#[macro_export]
macro_rules! svg {
    ($template:literal $(, $value:expr)* $(,)?) => {{
        static STRINGS: ::std::sync::OnceLock<::std::boxed::Box<[&'static str]>> =
            ::std::sync::OnceLock::new();
        let strings: &'static [&'static str] =
            STRINGS.get_or_init(|| $crate::split_template($template));
        $crate::TemplateResult::new(
            strings,
            ::std::vec![$($crate::PartValue::from($value)),*],
            $crate::TemplateKind::Svg,
        )
    }};
}

//! Runtime configuration
//!
//! Settings come from built-in defaults, then a JSON document embedded in
//! the page (`<script data-lumen-config>`), then `lumen-*` URL query
//! parameters.

use std::time::Duration;

use lumen_dom::Document;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::metadata::kebab_to_camel;

/// Attribute marking the configuration script
pub const CONFIG_ATTRIBUTE: &str = "data-lumen-config";

/// Query parameter prefix
pub const URL_PARAM_PREFIX: &str = "lumen-";

/// Events that keep their unprefixed twin even under no-conflict mode
pub const ALWAYS_FIRE_EVENTS: &[&str] = &["value-changed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationMode {
    #[default]
    Full,
    Basic,
    Minimal,
    None,
}

/// Suppression of unprefixed event twins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoConflict {
    /// `true` suppresses every unprefixed event
    Flag(bool),
    /// Suppress only the listed events
    Events { events: Vec<String> },
}

impl Default for NoConflict {
    fn default() -> Self {
        NoConflict::Flag(false)
    }
}

impl NoConflict {
    /// Whether only the prefixed event should be fired for `event`
    pub fn suppresses(&self, event: &str) -> bool {
        if ALWAYS_FIRE_EVENTS.contains(&event) {
            return false;
        }
        match self {
            NoConflict::Flag(enabled) => *enabled,
            NoConflict::Events { events } => events.iter().any(|e| e == event),
        }
    }
}

/// Page level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub animation_mode: AnimationMode,
    pub theme: String,
    pub rtl: Option<bool>,
    pub language: Option<String>,
    pub compact_size: bool,
    pub calendar_type: Option<String>,
    pub no_conflict: NoConflict,
    pub format_settings: serde_json::Map<String, serde_json::Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            animation_mode: AnimationMode::Full,
            theme: "lumen_default".to_string(),
            rtl: None,
            language: None,
            compact_size: false,
            calendar_type: None,
            no_conflict: NoConflict::default(),
            format_settings: serde_json::Map::new(),
        }
    }
}

impl Configuration {
    /// Parse a JSON configuration; missing keys keep their defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Configuration from the first `data-lumen-config` script of `doc`.
    /// Malformed JSON is reported and ignored.
    pub fn from_document(doc: &Document) -> Self {
        let Some(script) = doc.find_by_attribute(doc.root(), CONFIG_ATTRIBUTE).into_iter().next() else {
            return Self::default();
        };
        match Self::from_json(&doc.text_content(script)) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "Incorrect {} format, use JSON", CONFIG_ATTRIBUTE);
                Self::default()
            }
        }
    }

    /// Apply `lumen-*` query parameters of `url`. `true` and `false` become
    /// booleans; parameters that do not fit a setting are ignored.
    pub fn apply_url_params(&mut self, url: &str) -> Result<(), url::ParseError> {
        let url = Url::parse(url)?;
        let mut overrides = serde_json::Map::new();
        for (key, value) in url.query_pairs() {
            let Some(param) = key.strip_prefix(URL_PARAM_PREFIX) else {
                continue;
            };
            let value = match value.as_ref() {
                "true" => serde_json::Value::Bool(true),
                "false" => serde_json::Value::Bool(false),
                other => serde_json::Value::String(other.to_string()),
            };
            overrides.insert(kebab_to_camel(param), value);
        }
        self.merge(overrides);
        Ok(())
    }

    fn merge(&mut self, overrides: serde_json::Map<String, serde_json::Value>) {
        if overrides.is_empty() {
            return;
        }
        let merged = serde_json::to_value(&*self).and_then(|mut current| {
            if let Some(fields) = current.as_object_mut() {
                fields.extend(overrides);
            }
            serde_json::from_value(current)
        });
        match merged {
            Ok(config) => *self = config,
            Err(err) => tracing::warn!(%err, "Ignoring configuration parameters"),
        }
    }
}

/// Frame source of the render scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Frames run when the host calls `Runtime::animation_frame`
    Manual,
    /// Frames run on a timer of the runtime executor
    Timer(Duration),
}

/// Render scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Renders of one component allowed within a task before it fails
    pub max_rerenders: usize,
    /// Wait after a drained task before the DOM counts as updated
    pub quiescence_delay: Duration,
    /// Bound for undefined custom elements in `when_shadow_dom_ready`
    pub shadow_dom_ready_timeout: Duration,
    /// Bound for undefined slotted children
    pub upgrade_timeout: Duration,
    pub frame_mode: FrameMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_rerenders: 10,
            quiescence_delay: Duration::from_millis(200),
            shadow_dom_ready_timeout: Duration::from_secs(5),
            upgrade_timeout: Duration::from_secs(1),
            frame_mode: FrameMode::Timer(Duration::from_millis(16)),
        }
    }
}

impl SchedulerConfig {
    /// Defaults with host driven frames
    pub fn manual() -> Self {
        Self {
            frame_mode: FrameMode::Manual,
            ..Self::default()
        }
    }
}

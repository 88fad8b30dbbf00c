//! Theming
//!
//! Theme properties are CSS custom property blocks registered per package and
//! theme, either inline or as the URL of a JSON resource (`{"_": "<css>"}`).
//! Applying a theme loads the properties of every registered package, writes
//! them into one `<style>` element per package in the document head and tells
//! interested components to re-render.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared, join_all};
use indexmap::IndexSet;
use lumen_dom::{Document, DomError};

use crate::class::ElementClass;

/// Marks every theme properties `<style>` element
pub const THEME_PROPERTIES_ATTRIBUTE: &str = "data-lumen-theme-properties";

/// Theme loading errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ThemeError {
    #[error("no theme properties registered for {package} / {theme}")]
    NotRegistered { package: String, theme: String },

    #[error("no resource fetcher configured to load {0}")]
    NoFetcher(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("malformed theme resource {url}: {message}")]
    Malformed { url: String, message: String },
}

/// Loads text resources
pub trait ResourceFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<String>>;
}

/// Fetcher serving a fixed set of resources
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    resources: HashMap<String, String>,
    requests: Cell<usize>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.resources.insert(url.to_string(), body.to_string());
        self
    }

    /// Number of fetches performed
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<String>> {
        self.requests.set(self.requests.get() + 1);
        let result = self
            .resources
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("resource not found: {url}"));
        futures::future::ready(result).boxed_local()
    }
}

/// Fetcher backed by a blocking HTTP client on the blocking thread pool
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("lumen/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> LocalBoxFuture<'static, anyhow::Result<String>> {
        let client = self.client.clone();
        let url = url.to_string();
        async move {
            smol::unblock(move || {
                tracing::debug!(%url, "Fetching theme resource");
                let response = client.get(&url).send()?.error_for_status()?;
                Ok(response.text()?)
            })
            .await
        }
        .boxed_local()
    }
}

#[derive(Debug, Clone)]
enum ThemeSource {
    Inline(Rc<str>),
    Url(String),
}

type ThemeFetch = Shared<LocalBoxFuture<'static, Result<Rc<str>, ThemeError>>>;
type ThemeChangeCallback = Rc<dyn Fn(&str)>;

pub struct ThemeManager {
    fetcher: Option<Rc<dyn ResourceFetcher>>,
    sources: RefCell<HashMap<(String, String), ThemeSource>>,
    in_flight: RefCell<HashMap<String, ThemeFetch>>,
    packages: RefCell<IndexSet<String>>,
    custom_css: RefCell<HashMap<String, Vec<String>>>,
    theme: RefCell<String>,
    callbacks: RefCell<Vec<ThemeChangeCallback>>,
}

impl ThemeManager {
    pub fn new(theme: &str, fetcher: Option<Rc<dyn ResourceFetcher>>) -> Self {
        Self {
            fetcher,
            sources: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashMap::new()),
            packages: RefCell::new(IndexSet::new()),
            custom_css: RefCell::new(HashMap::new()),
            theme: RefCell::new(theme.to_string()),
            callbacks: RefCell::new(Vec::new()),
        }
    }

    pub fn current_theme(&self) -> String {
        self.theme.borrow().clone()
    }

    /// Register the properties of `package` for `theme`. `style` is CSS text
    /// (containing `:root`), a JSON object with the CSS under `_`, or the URL
    /// of such a JSON resource.
    pub fn register_theme_properties(&self, package: &str, theme: &str, style: &str) {
        let source = match inline_json(style) {
            Some(css) => ThemeSource::Inline(css),
            None if style.contains(":root") => ThemeSource::Inline(Rc::from(style)),
            None => ThemeSource::Url(style.to_string()),
        };
        self.sources
            .borrow_mut()
            .insert((package.to_string(), theme.to_string()), source);
        self.packages.borrow_mut().insert(package.to_string());
    }

    pub fn registered_packages(&self) -> Vec<String> {
        self.packages.borrow().iter().cloned().collect()
    }

    /// CSS text of `package` for `theme`, fetched on first use
    pub async fn theme_properties(&self, package: &str, theme: &str) -> Result<Rc<str>, ThemeError> {
        let key = (package.to_string(), theme.to_string());
        let source = self.sources.borrow().get(&key).cloned();
        let url = match source {
            Some(ThemeSource::Inline(css)) => return Ok(css),
            Some(ThemeSource::Url(url)) => url,
            None => {
                return Err(ThemeError::NotRegistered {
                    package: key.0,
                    theme: key.1,
                });
            }
        };
        let body = self.fetch_once(&url).await?;
        let css = inline_json(&body).ok_or_else(|| ThemeError::Malformed {
            url: url.clone(),
            message: "expected a JSON object with a `_` entry".to_string(),
        })?;
        self.sources
            .borrow_mut()
            .insert(key, ThemeSource::Inline(css.clone()));
        Ok(css)
    }

    /// Concurrent requests for one URL share a single fetch; failed fetches
    /// are forgotten so a later request tries again.
    async fn fetch_once(&self, url: &str) -> Result<Rc<str>, ThemeError> {
        let pending = {
            let mut in_flight = self.in_flight.borrow_mut();
            match in_flight.get(url) {
                Some(pending) => pending.clone(),
                None => {
                    let fetcher = self
                        .fetcher
                        .clone()
                        .ok_or_else(|| ThemeError::NoFetcher(url.to_string()))?;
                    let target = url.to_string();
                    let request: LocalBoxFuture<'static, Result<Rc<str>, ThemeError>> = async move {
                        fetcher
                            .fetch(&target)
                            .await
                            .map(Rc::from)
                            .map_err(|err| ThemeError::Fetch {
                                url: target.clone(),
                                message: format!("{err:#}"),
                            })
                    }
                    .boxed_local();
                    let pending = request.shared();
                    in_flight.insert(url.to_string(), pending.clone());
                    pending
                }
            }
        };
        let result = pending.await;
        if result.is_err() {
            self.in_flight.borrow_mut().remove(url);
        }
        result
    }

    /// Load and inject the properties of every registered package, then run
    /// the theme change callbacks. Packages that fail to load are skipped.
    pub async fn apply_theme(&self, doc: &Document, theme: &str) {
        let packages = self.registered_packages();
        let loaded = join_all(packages.iter().map(|package| self.theme_properties(package, theme))).await;
        for (package, css) in packages.iter().zip(loaded) {
            match css {
                Ok(css) => {
                    if let Err(err) = inject_theme_properties(doc, &css, package) {
                        tracing::warn!(%package, %err, "Could not inject theme properties");
                    }
                }
                Err(err) => tracing::warn!(%package, %theme, %err, "Theme properties unavailable"),
            }
        }

        *self.theme.borrow_mut() = theme.to_string();
        let callbacks = self.callbacks.borrow().clone();
        for callback in callbacks {
            callback(theme);
        }
    }

    pub fn attach_theme_change(&self, callback: impl Fn(&str) + 'static) {
        self.callbacks.borrow_mut().push(Rc::new(callback));
    }

    /// Extra CSS appended to the styles of every `tag` component
    pub fn add_custom_css(&self, tag: &str, css: &str) {
        self.custom_css
            .borrow_mut()
            .entry(tag.to_ascii_lowercase())
            .or_default()
            .push(css.to_string());
    }

    pub fn custom_css(&self, tag: &str) -> String {
        self.custom_css
            .borrow()
            .get(tag)
            .map(|parts| parts.concat())
            .unwrap_or_default()
    }

    /// Class styles followed by the custom CSS of its tag
    pub fn effective_style(&self, class: &ElementClass) -> String {
        format!("{} {}", class.styles().join(" "), self.custom_css(class.tag()))
    }
}

fn inline_json(text: &str) -> Option<Rc<str>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value.get("_")?.as_str().map(Rc::from)
}

/// Create or update the theme properties `<style>` of `package`
pub fn inject_theme_properties(doc: &Document, css: &str, package: &str) -> Result<(), DomError> {
    let identifier = format!(
        "{}-{}",
        THEME_PROPERTIES_ATTRIBUTE,
        package.replace(['@', '/'], "-")
    )
    .to_ascii_lowercase();
    let head = doc.head();
    if let Some(style) = doc.find_by_attribute(head, &identifier).into_iter().next() {
        return doc.set_text_content(style, css);
    }
    let style = doc.create_element("style");
    doc.set_attribute(style, THEME_PROPERTIES_ATTRIBUTE, "")?;
    doc.set_attribute(style, &identifier, "")?;
    doc.set_text_content(style, css)?;
    doc.append_child(head, style)
}

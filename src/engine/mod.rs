//! A single search engine described in OpenSearch format.
//!
//! [`SearchEngine`] holds the metadata of one search provider (name,
//! description, image, tags) together with its two URL templates: the search
//! template, pointing at result pages, and the suggestions template, used to
//! request contextual query suggestions. Both are turned into concrete URLs
//! with [`search_url`](SearchEngine::search_url) and
//! [`suggestions_url`](SearchEngine::suggestions_url).
//!
//! Search requests are performed outside the engine through an injected
//! [`SearchRequestDelegate`]; suggestion requests are executed by the engine
//! itself over an injected [`reqwest::Client`], with results delivered as
//! [`EngineEvent`]s on the channel handed out by
//! [`subscribe`](SearchEngine::subscribe).
//!
//! Engines are usually populated by [`crate::reader::read`] rather than
//! built by hand.

mod suggestions;
pub mod template;
mod types;

pub use template::TemplateContext;
pub use types::{
    EngineEvent, Method, Parameter, Parameters, SEARCH_URL_TYPE, SUGGESTIONS_URL_TYPE,
    SearchRequest, SearchRequestDelegate, UrlTemplate,
};

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

/// In-memory record of a search provider's identity and URL templates.
///
/// Default-constructed engines are empty and invalid; they become usable once
/// at least a name and a search URL template are set. See
/// [`is_valid`](Self::is_valid).
pub struct SearchEngine {
    name: String,
    description: String,
    image_url: String,
    /// Encoded image bytes, lazily fetched from `image_url`. Shared with the
    /// background fetch task.
    image: Arc<Mutex<Vec<u8>>>,
    tags: Vec<String>,
    search: UrlTemplate,
    suggestions: UrlTemplate,
    context: TemplateContext,
    http: Option<reqwest::Client>,
    delegate: Option<Box<dyn SearchRequestDelegate>>,
    events: Option<UnboundedSender<EngineEvent>>,
    suggestions_task: Option<JoinHandle<()>>,
    image_task: Mutex<Option<JoinHandle<()>>>,
    /// Bumped whenever a suggestion request starts or is superseded; stale
    /// tasks check it before delivering.
    generation: Arc<AtomicU64>,
}

impl SearchEngine {
    /// Creates an empty engine with both templates unset and GET methods.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            image_url: String::new(),
            image: Arc::new(Mutex::new(Vec::new())),
            tags: Vec::new(),
            search: UrlTemplate::default(),
            suggestions: UrlTemplate::default(),
            context: TemplateContext::default(),
            http: None,
            delegate: None,
            events: None,
            suggestions_task: None,
            image_task: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Free-form categorization keywords, insertion order preserved.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    /// True iff the engine carries the minimum usable data: a non-empty name
    /// and a non-empty search URL template.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.search.template.is_empty()
    }

    // -------------------------------------------------------------------------
    // URL templates
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn search_url_template(&self) -> &str {
        &self.search.template
    }

    pub fn set_search_url_template(&mut self, template: impl Into<String>) {
        self.search.template = template.into();
    }

    #[must_use]
    pub fn suggestions_url_template(&self) -> &str {
        &self.suggestions.template
    }

    pub fn set_suggestions_url_template(&mut self, template: impl Into<String>) {
        self.suggestions.template = template.into();
    }

    #[must_use]
    pub fn search_parameters(&self) -> &[Parameter] {
        &self.search.parameters
    }

    pub fn set_search_parameters(&mut self, parameters: Parameters) {
        self.search.parameters = parameters;
    }

    #[must_use]
    pub fn suggestions_parameters(&self) -> &[Parameter] {
        &self.suggestions.parameters
    }

    pub fn set_suggestions_parameters(&mut self, parameters: Parameters) {
        self.suggestions.parameters = parameters;
    }

    #[must_use]
    pub fn search_method(&self) -> Method {
        self.search.method
    }

    /// Sets the search request method. Accepts only `get` and `post`,
    /// case-insensitively; any other string leaves the current value
    /// untouched, without surfacing an error.
    pub fn set_search_method(&mut self, method: &str) {
        if let Some(method) = Method::parse(method) {
            self.search.method = method;
        }
    }

    #[must_use]
    pub fn suggestions_method(&self) -> Method {
        self.suggestions.method
    }

    /// Same acceptance rules as [`set_search_method`](Self::set_search_method).
    pub fn set_suggestions_method(&mut self, method: &str) {
        if let Some(method) = Method::parse(method) {
            self.suggestions.method = method;
        }
    }

    /// Whether the engine can serve contextual suggestions, i.e. whether a
    /// suggestions URL template is present.
    #[must_use]
    pub fn provides_suggestions(&self) -> bool {
        !self.suggestions.template.is_empty()
    }

    /// Builds the search-results URL for `term`, or `None` when no search
    /// template is set (or the expanded template is not a parseable URL).
    ///
    /// For GET templates the stored parameters are appended as query pairs,
    /// in order, with each value expanded against the same term. POST
    /// parameters travel in the request body instead and never reach the URL.
    #[must_use]
    pub fn search_url(&self, term: &str) -> Option<Url> {
        self.build_url(term, &self.search)
    }

    /// Builds the suggestions URL for `term`; same rules as
    /// [`search_url`](Self::search_url).
    #[must_use]
    pub fn suggestions_url(&self, term: &str) -> Option<Url> {
        self.build_url(term, &self.suggestions)
    }

    fn build_url(&self, term: &str, record: &UrlTemplate) -> Option<Url> {
        if record.template.is_empty() {
            return None;
        }

        let expanded = template::expand_for_url(term, &record.template, &self.context);
        let mut url = match Url::parse(&expanded) {
            Ok(url) => url,
            Err(error) => {
                debug!(%error, template = %record.template, "expanded template is not a valid URL");
                return None;
            }
        };

        if record.method == Method::Get && !record.parameters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &record.parameters {
                pairs.append_pair(key, &template::expand(term, value, &self.context));
            }
            drop(pairs);
        }

        Some(url)
    }

    // -------------------------------------------------------------------------
    // Image
    // -------------------------------------------------------------------------

    /// Remote URL or data URI of the engine's image.
    #[must_use]
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn set_image_url(&mut self, image_url: impl Into<String>) {
        self.image_url = image_url.into();
    }

    /// Current image bytes. Empty until fetched; the first access with an
    /// HTTP client attached fires a background fetch whose completion is
    /// announced with [`EngineEvent::ImageChanged`].
    #[must_use]
    pub fn image(&self) -> Vec<u8> {
        let current = self.image.lock().clone();
        if current.is_empty() {
            self.request_image();
        }
        current
    }

    /// Sets the image bytes explicitly. When no image URL is present, a
    /// `data:image/png;base64,…` URI is synthesized from the bytes and stored
    /// as the image URL.
    pub fn set_image(&mut self, data: Vec<u8>) {
        if self.image_url.is_empty() && !data.is_empty() {
            self.image_url = format!("data:image/png;base64,{}", BASE64.encode(&data));
        }
        *self.image.lock() = data;
        self.emit(EngineEvent::ImageChanged);
    }

    /// Starts fetching the image from `image_url`. No-op without an HTTP
    /// client, without a remote image URL, or outside an async runtime.
    pub fn request_image(&self) {
        let Some(client) = self.http.clone() else {
            return;
        };
        if self.image_url.is_empty() || self.image_url.starts_with("data:") {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            return;
        };

        // One fetch at a time; repeated accesses while it runs are no-ops.
        let mut image_task = self.image_task.lock();
        if image_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let url = self.image_url.clone();
        let image = Arc::clone(&self.image);
        let events = self.events.clone();
        *image_task = Some(handle.spawn(async move {
            let response = match client.get(&url).send().await {
                Ok(response) => response,
                Err(error) => {
                    debug!(%error, %url, "image request failed");
                    return;
                }
            };
            let bytes = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(error) => {
                    debug!(%error, %url, "could not read image response");
                    return;
                }
            };
            if bytes.is_empty() {
                return;
            }
            *image.lock() = bytes.to_vec();
            if let Some(events) = &events {
                let _ = events.send(EngineEvent::ImageChanged);
            }
        }));
    }

    // -------------------------------------------------------------------------
    // Collaborators
    // -------------------------------------------------------------------------

    /// HTTP transport used for suggestion and image requests. Without one,
    /// both stay disabled.
    #[must_use]
    pub fn http_client(&self) -> Option<&reqwest::Client> {
        self.http.as_ref()
    }

    pub fn set_http_client(&mut self, client: reqwest::Client) {
        self.http = Some(client);
    }

    /// Installs the collaborator that performs search requests built by
    /// [`request_search_results`](Self::request_search_results).
    pub fn set_delegate(&mut self, delegate: Box<dyn SearchRequestDelegate>) {
        self.delegate = Some(delegate);
    }

    #[must_use]
    pub fn template_context(&self) -> &TemplateContext {
        &self.context
    }

    pub fn set_template_context(&mut self, context: TemplateContext) {
        self.context = context;
    }

    /// Hands out a receiver for the engine's notifications. Each call
    /// replaces the previous subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<EngineEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn event_sender(&self) -> Option<UnboundedSender<EngineEvent>> {
        self.events.clone()
    }

    // -------------------------------------------------------------------------
    // Search dispatch
    // -------------------------------------------------------------------------

    /// Builds a search request for `term` and hands it to the installed
    /// delegate. No-op when the term is empty or no delegate is attached.
    pub fn request_search_results(&self, term: &str) {
        let Some(delegate) = &self.delegate else {
            return;
        };
        if term.is_empty() {
            return;
        }
        let Some(url) = self.search_url(term) else {
            return;
        };

        let body = match self.search.method {
            Method::Post => self.search.form_body().into_bytes(),
            Method::Get => Vec::new(),
        };

        delegate.perform_search_request(SearchRequest {
            url,
            method: self.search.method,
            body,
        });
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        // In-flight requests must not outlive their engine.
        if let Some(task) = self.suggestions_task.take() {
            task.abort();
        }
        if let Some(task) = self.image_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Structural equality over name, description, image URL and both template
/// records' templates and parameters. Methods and tags are excluded; this is
/// the round-trip comparison, not full state identity.
impl PartialEq for SearchEngine {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.image_url == other.image_url
            && self.search.template == other.search.template
            && self.suggestions.template == other.suggestions.template
            && self.search.parameters == other.search.parameters
            && self.suggestions.parameters == other.suggestions.parameters
    }
}

/// Lexicographic by name, for display sorting only.
impl PartialOrd for SearchEngine {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.name.cmp(&other.name))
    }
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("image_url", &self.image_url)
            .field("tags", &self.tags)
            .field("search", &self.search)
            .field("suggestions", &self.suggestions)
            .finish_non_exhaustive()
    }
}

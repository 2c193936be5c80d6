//! Search engines described in OpenSearch format.
//!
//! The crate models a search provider's description document
//! (<http://www.opensearch.org/>): its metadata and URL templates, the
//! expansion that turns a user search term into concrete request URLs, and
//! the asynchronous flow that fetches contextual query suggestions.
//!
//! - [`reader::read`] parses a description document into a [`SearchEngine`].
//! - [`SearchEngine::search_url`] / [`SearchEngine::suggestions_url`] build
//!   request URLs from the templates.
//! - [`SearchEngine::request_suggestions`] fetches and decodes suggestions,
//!   delivered as [`EngineEvent`]s.
//! - [`SearchEngine::request_search_results`] hands a built request to an
//!   injected [`SearchRequestDelegate`].

pub mod engine;
pub mod reader;

pub use engine::{
    EngineEvent, Method, Parameter, Parameters, SEARCH_URL_TYPE, SUGGESTIONS_URL_TYPE,
    SearchEngine, SearchRequest, SearchRequestDelegate, TemplateContext, UrlTemplate,
};
pub use reader::{OPENSEARCH_NAMESPACE, ParsedDescription, ReaderError};

//! Data structures shared by the descriptor, the suggestion client and the
//! search dispatcher.

use url::Url;

// =============================================================================
// Constants
// =============================================================================

/// MIME type of a search-results URL template in a description document.
pub const SEARCH_URL_TYPE: &str = "text/html";

/// MIME type of a suggestions URL template in a description document.
pub const SUGGESTIONS_URL_TYPE: &str = "application/x-suggestions+json";

// =============================================================================
// Data Structures
// =============================================================================

/// One `name`/`value` pair attached to a URL template.
pub type Parameter = (String, String);

/// Ordered parameter list of a URL template. Insertion order determines
/// query-string order.
pub type Parameters = Vec<Parameter>;

/// HTTP request method of a URL template.
///
/// Only GET and POST are meaningful in OpenSearch description documents;
/// anything else is rejected at the setter level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    /// Parses a method string case-insensitively. Returns `None` for anything
    /// other than `get` or `post`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "get" => Some(Method::Get),
            "post" => Some(Method::Post),
            _ => None,
        }
    }
}

/// One of the two URL records of a descriptor: a placeholder-bearing
/// template, its ordered parameter list and the request method.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlTemplate {
    pub template: String,
    pub parameters: Parameters,
    pub method: Method,
}

impl UrlTemplate {
    /// Serializes the parameters as raw `key=value` pairs joined with `&`.
    ///
    /// Used as the request body for POST templates; values are sent as
    /// written in the document, without template expansion.
    #[must_use]
    pub fn form_body(&self) -> String {
        self.parameters
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A fully built search request, handed off to a [`SearchRequestDelegate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub url: Url,
    pub method: Method,
    /// Form-encoded parameter pairs for POST requests, empty for GET.
    pub body: Vec<u8>,
}

/// Asynchronous notifications emitted by a `SearchEngine`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A suggestion request completed with a (possibly empty) list of
    /// alternative query strings.
    Suggestions(Vec<String>),
    /// The engine's image bytes changed.
    ImageChanged,
}

/// Collaborator that actually performs (or displays) a search request.
///
/// The engine only builds the request; executing it is entirely the
/// delegate's responsibility.
pub trait SearchRequestDelegate: Send + Sync {
    fn perform_search_request(&self, request: SearchRequest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(Method::parse("GET"), Some(Method::Get));
        assert_eq!(Method::parse("Post"), Some(Method::Post));
        assert_eq!(Method::parse("put"), None);
        assert_eq!(Method::parse(""), None);
    }

    #[test]
    fn form_body_preserves_order_and_raw_values() {
        let record = UrlTemplate {
            template: String::from("http://example.com/"),
            parameters: vec![
                (String::from("q"), String::from("{searchTerms}")),
                (String::from("b"), String::from("foo")),
            ],
            method: Method::Post,
        };
        assert_eq!(record.form_body(), "q={searchTerms}&b=foo");
    }
}

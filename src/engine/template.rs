//! OpenSearch URL template expansion.
//!
//! Templates carry `{placeholder}` tokens that are substituted with
//! request-time values, per the OpenSearch 1.1 URL template syntax:
//! <http://www.opensearch.org/Specifications/OpenSearch/1.1#OpenSearch_URL_template_syntax>

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

/// Matches the `{source}` placeholder family: an optional prefix ending in
/// `:`, the literal `source`, an optional `?`, wrapped in braces. Covers
/// `{source}`, `{source?}` and vendor-prefixed forms like `{google:source}`.
static SOURCE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^}]*:)?source\??\}").expect("source placeholder pattern"));

/// Process-wide values the expander substitutes into templates: the host
/// application's identifying name and the active language tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    /// Substituted for the `{source}` placeholder family.
    pub application_name: String,
    /// RFC 3066 style language tag (`xx-YY`), substituted for `{language}`.
    pub language: String,
}

impl TemplateContext {
    pub fn new(application_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            language: language.into(),
        }
    }
}

impl Default for TemplateContext {
    /// Empty application name, language resolved from the process
    /// environment (`LC_ALL`, then `LANG`), falling back to `en-US`.
    fn default() -> Self {
        Self {
            application_name: String::new(),
            language: system_language(),
        }
    }
}

/// Expands `template` for `term`, inserting the term verbatim.
///
/// Placeholders are substituted in a fixed order, each applied globally
/// before the next: `{count}` → "20", `{startIndex}` → "0", `{startPage}` →
/// "0", `{language}`, `{inputEncoding}` → "UTF-8", `{outputEncoding}` →
/// "UTF-8", the `{source}` family, and finally `{searchTerms}`. Unknown
/// placeholders pass through untouched, so unrecognized optional parameters
/// of future extensions survive expansion.
#[must_use]
pub fn expand(term: &str, template: &str, context: &TemplateContext) -> String {
    let mut result = template.replace("{count}", "20");
    result = result.replace("{startIndex}", "0");
    result = result.replace("{startPage}", "0");
    result = result.replace("{language}", &context.language);
    result = result.replace("{inputEncoding}", "UTF-8");
    result = result.replace("{outputEncoding}", "UTF-8");
    result = SOURCE_PLACEHOLDER
        .replace_all(&result, NoExpand(&context.application_name))
        .into_owned();
    result.replace("{searchTerms}", term)
}

/// Expands `template` for a URL call site: the term is percent-encoded
/// before substitution so the result can be parsed as a URL.
#[must_use]
pub fn expand_for_url(term: &str, template: &str, context: &TemplateContext) -> String {
    expand(&urlencoding::encode(term), template, context)
}

/// Reads the process locale and converts it to an `xx-YY` tag (encoding
/// suffix stripped, underscore replaced with a hyphen).
fn system_language() -> String {
    for key in ["LC_ALL", "LANG"] {
        if let Ok(raw) = std::env::var(key) {
            let tag = raw.split(['.', '@']).next().unwrap_or_default().trim();
            if !tag.is_empty() && tag != "C" && tag != "POSIX" {
                return tag.replace('_', "-");
            }
        }
    }
    String::from("en-US")
}

//! Contextual suggestion requests.
//!
//! Drives the single in-flight suggestion request of a [`SearchEngine`]:
//! build the request per the template's method, send it over the injected
//! HTTP client, shape-check and decode the response, and deliver the result
//! as an [`EngineEvent::Suggestions`] notification. Malformed responses are
//! dropped silently; they never surface as errors.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use super::SearchEngine;
use super::types::{EngineEvent, Method};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

impl SearchEngine {
    /// Requests contextual suggestions for `term`.
    ///
    /// No-op when the term is empty, the engine has no suggestions template,
    /// no HTTP client is attached, or no async runtime is running. At most
    /// one request is in flight per engine: a still-outstanding request is
    /// aborted and detached before the new one starts, so a superseded
    /// request never delivers a notification.
    ///
    /// On success the decoded suggestion list (possibly empty) arrives as
    /// [`EngineEvent::Suggestions`] on the channel from
    /// [`subscribe`](Self::subscribe).
    pub fn request_suggestions(&mut self, term: &str) {
        if term.is_empty() || !self.provides_suggestions() {
            return;
        }
        let Some(client) = self.http_client().cloned() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            debug!("no async runtime available for suggestion requests");
            return;
        };

        // Supersede the outstanding request before building the new one:
        // bumping the generation detaches its delivery even if the abort
        // races its completion.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.suggestions_task.take() {
            task.abort();
        }

        let Some(url) = self.suggestions_url(term) else {
            return;
        };
        let request = match self.suggestions_method() {
            Method::Get => client.get(url.as_str()),
            // POST keeps the parameters off the URL; they form the body as
            // raw key=value pairs.
            Method::Post => client
                .post(url.as_str())
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(self.suggestions_form_body()),
        };

        let events = self.event_sender();
        let live = Arc::clone(&self.generation);
        self.suggestions_task = Some(handle.spawn(async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(error) => {
                    debug!(%error, "suggestion request failed");
                    return;
                }
            };
            let body = match response.text().await {
                Ok(body) => body,
                Err(error) => {
                    debug!(%error, "could not read suggestion response");
                    return;
                }
            };
            let Some(list) = decode_suggestions(&body) else {
                return;
            };
            if live.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Some(events) = &events {
                let _ = events.send(EngineEvent::Suggestions(list));
            }
        }));
    }

    fn suggestions_form_body(&self) -> String {
        self.suggestions_parameters()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Decodes the OpenSearch suggestions convention: a JSON array whose element
/// at index 1 is an array of strings.
///
/// Returns `None` for anything else — empty bodies, non-array bodies, wrong
/// inner shapes, non-string entries. The caller treats `None` as "no
/// suggestions", not as an error.
pub(crate) fn decode_suggestions(body: &str) -> Option<Vec<String>> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    // Coarse shape check before handing the body to the JSON parser.
    if !body.starts_with('[') || !body.ends_with(']') {
        debug!("suggestion response is not bracketed as a JSON array");
        return None;
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(error) => {
            debug!(%error, "suggestion response is not valid JSON");
            return None;
        }
    };

    let completions = value.as_array()?.get(1)?.as_array()?;
    let mut list = Vec::with_capacity(completions.len());
    for entry in completions {
        list.push(entry.as_str()?.to_owned());
    }
    Some(list)
}

//! Suggestion request lifecycle against a local HTTP server: request
//! building for both methods, response decoding, silent handling of
//! malformed bodies, and supersede-on-new-request cancellation.
//!
//! These tests run on the current-thread runtime, so a spawned request task
//! cannot make progress until the test awaits — which makes the
//! cancellation ordering deterministic.

use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use opensearch_desc::{EngineEvent, SearchEngine, TemplateContext};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn suggestion_engine(server: &ServerGuard) -> SearchEngine {
    let mut engine = SearchEngine::new();
    engine.set_template_context(TemplateContext::new("opensearch-desc", "en-US"));
    engine.set_name("Example");
    engine.set_search_url_template(format!("{}/search?q={{searchTerms}}", server.url()));
    engine.set_suggestions_url_template(format!("{}/suggest?q={{searchTerms}}", server.url()));
    engine.set_http_client(reqwest::Client::new());
    engine
}

async fn next_event(events: &mut UnboundedReceiver<EngineEvent>) -> EngineEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for an engine event")
        .expect("event channel closed")
}

async fn assert_silent(events: &mut UnboundedReceiver<EngineEvent>) {
    assert!(
        timeout(Duration::from_millis(300), events.recv())
            .await
            .is_err(),
        "expected no notification"
    );
}

#[tokio::test]
async fn get_request_delivers_decoded_suggestions() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/suggest")
        .match_query(Matcher::UrlEncoded("q".into(), "rust".into()))
        .with_body(r#"["rust",["rust lang","rust book"]]"#)
        .create_async()
        .await;

    let mut engine = suggestion_engine(&server);
    let mut events = engine.subscribe();
    engine.request_suggestions("rust");

    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::Suggestions(vec![
            String::from("rust lang"),
            String::from("rust book"),
        ])
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn post_request_sends_raw_parameters_as_form_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/suggest")
        .match_query(Matcher::UrlEncoded("q".into(), "rust".into()))
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body("count=5&client={source}")
        .with_body(r#"["rust",["rustup"]]"#)
        .create_async()
        .await;

    let mut engine = suggestion_engine(&server);
    engine.set_suggestions_method("post");
    engine.set_suggestions_parameters(vec![
        (String::from("count"), String::from("5")),
        (String::from("client"), String::from("{source}")),
    ]);
    let mut events = engine.subscribe();
    engine.request_suggestions("rust");

    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::Suggestions(vec![String::from("rustup")])
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_and_malformed_bodies_yield_no_notification() {
    for body in ["", "   ", "not-an-array", r#"{"a":1}"#, r#"["q"]"#] {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/suggest")
            .match_query(Matcher::Any)
            .with_body(body)
            .create_async()
            .await;

        let mut engine = suggestion_engine(&server);
        let mut events = engine.subscribe();
        engine.request_suggestions("rust");

        assert_silent(&mut events).await;
    }
}

#[tokio::test]
async fn empty_suggestion_list_is_still_delivered() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/suggest")
        .match_query(Matcher::Any)
        .with_body(r#"["rust",[]]"#)
        .create_async()
        .await;

    let mut engine = suggestion_engine(&server);
    let mut events = engine.subscribe();
    engine.request_suggestions("rust");

    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::Suggestions(Vec::new())
    );
}

#[tokio::test]
async fn empty_term_and_missing_template_are_no_ops() {
    let server = Server::new_async().await;

    let mut engine = suggestion_engine(&server);
    let mut events = engine.subscribe();
    engine.request_suggestions("");
    assert_silent(&mut events).await;

    engine.set_suggestions_url_template("");
    engine.request_suggestions("rust");
    assert_silent(&mut events).await;
}

#[tokio::test]
async fn without_an_http_client_suggestions_stay_disabled() {
    let server = Server::new_async().await;

    let mut engine = SearchEngine::new();
    engine.set_suggestions_url_template(format!("{}/suggest?q={{searchTerms}}", server.url()));
    let mut events = engine.subscribe();
    engine.request_suggestions("rust");

    assert_silent(&mut events).await;
}

#[tokio::test]
async fn superseding_request_delivers_exactly_one_notification() {
    let mut server = Server::new_async().await;
    let _first = server
        .mock("GET", "/suggest")
        .match_query(Matcher::UrlEncoded("q".into(), "first".into()))
        .with_body(r#"["first",["one"]]"#)
        .create_async()
        .await;
    let _second = server
        .mock("GET", "/suggest")
        .match_query(Matcher::UrlEncoded("q".into(), "second".into()))
        .with_body(r#"["second",["two"]]"#)
        .create_async()
        .await;

    let mut engine = suggestion_engine(&server);
    let mut events = engine.subscribe();

    // The first request's task never runs before it is superseded: no await
    // happens between the two calls.
    engine.request_suggestions("first");
    engine.request_suggestions("second");

    assert_eq!(
        next_event(&mut events).await,
        EngineEvent::Suggestions(vec![String::from("two")])
    );
    assert_silent(&mut events).await;
}

#[tokio::test]
async fn dropping_the_engine_cancels_the_in_flight_request() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/suggest")
        .match_query(Matcher::Any)
        .with_body(r#"["rust",["never delivered"]]"#)
        .create_async()
        .await;

    let mut engine = suggestion_engine(&server);
    let mut events = engine.subscribe();
    engine.request_suggestions("rust");
    drop(engine);

    assert!(
        timeout(Duration::from_millis(300), events.recv())
            .await
            .map_or(true, |event| event.is_none()),
        "a cancelled request must not deliver"
    );
}

//! Fetches an OpenSearch description document and prints contextual
//! suggestions for a search term.
//!
//! Usage:
//!
//! ```sh
//! cargo run --example suggestions -- https://en.wikipedia.org/w/rest.php/v1/search "rust"
//! ```

use std::time::Duration;

use anyhow::{Context, Result, bail};
use opensearch_desc::{EngineEvent, reader};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let usage = "usage: suggestions <descriptor-url> <search-term>";
    let descriptor_url = args.next().context(usage)?;
    let term = args.next().context(usage)?;

    let client = reqwest::Client::new();
    let document = client
        .get(&descriptor_url)
        .send()
        .await
        .with_context(|| format!("could not fetch {descriptor_url}"))?
        .bytes()
        .await?;

    let parsed = reader::read(document.as_ref());
    if let Some(error) = parsed.error {
        bail!("could not parse {descriptor_url}: {error}");
    }

    let mut engine = parsed.engine;
    if !engine.is_valid() {
        bail!("{descriptor_url} does not describe a usable search engine");
    }
    println!("engine: {}", engine.name());

    if !engine.provides_suggestions() {
        bail!("{} does not provide suggestions", engine.name());
    }

    engine.set_http_client(client);
    let mut events = engine.subscribe();
    engine.request_suggestions(&term);

    // The engine never times out on its own; impose one here.
    match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
        Ok(Some(EngineEvent::Suggestions(suggestions))) => {
            for suggestion in suggestions {
                println!("- {suggestion}");
            }
        }
        Ok(_) => {}
        Err(_) => bail!("timed out waiting for suggestions"),
    }

    Ok(())
}

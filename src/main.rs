//! Demo: two sessions sharing one in-memory store.
//!
//! Reads agent tool calls as JSON lines on stdin, for example
//!
//! ```text
//! {"name":"createMany","arguments":{"type":"rectangle","count":6}}
//! {"name":"gridLayout","arguments":"{\"gap\":12}"}
//! ```
//!
//! applies them to the first ("author") session, and prints the collection
//! the second ("observer") session converged to as JSON.

use std::sync::Arc;
use std::time::Duration;

use canvas_sync::clock::{Clock, SystemClock};
use canvas_sync::memory_store::MemoryStore;
use canvas_sync::{CanvasObject, SyncConfig, spawn_session};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const CONVERGE_TIMEOUT: Duration = Duration::from_secs(2);

/// One stdin line. `arguments` may be a JSON object or a JSON-encoded string.
#[derive(Deserialize)]
struct ToolCallLine {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl ToolCallLine {
    fn arguments_json(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = SyncConfig::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = MemoryStore::new(Arc::clone(&clock));
    let author = spawn_session(Arc::new(store.clone()), config, "author", Arc::clone(&clock));
    let observer = spawn_session(Arc::new(store.clone()), config, "observer", clock);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut applied = 0_usize;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ToolCallLine>(line) {
            Ok(call) => {
                author.tool_call(&call.name, &call.arguments_json()).await?;
                applied += 1;
            }
            Err(e) => warn!(error = %e, "skipping malformed input line"),
        }
    }
    author.shutdown().await;

    // PHASE: WAIT FOR THE OBSERVER
    let stored: Vec<String> = store.objects().into_iter().map(|o| o.id).collect();
    let mut changes = observer.changes();
    let timed_out = tokio::time::timeout(
        CONVERGE_TIMEOUT,
        changes.wait_for(|v| v.objects.len() == stored.len() && v.objects.iter().all(|o| stored.contains(&o.id))),
    )
    .await
    .is_err();
    if timed_out {
        warn!(expected = stored.len(), "observer did not converge before timeout");
    }

    let objects: Vec<CanvasObject> = observer.view().objects.iter().map(|o| CanvasObject::clone(o)).collect();
    info!(applied, objects = objects.len(), writes = store.write_calls(), "demo finished");
    observer.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&objects)?);
    Ok(())
}

//! Line-oriented worker: reads one JSON job per line from stdin and writes
//! one JSON response per line to stdout, using the tone engine.
//!
//! ```text
//! echo '{"input": {"text": "Hello. This is a test."}}' | cargo run --example stdin_worker
//! ```

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

use tts_handler::{engines::tone::ToneLoader, EngineRole, HandlerConfig, RequestHandler, Response};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = HandlerConfig::from_env()?;
    let handler = RequestHandler::new(config, Arc::new(ToneLoader));

    let load_start = Instant::now();
    handler.preload(&[EngineRole::Standard])?;
    eprintln!("Standard engine ready in {:.2?}", load_start.elapsed());

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(job) => handler.handle(job),
            Err(e) => Response::error(format!("invalid JSON: {e}")),
        };
        serde_json::to_writer(&mut stdout, &response)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    Ok(())
}

//! services/agent/src/bin/openapi.rs
//!
//! Writes the reminder API description to disk for client generators.
//! Usage: `openapi [OUTPUT]`, defaulting to `openapi.json`.

use agent_lib::error::AgentError;
use agent_lib::web::rest::openapi_json;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), AgentError> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    let document = openapi_json()
        .map_err(|e| AgentError::Internal(format!("Failed to render API description: {}", e)))?;
    std::fs::write(&output, document)?;
    println!("Reminder API description written to {}", output);
    Ok(())
}

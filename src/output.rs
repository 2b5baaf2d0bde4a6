use serde_json::Value;

use crate::error::ProtonErrorOut;

pub type Outcome = Result<Value, ProtonErrorOut>;

pub fn render_result(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

pub fn render_error(error: &ProtonErrorOut) -> String {
    serde_json::to_string(error).unwrap_or_else(|_| {
        // Hand-built fallback keeps the failure channel parseable.
        format!("{{\"error\":{:?}}}", error.message)
    })
}

/// Prints the outcome on the matching channel and returns the process exit code.
pub fn report(outcome: &Outcome) -> i32 {
    match outcome {
        Ok(value) => {
            println!("{}", render_result(value));
            0
        }
        Err(error) => {
            eprintln!("{}", render_error(error));
            1
        }
    }
}

//! JSON I/O handling for CLI
//!
//! - Input: a single JSON document on stdin
//! - Output: a single JSON object on stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read a JSON request from stdin. The document may span several lines.
pub fn read_request() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

fn parse_request(input: &str) -> CliResult<Value> {
    if input.trim().is_empty() {
        return Err(CliError::EmptyRequest);
    }
    serde_json::from_str(input).map_err(CliError::MalformedRequest)
}

/// Build the success envelope
pub fn ok_response(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

/// Build the error envelope
pub fn error_response(code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&ok_response(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_json(&error_response(code, message))
}

fn write_json(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response).map_err(io::Error::from)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request("{\n  \"a\": 1\n}\n").unwrap(), json!({"a": 1}));
        assert!(matches!(parse_request("  \n"), Err(CliError::EmptyRequest)));
        assert!(matches!(parse_request("{"), Err(CliError::MalformedRequest(_))));
    }

    #[test]
    fn test_envelopes() {
        assert_eq!(ok_response(json!(true)), json!({"status": "ok", "data": true}));
        assert_eq!(
            error_response("AERO_FORBIDDEN", "no"),
            json!({"status": "error", "code": "AERO_FORBIDDEN", "message": "no"})
        );
    }
}

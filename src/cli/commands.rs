//! CLI command implementations
//!
//! Each command reads one JSON request on stdin and writes one response on
//! stdout. A malformed request produces an error response with the error's
//! stable code; only configuration and I/O failures abort the process.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::access::{AccessError, AccessResult, AccessValue, Action, PermissionSet};
use crate::config::AccessConfig;
use crate::filter::FilterParser;
use crate::observability::init_logging;

use super::args::{Cli, Command, CombineOp};
use super::errors::CliResult;
use super::io::{read_request, write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run a single command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Translate { config, from, to } => translate(&config, from, to),
        Command::Combine { config, op } => combine(&config, op),
        Command::Resolve { config } => resolve(&config),
    }
}

/// Reparse a filter under one prefix and reserialize it under another
pub fn translate(config_path: &Path, from: Option<String>, to: Option<String>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let parser = FilterParser::new(from.unwrap_or_else(|| config.operator_prefix.clone()))
        .with_max_depth(config.max_filter_depth);
    let to = to.unwrap_or_else(|| config.storage_prefix.clone());

    let request = read_request()?;
    respond(translate_filter(&request, &parser, &to))
}

/// Intersect or unite two access values
pub fn combine(config_path: &Path, op: CombineOp) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request = read_request()?;
    respond(combine_access(&request, op, &config.parser()))
}

/// Resolve a caller's grant from a permission list
pub fn resolve(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request = read_request()?;
    respond(resolve_access(&request, &config.parser()))
}

fn load_config(path: &Path) -> CliResult<AccessConfig> {
    let config = AccessConfig::load_or_default(path)?;
    init_logging(&config.log_filter);
    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

fn respond(result: AccessResult<Value>) -> CliResult<()> {
    match result {
        Ok(data) => write_response(data),
        Err(err) => write_error(err.code(), &err.to_string()),
    }
}

/// Translate a filter literal between operator prefixes
pub fn translate_filter(input: &Value, parser: &FilterParser, to: &str) -> AccessResult<Value> {
    let filter = parser.parse(input)?;
    Ok(filter.translate(to)?)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CombineRequest {
    left: Value,
    right: Value,
}

/// Combine `{"left": <access>, "right": <access>}`
pub fn combine_access(input: &Value, op: CombineOp, parser: &FilterParser) -> AccessResult<Value> {
    let request: CombineRequest = decode(input)?;
    let left = AccessValue::parse_with(&request.left, parser)?;
    let right = AccessValue::parse_with(&request.right, parser)?;

    let combined = match op {
        CombineOp::Intersect => left.intersect(right),
        CombineOp::Unite => left.unite(right),
    };
    Ok(combined.to_value(parser.prefix()))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResolveRequest {
    permissions: Value,
    model: String,
    action: Action,
    #[serde(default)]
    roles: Vec<String>,
}

/// Resolve `{"permissions", "model", "action", "roles"}` to an access value
pub fn resolve_access(input: &Value, parser: &FilterParser) -> AccessResult<Value> {
    let request: ResolveRequest = decode(input)?;
    let permissions = PermissionSet::parse_with(&request.permissions, parser)?;
    let access = permissions.resolve(&request.model, request.action, &request.roles);

    Ok(json!({
        "model": request.model,
        "action": request.action.as_str(),
        "access": access.to_value(parser.prefix()),
    }))
}

fn decode<T: serde::de::DeserializeOwned>(input: &Value) -> AccessResult<T> {
    T::deserialize(input).map_err(|e| AccessError::invalid(format!("invalid request: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_filter_between_prefixes() {
        let parser = FilterParser::new("$");
        let output = translate_filter(
            &json!({"$or": [{"age": {"$lt": 13}}, {"role": "admin"}]}),
            &parser,
            "_",
        )
        .unwrap();
        assert_eq!(output, json!({"_or": [{"age": {"_lt": 13}}, {"role": "admin"}]}));
    }

    #[test]
    fn test_translate_reports_filter_errors() {
        let err = translate_filter(&json!({"$or": []}), &FilterParser::new("$"), "_").unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_QUERY_FILTER");
    }

    #[test]
    fn test_translate_rejects_field_colliding_with_target_prefix() {
        let err = translate_filter(&json!({"_owner": "u1"}), &FilterParser::new("$"), "_")
            .unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_QUERY_FILTER");
        assert!(err.to_string().contains("'_owner'"));
    }

    #[test]
    fn test_combine_access() {
        let parser = FilterParser::new("$");
        let input = json!({
            "left": {"fields": ["name"], "filter": {"age": {"$gte": 18}}},
            "right": {"fields": ["name", "email"]}
        });

        assert_eq!(
            combine_access(&input, CombineOp::Unite, &parser).unwrap(),
            json!({"fields": ["email", "name"]})
        );
        assert_eq!(
            combine_access(&input, CombineOp::Intersect, &parser).unwrap(),
            json!({"fields": ["name"], "filter": {"age": {"$gte": 18}}})
        );
    }

    #[test]
    fn test_combine_rejects_malformed_request() {
        let parser = FilterParser::new("$");
        let err = combine_access(&json!({"left": true}), CombineOp::Unite, &parser).unwrap_err();
        assert_eq!(err.code(), "AERO_INVALID_ACCESS_VALUE");
    }

    #[test]
    fn test_resolve_access() {
        let input = json!({
            "permissions": [
                {"model": "posts", "action": "read", "access": {"filter": {"published": true}}},
                {"model": "posts", "action": "read", "roles": ["editor"], "access": {"filter": {"draft": true}}}
            ],
            "model": "posts",
            "action": "read",
            "roles": ["editor"]
        });

        let output = resolve_access(&input, &FilterParser::new("$")).unwrap();
        assert_eq!(
            output,
            json!({
                "model": "posts",
                "action": "read",
                "access": {"filter": {"$or": [{"published": true}, {"draft": true}]}}
            })
        );
    }
}

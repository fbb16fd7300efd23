use crate::compiler::{compile, CompileOptions, SchemaSource};
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::spec::{lint_api, load_api, SecurityRequirement};
use crate::validator::format_issues;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inspect and check OpenAPI documents and JSON Schemas.
#[derive(Debug, Parser)]
#[command(name = "oapi-check")]
#[command(about = "Check OpenAPI documents and JSON Schemas", long_about = None)]
pub struct Cli {
    /// Debug-level pretty logs.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile an API and print its route table in matching order
    Routes {
        /// OpenAPI document (YAML or JSON) or URL
        spec: String,
    },
    /// Validate a JSON/YAML value against a JSON Schema
    Validate {
        /// Schema file or URL
        #[arg(short, long)]
        schema: String,

        /// Value file (JSON or YAML)
        #[arg(long)]
        value: PathBuf,
    },
    /// Check an OpenAPI document against the OpenAPI 3.x meta-schema
    Lint {
        /// OpenAPI document (YAML or JSON) or URL
        spec: String,
    },
}

/// Run `cli`, writing the report to `out`.
///
/// Returns whether the checked input was valid.
///
/// # Errors
///
/// Unreadable inputs and documents that fail to compile.
pub async fn run(cli: &Cli, out: &mut impl Write) -> Result<bool> {
    let options = CompileOptions::from_runtime(&RuntimeConfig::from_env());
    match &cli.command {
        Commands::Routes { spec } => routes(spec, &options, out).await,
        Commands::Validate { schema, value } => validate(schema, value, &options, out).await,
        Commands::Lint { spec } => lint(spec, &options, out).await,
    }
}

async fn routes(spec: &str, options: &CompileOptions, out: &mut impl Write) -> Result<bool> {
    let api = load_api(SchemaSource::from(spec), options)
        .await
        .with_context(|| format!("failed to load {spec}"))?;
    let router = Router::new(api.operations.iter().cloned().map(Arc::new).collect())?;

    writeln!(out, "{} {} ({} operations)", api.title, api.version, router.routes().len())?;
    for route in router.routes() {
        let op = &route.operation;
        writeln!(
            out,
            "{:<7} {:<40} {:<24} {}",
            route.method(),
            route.pattern(),
            op.operation_id.as_deref().unwrap_or("-"),
            describe_security(&op.security)
        )?;
    }
    Ok(true)
}

async fn validate(
    schema: &str,
    value: &Path,
    options: &CompileOptions,
    out: &mut impl Write,
) -> Result<bool> {
    let compiled = compile(SchemaSource::from(schema), options)
        .await
        .with_context(|| format!("failed to compile {schema}"))?;
    let value = read_value(value).await?;

    let result = compiled.validate(&value);
    if result.valid {
        writeln!(out, "valid")?;
    } else {
        writeln!(out, "invalid: {} issue(s)", result.errors.len())?;
        writeln!(out, "{}", format_issues(&result.errors))?;
    }
    Ok(result.valid)
}

async fn lint(spec: &str, options: &CompileOptions, out: &mut impl Write) -> Result<bool> {
    let issues = lint_api(SchemaSource::from(spec), options)
        .await
        .with_context(|| format!("failed to load {spec}"))?;
    if issues.is_empty() {
        writeln!(out, "ok")?;
    } else {
        writeln!(out, "{} issue(s)", issues.len())?;
        writeln!(out, "{}", format_issues(&issues))?;
    }
    Ok(issues.is_empty())
}

async fn read_value(path: &Path) -> Result<Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let value = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))?
    };
    Ok(value)
}

/// `apiKey | oauth[read] + session`, `public` when empty.
fn describe_security(requirements: &[SecurityRequirement]) -> String {
    if requirements.is_empty() {
        return "public".to_string();
    }
    requirements
        .iter()
        .map(|requirement| {
            if requirement.is_empty() {
                return "{}".to_string();
            }
            requirement
                .schemes
                .iter()
                .map(|(name, scopes)| {
                    if scopes.is_empty() {
                        name.clone()
                    } else {
                        format!("{name}[{}]", scopes.join(","))
                    }
                })
                .collect::<Vec<_>>()
                .join(" + ")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

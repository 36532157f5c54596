//! Command-line front end: resolve configuration files against a schema.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value as Json;

use crate::keypath::Keypath;
use crate::resolve::{Resolver, DEFAULT_SELF_PREFIX};
use crate::schema::{parse_schema, Schema};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// resolve JSON/YAML configuration files against a typed schema
#[derive(Parser, Debug)]
#[command(name = "dictconfig", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// interpolate, parse and print one or more configurations
    Resolve(ResolveOut),
    /// validate a schema definition without touching any data
    Check(CheckSchema),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// schema definition (JSON, or YAML for .yaml/.yml)
    #[arg(long, short)]
    schema: PathBuf,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct VariableSettings {
    /// file holding external variables (a JSON/YAML mapping)
    #[arg(long)]
    vars: Option<PathBuf>,

    /// external variable as NAME=VALUE; dotted names nest, later flags win
    #[arg(long = "var", value_name = "NAME=VALUE")]
    var: Vec<String>,

    /// name a configuration uses to refer to itself
    #[arg(long, default_value = DEFAULT_SELF_PREFIX)]
    self_prefix: String,
}

#[derive(clap::Parser, Debug)]
struct ResolveOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    variables: VariableSettings,

    /// write `<stem>.resolved.json` per input here (stdout if omitted)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// print one compact JSON line per input
    #[arg(long)]
    ndjson: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckSchema {
    /// schema definition (JSON, or YAML for .yaml/.yml)
    #[arg(long, short)]
    schema: PathBuf,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Resolve(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(())
                }
                target.run()
            }
            Command::Check(target) => {
                load_schema(&target.schema)?;
                println!("{}", "ok".green());
                Ok(())
            }
        }
    }
}

impl ResolveOut {
    fn run(&self) -> anyhow::Result<()> {
        let schema = load_schema(&self.input_settings.schema)?;
        let variables = self.variables.load()?;
        let source_paths = resolve_file_path_patterns(&self.input_settings.input)?;
        tracing::info!(inputs = source_paths.len(), "resolving");

        // each input gets its own tree and memo table
        let results = source_paths
            .into_par_iter()
            .map(|path| {
                let outcome = resolve_file(&path, &schema, &variables, &self.variables.self_prefix);
                (path, outcome)
            })
            .collect::<Vec<_>>();

        let total = results.len();
        let mut failed = 0;
        for (path, outcome) in results {
            match outcome.and_then(|value| self.emit(&path, &value)) {
                Ok(()) => {}
                Err(error) => {
                    failed += 1;
                    report_failure(&path, &error);
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {total} inputs failed to resolve");
        }
        Ok(())
    }

    fn emit(&self, path: &Path, value: &Value) -> anyhow::Result<()> {
        if let Some(out_dir) = self.out_dir.as_ref() {
            let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
            let out = out_dir.join(format!("{stem}.resolved.json"));
            std::fs::create_dir_all(out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            std::fs::write(&out, serde_json::to_string_pretty(value)?)
                .with_context(|| format!("failed to write {}", out.display()))?;
            return Ok(())
        }
        if self.ndjson {
            println!("{}", serde_json::to_string(value)?);
        } else {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }
}

impl VariableSettings {
    fn load(&self) -> anyhow::Result<Json> {
        let mut variables = match self.vars.as_ref() {
            Some(path) => load_document(path)?,
            None => Json::Object(Default::default()),
        };
        if !variables.is_object() {
            bail!("external variables must be a mapping");
        }
        for assignment in &self.var {
            let (name, value) = assignment
                .split_once('=')
                .with_context(|| format!("expected NAME=VALUE, got {assignment:?}"))?;
            insert_dotted(&mut variables, name, value)?;
        }
        Ok(variables)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file(path: &Path, schema: &Schema, variables: &Json, self_prefix: &str) -> anyhow::Result<Value> {
    let raw = load_document(path)?;
    let value = Resolver::new(schema.clone())
        .with_variables(variables.clone())
        .with_self_prefix(self_prefix)
        .resolve(&raw)?;
    Ok(value)
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let definition = load_document(path)?;
    parse_schema(&definition).with_context(|| format!("schema {}", path.display()))
}

/// YAML for `.yaml`/`.yml`, JSON otherwise.
fn load_document(path: &Path) -> anyhow::Result<Json> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"));
    if is_yaml {
        serde_yaml::from_str(&source).with_context(|| format!("failed to parse YAML source file ({})", path.display()))
    } else {
        serde_json::from_str(&source).with_context(|| format!("failed to parse JSON source file ({})", path.display()))
    }
}

fn insert_dotted(target: &mut Json, name: &str, value: &str) -> anyhow::Result<()> {
    let parts = Keypath::dotted_parts(name);
    if parts.iter().any(|p| p.is_empty()) {
        bail!("invalid variable name {name:?}");
    }
    let Some((last, parents)) = parts.split_last() else {
        bail!("invalid variable name {name:?}");
    };
    let mut at = target;
    for part in parents {
        let map = at
            .as_object_mut()
            .with_context(|| format!("variable {name:?} nests under a non-mapping value"))?;
        at = map.entry(part.to_string()).or_insert_with(|| Json::Object(Default::default()));
    }
    let map = at
        .as_object_mut()
        .with_context(|| format!("variable {name:?} nests under a non-mapping value"))?;
    map.insert(last.to_string(), Json::String(value.to_string()));
    Ok(())
}

fn report_failure(path: &Path, error: &anyhow::Error) {
    let kind = match error.downcast_ref::<crate::Error>() {
        Some(err) => err.kind().to_string(),
        None => "io".to_string(),
    };
    eprintln!("{} {} [{}] {error:#}", "✗".red().bold(), path.display(), kind.yellow());
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern {pattern:?}"))? {
                out.push(entry?);
            }
            if out.len() == before {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

//! Runs every `*.json` scenario under a directory (default: `<workspace>/scenarios`)
//! through `dictconfig::resolve` and reports pass/fail per file.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use dictconfig::{Parsers, Value};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Scenario {
    #[serde(default)]
    description: Option<String>,
    raw: serde_json::Value,
    schema: serde_json::Value,
    #[serde(default)]
    variables: serde_json::Value,
    expect: Expect,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
enum Expect {
    Value(serde_json::Value),
    Error {
        kind: String,
        #[serde(default)]
        message: Option<String>,
    },
}

fn load_scenario(path: &Path) -> Result<Scenario, String> {
    let source = std::fs::read_to_string(path).map_err(|e| format!("failed to read: {e}"))?;
    let de = &mut serde_json::Deserializer::from_str(&source);
    serde_path_to_error::deserialize(de).map_err(|e| format!("bad fixture at `{}`: {}", e.path(), e.inner()))
}

fn check(scenario: &Scenario) -> Result<(), String> {
    let outcome = dictconfig::resolve(&scenario.raw, &scenario.schema, &scenario.variables, Parsers::new());
    match (&scenario.expect, outcome) {
        (Expect::Value(expected), Ok(value)) => {
            let actual = to_json(&value)?;
            if &actual == expected {
                Ok(())
            } else {
                Err(format!("expected {expected}\n      got {actual}"))
            }
        }
        (Expect::Value(_), Err(error)) => Err(format!("unexpected error [{}]: {error}", error.kind())),
        (Expect::Error { .. }, Ok(value)) => Err(format!("expected an error, got {}", to_json(&value)?)),
        (Expect::Error { kind, message }, Err(error)) => {
            if error.kind().as_str() != kind {
                return Err(format!("expected [{kind}], got [{}]: {error}", error.kind()));
            }
            let Some(pattern) = message else { return Ok(()) };
            let re = Regex::new(pattern).map_err(|e| format!("bad message pattern: {e}"))?;
            let text = error.to_string();
            if re.is_match(&text) {
                Ok(())
            } else {
                Err(format!("message {text:?} does not match /{pattern}/"))
            }
        }
    }
}

fn to_json(value: &Value) -> Result<serde_json::Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn scenario_paths(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = std::fs::read_dir(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
    let mut paths = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}

fn main() -> ExitCode {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("../scenarios"));
    let paths = match scenario_paths(&dir) {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("❌ {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0;
    for path in &paths {
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        match load_scenario(path).and_then(|s| check(&s).map(|()| s)) {
            Ok(scenario) => {
                let description = scenario.description.unwrap_or_default();
                eprintln!("✅ {name} {description}");
            }
            Err(error) => {
                failed += 1;
                eprintln!("❌ {name}: {error}");
            }
        }
    }
    eprintln!("—— {} passed, {failed} failed ——", paths.len() - failed);
    if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

use std::cell::Cell;
use std::rc::Rc;

use chrono::NaiveDate;
use dictconfig::render::Lookup;
use dictconfig::{keypath, resolve, Error, ErrorKind, LeafType, ParseError, Parsers, RenderError, Renderer, Resolver, Value};
use pretty_assertions::assert_eq;
use serde_json::{json, Value as Json};

fn integers(names: &[&str]) -> Json {
    let keys: serde_json::Map<String, Json> = names.iter()
        .map(|n| (n.to_string(), json!({"type": "integer"})))
        .collect();
    json!({"type": "dict", "required_keys": keys})
}

fn run(raw: Json, schema: Json) -> dictconfig::Result<Value> {
    resolve(&raw, &schema, &json!({}), Parsers::new())
}

fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// Integer parser that counts calls per input text.
fn counting_integer_parser(calls: Rc<Cell<usize>>) -> Parsers {
    Parsers::new().with(LeafType::Integer, move |text| {
        calls.set(calls.get() + 1);
        dictconfig::parsers::integer(text)
    })
}

// ------------------------------ Properties ------------------------------- //

#[test]
fn resolving_a_plain_tree_is_idempotent() {
    let schema = json!({
        "type": "dict",
        "required_keys": {
            "name": {"type": "string"},
            "count": {"type": "integer"},
            "ratio": {"type": "float"},
            "whole": {"type": "float"},
            "enabled": {"type": "boolean"},
            "start": {"type": "date"},
            "at": {"type": "datetime"},
            "tags": {"type": "list", "element_schema": {"type": "string"}},
            "meta": {"type": "any"},
        }
    });
    let raw = json!({
        "name": "nightly",
        "count": "3",
        "ratio": 0.25,
        "whole": "2",
        "enabled": "True",
        "start": "2025-01-10",
        "at": "2025-01-10T08:30:00",
        "tags": ["a", "b"],
        "meta": {"owner": "ops", "level": 2},
    });
    let first = run(raw, schema.clone()).unwrap();
    let again = run(serde_json::to_value(&first).unwrap(), schema).unwrap();
    assert_eq!(first, again);
    assert_eq!(first.get("whole"), Some(&Value::float(2.0)));
}

#[test]
fn output_follows_schema_order_not_input_order() {
    let schema = integers(&["x", "y", "z"]);
    let forward = run(json!({"x": "10", "y": "3", "z": "2 * ${this.x} + ${this.y}"}), schema.clone()).unwrap();
    let shuffled = run(json!({"z": "2 * ${this.x} + ${this.y}", "y": "3", "x": "10"}), schema).unwrap();
    assert_eq!(forward, shuffled);
    assert_eq!(serde_json::to_string(&shuffled).unwrap(), r#"{"x":10,"y":3,"z":23}"#);
}

#[test]
fn diamond_references_parse_their_target_once() {
    let calls = Rc::new(Cell::new(0));
    let schema = json!({
        "type": "dict",
        "required_keys": {
            "b": {"type": "string"},
            "c": {"type": "string"},
            "a": {"type": "integer"},
        }
    });
    let raw = json!({"a": "6 * 7", "b": "b sees ${this.a}", "c": "c sees ${this.a}"});
    let out = resolve(&raw, &schema, &json!({}), counting_integer_parser(calls.clone())).unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(out.get("a"), Some(&Value::Integer(42)));
    assert_eq!(out.get("b"), Some(&Value::from("b sees 42")));
    assert_eq!(out.get("c"), Some(&Value::from("c sees 42")));
}

#[test]
fn direct_self_reference_is_circular() {
    let err = run(json!({"a": "${this.a} + 1"}), integers(&["a"])).unwrap_err();
    match err {
        Error::CircularReference { keypath, cycle } => {
            assert_eq!(keypath, keypath!["a"]);
            assert_eq!(cycle, vec![keypath!["a"], keypath!["a"]]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn cycles_through_lists_name_every_keypath() {
    let schema = json!({
        "type": "dict",
        "required_keys": {
            "xs": {"type": "list", "element_schema": {"type": "integer"}},
            "total": {"type": "integer"},
        }
    });
    let err = run(json!({"xs": ["1", "${this.total}"], "total": "${this.xs.1} + 1"}), schema).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircularReference);
    assert_eq!(err.to_string(), "circular reference: xs.1 -> total -> xs.1");
}

#[test]
fn defaults_bypass_interpolation_and_parsing() {
    let calls = Rc::new(Cell::new(0));
    let schema = json!({
        "type": "dict",
        "required_keys": {"name": {"type": "string"}},
        "optional_keys": {
            "timeout": {"type": "integer", "default": 10},
            "motto": {"type": "string", "default": "1 + ${this.name} ("},
            "since": {"type": "date", "default": "2024-02-29"},
            "retries": {"type": "integer", "nullable": true, "default": null},
        }
    });
    let out = resolve(&json!({"name": "svc"}), &schema, &json!({}), counting_integer_parser(calls.clone())).unwrap();
    assert_eq!(calls.get(), 0);
    assert_eq!(out, Value::Dict([
        ("name".to_string(), Value::from("svc")),
        ("timeout".to_string(), Value::Integer(10)),
        ("motto".to_string(), Value::from("1 + ${this.name} (")),
        ("since".to_string(), date(2024, 2, 29)),
        ("retries".to_string(), Value::Null),
    ].into_iter().collect()));
}

#[test]
fn present_optional_keys_are_resolved_normally() {
    let schema = json!({
        "type": "dict",
        "optional_keys": {"timeout": {"type": "integer", "default": 10}}
    });
    let out = run(json!({"timeout": "2 * 30"}), schema).unwrap();
    assert_eq!(out.get("timeout"), Some(&Value::Integer(60)));
}

#[test]
fn overrides_last_only_one_call() {
    let schema = integers(&["n"]);
    let raw = json!({"n": "0x10"});
    let hex = Parsers::new().with(LeafType::Integer, |text| {
        let digits = text.trim().trim_start_matches("0x");
        i64::from_str_radix(digits, 16).map(Value::Integer).map_err(|e| ParseError::invalid(e.to_string()))
    });
    assert_eq!(resolve(&raw, &schema, &json!({}), hex).unwrap().get("n"), Some(&Value::Integer(16)));
    assert_eq!(run(raw, schema).unwrap_err().kind(), ErrorKind::Parse);
}

// ------------------------------ Scenarios -------------------------------- //

#[test]
fn scenario_arithmetic_over_references() {
    let out = run(json!({"x": "10", "y": "3", "z": "2 * ${this.x} + ${this.y}"}), integers(&["x", "y", "z"])).unwrap();
    assert_eq!(out, Value::Dict([
        ("x".to_string(), Value::Integer(10)),
        ("y".to_string(), Value::Integer(3)),
        ("z".to_string(), Value::Integer(23)),
    ].into_iter().collect()));
}

#[test]
fn scenario_relative_date() {
    let schema = json!({
        "type": "dict",
        "required_keys": {"release": {"type": "date"}, "due": {"type": "date"}}
    });
    let out = run(json!({"release": "2025-01-10", "due": "7 days after ${this.release}"}), schema).unwrap();
    assert_eq!(out.get("due"), Some(&date(2025, 1, 17)));
}

#[test]
fn scenario_missing_required_key() {
    let err = run(json!({"x": "1", "y": "2"}), integers(&["x", "y", "z"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredKey);
    assert_eq!(err.keypath(), &keypath!["z"]);
}

#[test]
fn scenario_boolean_logic() {
    let schema = json!({"type": "dict", "required_keys": {"flag": {"type": "boolean"}}});
    let out = run(json!({"flag": "True and (False or True)"}), schema).unwrap();
    assert_eq!(out.get("flag"), Some(&Value::Bool(true)));
}

#[test]
fn scenario_mutual_reference() {
    let schema = json!({
        "type": "dict",
        "required_keys": {"a": {"type": "string"}, "b": {"type": "string"}}
    });
    let err = run(json!({"a": "${this.b}", "b": "${this.a}"}), schema).unwrap_err();
    let Error::CircularReference { cycle, .. } = err else { panic!("expected a cycle") };
    assert_eq!(cycle, vec![keypath!["a"], keypath!["b"], keypath!["a"]]);
}

#[test]
fn scenario_external_variable() {
    let schema = json!({"type": "dict", "required_keys": {"tomorrow": {"type": "date"}}});
    let out = resolve(
        &json!({"tomorrow": "1 day after ${today}"}),
        &schema,
        &json!({"today": "2025-01-07"}),
        Parsers::new(),
    ).unwrap();
    assert_eq!(out.get("tomorrow"), Some(&date(2025, 1, 8)));
}

// ------------------------------- Surfaces -------------------------------- //

#[test]
fn schema_errors_come_before_data_errors() {
    let schema = json!({"type": "dict", "required_keys": {"when": {"type": "timestamp"}}});
    let err = run(json!({"unrelated": []}), schema).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.keypath(), &keypath!["required_keys", "when", "type"]);
}

#[test]
fn container_kind_mismatch_is_a_type_error() {
    let schema = json!({
        "type": "dict",
        "required_keys": {"xs": {"type": "list", "element_schema": {"type": "integer"}}}
    });
    let err = run(json!({"xs": {"0": "1"}}), schema).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.keypath(), &keypath!["xs"]);
}

#[test]
fn nested_references_and_datetimes() {
    let schema = json!({
        "type": "dict",
        "required_keys": {
            "release": {
                "type": "dict",
                "required_keys": {
                    "start": {"type": "datetime"},
                    "review": {"type": "datetime"},
                }
            },
            "reminder": {"type": "date"},
        }
    });
    let raw = json!({
        "release": {
            "start": "2021-10-05 23:59:15",
            "review": "first monday after ${this.release.start} at 09:00",
        },
        "reminder": "3 days before ${this.release.review}",
    });
    let out = run(raw, schema).unwrap();
    let review = NaiveDate::from_ymd_opt(2021, 10, 11).unwrap().and_hms_opt(9, 0, 0).unwrap();
    assert_eq!(out.get("release").and_then(|r| r.get("review")), Some(&Value::DateTime(review)));
    assert_eq!(out.get("reminder"), Some(&date(2021, 10, 8)));
}

#[test]
fn resolver_is_reusable_across_inputs() {
    let resolver = Resolver::from_definition(&integers(&["n"])).unwrap()
        .with_variables(json!({"base": 5}));
    let a = resolver.resolve(&json!({"n": "${base} + 1"})).unwrap();
    let b = resolver.resolve(&json!({"n": "${base} * 2"})).unwrap();
    assert_eq!(a.get("n"), Some(&Value::Integer(6)));
    assert_eq!(b.get("n"), Some(&Value::Integer(10)));
}

#[test]
fn large_integer_literals_stay_exact() {
    let schema = integers(&["id", "next"]);
    let out = run(json!({"id": 9007199254740993_i64, "next": "9007199254740993"}), schema).unwrap();
    assert_eq!(out.get("id"), Some(&Value::Integer(9_007_199_254_740_993)));
    assert_eq!(out.get("next"), Some(&Value::Integer(9_007_199_254_740_993)));
}

#[test]
fn deeply_nested_expressions_fail_cleanly() {
    let deep = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
    let err = run(json!({"n": deep}), integers(&["n"])).unwrap_err();
    let Error::Parse { keypath, source, .. } = err else { panic!("expected a parse error") };
    assert_eq!(keypath, keypath!["n"]);
    assert!(matches!(source, ParseError::Syntax { .. }));
}

#[test]
fn nullable_containers_accept_null() {
    let schema = json!({
        "type": "dict",
        "required_keys": {
            "limits": {"type": "dict", "nullable": true, "required_keys": {"cpu": {"type": "integer"}}},
            "hosts": {"type": "list", "nullable": true, "element_schema": {"type": "string"}},
        }
    });
    let out = run(json!({"limits": null, "hosts": null}), schema.clone()).unwrap();
    assert_eq!(out.get("limits"), Some(&Value::Null));
    assert_eq!(out.get("hosts"), Some(&Value::Null));

    let strict = json!({
        "type": "dict",
        "required_keys": {"limits": {"type": "dict", "required_keys": {"cpu": {"type": "integer"}}}}
    });
    let err = run(json!({"limits": null}), strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.keypath(), &keypath!["limits"]);
}

#[test]
fn extra_keys_follow_their_schema() {
    let schema = json!({
        "type": "dict",
        "required_keys": {"base": {"type": "integer"}},
        "extra_keys_schema": {"type": "float"},
    });
    let out = run(json!({"half": "${this.base} / 2", "base": "3", "double": "${this.half} * 4"}), schema).unwrap();
    assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"base":3,"half":1.5,"double":6.0}"#);

    let schema = json!({
        "type": "dict",
        "extra_keys_schema": {"type": "integer"},
    });
    let err = run(json!({"ok": "1", "bad": "one"}), schema).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.keypath(), &keypath!["bad"]);
}

/// Mustache-style `{{ name }}` substitution.
struct Braces;

impl Renderer for Braces {
    fn render(&self, template: &str, lookup: &mut Lookup<'_>) -> Result<String, RenderError> {
        let mut out = String::new();
        let mut rest = template;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let Some(end) = body.find("}}") else {
                return Err(RenderError::Syntax {
                    position: template.len() - rest.len() + start,
                    message: "unterminated `{{`".to_string(),
                });
            };
            out.push_str(&lookup(body[..end].trim())?);
            rest = &body[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[test]
fn custom_renderer_drives_lookups() {
    let schema = json!({
        "type": "dict",
        "required_keys": {
            "a": {"type": "integer"},
            "b": {"type": "integer"},
            "literal": {"type": "string"},
            "region": {"type": "string"},
        }
    });
    let resolver = Resolver::from_definition(&schema).unwrap()
        .with_renderer(Braces)
        .with_variables(json!({"env": {"region": "eu-west-1"}}));
    let out = resolver.resolve(&json!({
        "a": "20 + 1",
        "b": "{{ this.a }} * 2",
        "literal": "${this.a}",
        "region": "{{env.region}}",
    })).unwrap();
    assert_eq!(out.get("b"), Some(&Value::Integer(42)));
    assert_eq!(out.get("literal"), Some(&Value::from("${this.a}")));
    assert_eq!(out.get("region"), Some(&Value::from("eu-west-1")));

    let err = resolver.resolve(&json!({"a": "1", "b": "{{ this.b }}", "literal": "", "region": "x"})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CircularReference);

    let err = resolver.resolve(&json!({"a": "1 + {{ this.b", "b": "1", "literal": "", "region": "x"})).unwrap_err();
    assert!(matches!(err, Error::Template { position: 4, .. }));
}

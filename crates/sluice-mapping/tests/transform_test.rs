//! Behavioral tests for mapping resolution and the built-in directives.

use serde_json::{Value, json};
use sluice_mapping::{
  Escaping, MappingError, ResolveOptions, resolve, transform, transform_with, validate,
};

#[test]
fn literals_pass_through() {
  let payload = json!({"a": 1});
  for literal in [json!(1), json!("hi"), json!(true), json!(null)] {
    assert_eq!(resolve(&literal, &payload).unwrap(), Some(literal.clone()));
  }
}

#[test]
fn empty_mapping_yields_empty_object() {
  assert_eq!(transform(&json!({}), &json!({"anything": true})).unwrap(), json!({}));
}

#[test]
fn literal_mapping_ignores_payload() {
  assert_eq!(transform(&json!({"a": 1}), &json!({})).unwrap(), json!({"a": 1}));
}

#[test]
fn transform_is_deterministic() {
  let mapping = json!({
    "name": {"@path": "$.user.name"},
    "line": {"@template": "{{ user.name }} did {{ action }}"},
    "when": {"@timestamp": {"timestamp": {"@path": "$.ts"}, "format": "json"}},
  });
  let payload = json!({"user": {"name": "Ada"}, "action": "signup", "ts": "2021-01-02T03:04:05Z"});
  assert_eq!(
    transform(&mapping, &payload).unwrap(),
    transform(&mapping, &payload).unwrap()
  );
}

#[test]
fn transform_rejects_non_object_payload() {
  let err = transform(&json!({}), &json!([1, 2])).unwrap_err();
  assert!(matches!(err, MappingError::InvalidPayload));
}

#[test]
fn absent_members_are_stripped_but_null_is_kept() {
  let mapping = json!({
    "missing": {"@path": "$.nope"},
    "explicit": null,
  });
  let out = transform(&mapping, &json!({})).unwrap();
  assert_eq!(out, json!({"explicit": null}));
  assert!(out.get("missing").is_none());
}

#[test]
fn validation_rejects_mixed_keys() {
  let mapping = json!({"@path": "$.a", "other": 1});
  assert!(matches!(
    validate(&mapping).unwrap_err(),
    MappingError::MixedDirective { .. }
  ));
}

#[test]
fn validation_rejects_multiple_directives() {
  let mapping = json!({"@path": "$.a", "@root": true});
  assert!(matches!(
    validate(&mapping).unwrap_err(),
    MappingError::MultipleDirectives { .. }
  ));
}

#[test]
fn validation_recurses_into_nested_mappings() {
  let mapping = json!({"outer": [{"inner": {"@path": "$.a", "bad": 1}}]});
  assert!(validate(&mapping).is_err());
}

#[test]
fn unknown_directive_is_an_error() {
  let err = transform(&json!({"@nope": 1}), &json!({})).unwrap_err();
  assert!(matches!(err, MappingError::UnknownDirective { name } if name == "@nope"));
}

#[test]
fn path_single_match_returns_the_value() {
  let mapping = json!({"v": {"@path": "$.foo.bar"}});
  let out = transform(&mapping, &json!({"foo": {"bar": 42}})).unwrap();
  assert_eq!(out, json!({"v": 42}));
}

#[test]
fn path_descent_collects_all_matches() {
  let mapping = json!({"v": {"@path": "$.foo..bar"}});
  let out = transform(&mapping, &json!({"foo": [{"bar": 1}, {"bar": 2}]})).unwrap();
  assert_eq!(out, json!({"v": [1, 2]}));
}

#[test]
fn path_requires_a_string_expression() {
  let err = transform(&json!({"@path": 5}), &json!({})).unwrap_err();
  assert!(matches!(err, MappingError::InvalidArgument { directive: "@path", .. }));
}

#[test]
fn template_interpolates_and_blanks_unresolved() {
  let mapping = json!({"s": {"@template": "hi {{ name }}{{ missing }}"}});
  let out = transform(&mapping, &json!({"name": "Ada"})).unwrap();
  assert_eq!(out, json!({"s": "hi Ada"}));
}

#[test]
fn template_escaping_is_off_by_default_and_opt_in() {
  let mapping = json!({"note": {"@template": "<b>{{ name }}</b>"}});
  let payload = json!({"name": "a < b"});

  // Default: interpolated values render verbatim.
  let raw = transform(&mapping, &payload).unwrap();
  assert_eq!(raw, json!({"note": "<b>a < b</b>"}));

  // Opt in: interpolations are HTML-escaped, template text is untouched.
  let options = ResolveOptions {
    escaping: Escaping::Html,
  };
  let escaped = transform_with(&mapping, &payload, &options).unwrap();
  assert_eq!(escaped, json!({"note": "<b>a &lt; b</b>"}));
}

#[test]
fn template_rejects_malformed_syntax() {
  let err = transform(&json!({"@template": "{{ broken"}), &json!({})).unwrap_err();
  assert!(matches!(err, MappingError::Template { .. }));
}

#[test]
fn if_exists_picks_branches() {
  let mapping = json!({"@if": {"exists": {"@path": "$.a"}, "then": "yes", "else": "no"}});
  assert_eq!(transform(&mapping, &json!({"a": 0})).unwrap(), json!("yes"));
  assert_eq!(transform(&mapping, &json!({})).unwrap(), json!("no"));
  assert_eq!(transform(&mapping, &json!({"a": null})).unwrap(), json!("no"));
}

#[test]
fn if_true_compares_stringified_lowercase() {
  let mapping = json!({"@if": {"true": {"@path": "$.flag"}, "then": 1, "else": 2}});
  assert_eq!(transform(&mapping, &json!({"flag": true})).unwrap(), json!(1));
  assert_eq!(transform(&mapping, &json!({"flag": "TRUE"})).unwrap(), json!(1));
  assert_eq!(transform(&mapping, &json!({"flag": "nope"})).unwrap(), json!(2));
}

#[test]
fn if_without_condition_is_an_error() {
  let err = transform(&json!({"@if": {"then": 1}}), &json!({})).unwrap_err();
  assert!(matches!(err, MappingError::InvalidArgument { directive: "@if", .. }));
}

#[test]
fn merge_later_keys_win() {
  let mapping = json!({"@merge": [{"cool": true}, {"cool": "you bet"}]});
  assert_eq!(transform(&mapping, &json!({})).unwrap(), json!({"cool": "you bet"}));
}

#[test]
fn merge_rejects_non_object_elements() {
  let err = transform(&json!({"@merge": [{"a": 1}, 5]}), &json!({})).unwrap_err();
  assert!(matches!(err, MappingError::InvalidArgument { directive: "@merge", .. }));
}

#[test]
fn pick_projects_fields() {
  let mapping = json!({"@pick": {"object": {"@root": true}, "fields": ["a"]}});
  let out = transform(&mapping, &json!({"a": 1, "b": 2})).unwrap();
  assert_eq!(out, json!({"a": 1}));
}

#[test]
fn omit_strips_fields_without_mutating_the_source() {
  let payload = json!({"a": 1, "b": 2});
  let mapping = json!({"@omit": {"object": {"@root": true}, "fields": ["b"]}});
  let out = transform(&mapping, &payload).unwrap();
  assert_eq!(out, json!({"a": 1}));
  // The caller's object is untouched.
  assert_eq!(payload, json!({"a": 1, "b": 2}));
}

#[test]
fn pick_rejects_bad_arguments() {
  let err = transform(
    &json!({"@pick": {"object": "not an object", "fields": ["a"]}}),
    &json!({}),
  )
  .unwrap_err();
  assert!(matches!(err, MappingError::InvalidArgument { directive: "@pick", .. }));

  let err = transform(
    &json!({"@pick": {"object": {"@root": true}, "fields": "a"}}),
    &json!({}),
  )
  .unwrap_err();
  assert!(matches!(err, MappingError::InvalidArgument { directive: "@pick", .. }));
}

#[test]
fn timestamp_rerenders_and_downgrades_unparsable_to_null() {
  let mapping = json!({"@timestamp": {"timestamp": {"@path": "$.ts"}, "format": "YYYY-MM-DD"}});
  assert_eq!(
    transform(&mapping, &json!({"ts": "2021-03-04T05:06:07Z"})).unwrap(),
    json!("2021-03-04")
  );
  assert_eq!(transform(&mapping, &json!({"ts": "garbage"})).unwrap(), json!(null));
}

#[test]
fn timestamp_requires_string_arguments() {
  let mapping = json!({"@timestamp": {"timestamp": 123, "format": "json"}});
  let err = transform(&mapping, &json!({})).unwrap_err();
  assert!(matches!(err, MappingError::InvalidArgument { directive: "@timestamp", .. }));
}

#[test]
fn base64_and_lowercase_round_simple_strings() {
  assert_eq!(
    transform(&json!({"@base64": "hello"}), &json!({})).unwrap(),
    json!("aGVsbG8=")
  );
  assert_eq!(
    transform(&json!({"@lowercase": "HeLLo"}), &json!({})).unwrap(),
    json!("hello")
  );
  assert!(transform(&json!({"@lowercase": 5}), &json!({})).is_err());
}

#[test]
fn root_returns_the_whole_payload() {
  let payload = json!({"a": {"b": 1}});
  assert_eq!(transform(&json!({"@root": ""}), &payload).unwrap(), payload);
}

#[test]
fn json_stringifies_its_argument() {
  let out = transform(&json!({"@json": {"@root": true}}), &json!({"a": 1})).unwrap();
  assert_eq!(out, json!("{\"a\":1}"));
}

#[test]
fn uuid_generates_fresh_identifiers() {
  let a = transform(&json!({"@uuid": ""}), &json!({})).unwrap();
  let b = transform(&json!({"@uuid": ""}), &json!({})).unwrap();
  assert_ne!(a, b);
  assert_eq!(a.as_str().unwrap().len(), 36);
}

#[test]
fn arrays_resolve_element_wise() {
  let mapping = json!([{"@path": "$.a"}, "literal", {"@path": "$.missing"}]);
  let resolved = resolve(&mapping, &json!({"a": 1})).unwrap().unwrap();
  // Absent array elements render as null; arrays have no holes.
  assert_eq!(resolved, json!([1, "literal", null]));
}

#[test]
fn nested_directives_resolve_before_the_outer_one() {
  let mapping = json!({"@lowercase": {"@template": "{{ name }}-X"}});
  let out = transform(&mapping, &json!({"name": "ADA"})).unwrap();
  assert_eq!(out, json!("ada-x"));
}

#[test]
fn settings_style_mappings_resolve_like_payloads() {
  // Settings may source values from the event the same way payload mappings do.
  let settings_mapping = json!({"apiKey": {"@path": "$.context.key"}, "region": "us"});
  let out = transform(&settings_mapping, &json!({"context": {"key": "k-1"}})).unwrap();
  assert_eq!(out, json!({"apiKey": "k-1", "region": "us"}));
}

#[test]
fn resolve_models_absence_as_none() {
  let resolved = resolve(&json!({"@path": "$.nope"}), &json!({})).unwrap();
  assert_eq!(resolved, None::<Value>);
}

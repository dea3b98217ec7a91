//! Example payloads and test cases derived from a [`SchemaModel`].
//!
//! Everything here is a pure function of the schema and the options: no
//! clock, no randomness, no I/O. Generating twice from the same schema
//! yields identical artifacts, so regenerated docs diff cleanly.

use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::schema::{display_value, format_number, Property, PropertySpec, PropertyType, SchemaModel};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_ENUM_CAP: usize = 4;

const EXTRA_FIELD: &str = "unexpected_field";
const SUCCESS_STATUS: u16 = 200;
const FAILURE_STATUS: u16 = 400;

pub type Body = Map<String, Value>;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A request as a caller would issue it. Rendering (curl, fetch, ...) is
/// left to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub method: String,
    pub url: String,
    pub headers: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Example {
    pub name: String,
    pub description: String,
    pub body: Body,
    pub invocation: Invocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    Success,
    MissingRequired,
    WrongType,
    InvalidEnum,
    BoundaryAt,
    BoundaryPast,
    EmptyBody,
    NullValue,
    ExtraField,
}

impl CaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaseKind::Success => "success",
            CaseKind::MissingRequired => "missing_required",
            CaseKind::WrongType => "wrong_type",
            CaseKind::InvalidEnum => "invalid_enum",
            CaseKind::BoundaryAt => "boundary_at",
            CaseKind::BoundaryPast => "boundary_past",
            CaseKind::EmptyBody => "empty_body",
            CaseKind::NullValue => "null_value",
            CaseKind::ExtraField => "extra_field",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Success,
    Failure,
}

impl Expectation {
    pub fn status(self) -> u16 {
        match self {
            Expectation::Success => SUCCESS_STATUS,
            Expectation::Failure => FAILURE_STATUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub kind: CaseKind,
    /// Property the case exercises, when it exercises one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub input: Body,
    pub expected: Expectation,
    pub expected_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TestCase {
    fn new(name: String, kind: CaseKind, target: Option<&str>, input: Body, expected: Expectation) -> Self {
        TestCase {
            name,
            kind,
            target: target.map(str::to_string),
            input,
            expected,
            expected_status: expected.status(),
            note: None,
        }
    }
}

/// One row of a parameter table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PropertyType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedArtifacts {
    pub endpoint: String,
    pub method: String,
    pub parameters: Vec<Parameter>,
    pub examples: Vec<Example>,
    pub test_cases: Vec<TestCase>,
}

impl GeneratedArtifacts {
    pub fn cases_of(&self, kind: CaseKind) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(move |c| c.kind == kind)
    }
}

// ---------------------------------------------------------------------------
// Value synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Default,
    Alternate,
    Min,
    Max,
    /// Arrays carry two items instead of one.
    Multiple,
}

/// Synthesize a value for one property.
pub fn synthesize(name: &str, spec: &PropertySpec, variant: Variant) -> Value {
    if let Some(values) = spec.enum_choices() {
        return match variant {
            Variant::Alternate => values.get(1).unwrap_or(&values[0]).clone(),
            _ => values[0].clone(),
        };
    }
    if let Some(c) = &spec.const_value {
        return c.clone();
    }
    if variant == Variant::Default {
        if let Some(d) = &spec.default {
            return d.clone();
        }
    }

    match spec.ty {
        PropertyType::String => Value::String(string_value(name, spec, variant)),
        PropertyType::Number | PropertyType::Integer => number_value(numeric(spec, variant)),
        PropertyType::Boolean => {
            let base = spec.default.as_ref().and_then(Value::as_bool).unwrap_or(true);
            Value::Bool(if variant == Variant::Alternate { !base } else { base })
        }
        PropertyType::Array => {
            let fallback = PropertySpec::default();
            let item = spec.items.as_deref().unwrap_or(&fallback);
            let item_name = format!("{name}_item");
            let values = match variant {
                Variant::Multiple => vec![
                    synthesize(&item_name, item, Variant::Default),
                    synthesize(&item_name, item, Variant::Alternate),
                ],
                Variant::Alternate => vec![synthesize(&item_name, item, Variant::Alternate)],
                _ => vec![synthesize(&item_name, item, Variant::Default)],
            };
            Value::Array(values)
        }
        PropertyType::Object => Value::Object(
            spec.properties
                .iter()
                .map(|p| (p.name.clone(), synthesize(&p.name, &p.spec, variant)))
                .collect(),
        ),
    }
}

fn string_value(name: &str, spec: &PropertySpec, variant: Variant) -> String {
    match variant {
        Variant::Min if spec.min_length.is_some() => {
            return "x".repeat(spec.min_length.unwrap_or_default())
        }
        Variant::Max if spec.max_length.is_some() => {
            return "x".repeat(spec.max_length.unwrap_or_default())
        }
        _ => {}
    }
    let alternate = variant == Variant::Alternate;
    let value = name_hint(name, alternate).map(str::to_string).unwrap_or_else(|| {
        if alternate {
            format!("alt-{name}")
        } else {
            format!("example-{name}")
        }
    });
    fit_length(value, spec.min_length, spec.max_length)
}

fn fit_length(mut value: String, min: Option<usize>, max: Option<usize>) -> String {
    if let Some(max) = max {
        value = value.chars().take(max).collect();
    }
    if let Some(min) = min {
        let len = value.chars().count();
        if len < min {
            value.push_str(&"x".repeat(min - len));
        }
    }
    value
}

/// Split `userEmail` / `user_email` / `user-email` into lowercase words.
fn name_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn name_hint(name: &str, alternate: bool) -> Option<&'static str> {
    let words = name_words(name);
    let any = |pred: fn(&str) -> bool| words.iter().any(|w| pred(w));
    let pick = |default: &'static str, alt: &'static str| Some(if alternate { alt } else { default });

    if any(|w| w.contains("email")) {
        pick("user@example.com", "admin@test.org")
    } else if any(|w| w == "url" || w == "uri" || w == "link" || w == "href") {
        pick("https://example.com", "https://test.org/page")
    } else if any(|w| w == "id" || w == "uuid") {
        pick("abc123", "xyz789")
    } else if any(|w| w.ends_with("name")) {
        pick("Example Name", "Test User")
    } else if any(|w| w == "model") {
        pick("gpt-4o", "claude-3-opus")
    } else if any(|w| w == "prompt" || w == "message" || w == "content") {
        pick("Hello, how can I help you?", "Explain quantum computing")
    } else if any(|w| w == "query" || w == "search") {
        pick("search term", "alternative query")
    } else {
        None
    }
}

fn numeric(spec: &PropertySpec, variant: Variant) -> f64 {
    let integer = spec.ty == PropertyType::Integer;
    let (placeholder, alt_placeholder) = if integer { (100.0, 50.0) } else { (42.0, 100.0) };
    let base = spec
        .default
        .as_ref()
        .and_then(Value::as_f64)
        .unwrap_or(placeholder);

    let raw = match variant {
        Variant::Min => return spec.minimum.unwrap_or_else(|| clamp(base, spec)),
        Variant::Max => return spec.maximum.unwrap_or_else(|| clamp(base, spec)),
        Variant::Alternate => match (spec.minimum, spec.maximum) {
            (Some(lo), Some(hi)) if hi > lo => ((lo + hi) / 2.0).floor(),
            _ => alt_placeholder,
        },
        Variant::Default | Variant::Multiple => base,
    };
    clamp(raw, spec)
}

fn clamp(n: f64, spec: &PropertySpec) -> f64 {
    let mut n = n;
    if let Some(lo) = spec.minimum {
        n = n.max(lo);
    }
    if let Some(hi) = spec.maximum {
        n = n.min(hi);
    }
    n
}

/// Integral values serialize without a fractional part.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// A value of a different JSON type than the property declares.
fn wrong_type_value(ty: PropertyType) -> Value {
    match ty {
        PropertyType::String => Value::from(12345),
        PropertyType::Number | PropertyType::Integer => Value::from("not-a-number"),
        PropertyType::Boolean => Value::from("not-a-boolean"),
        PropertyType::Array => Value::from("not-an-array"),
        PropertyType::Object => Value::from("not-an-object"),
    }
}

fn invalid_enum_value(name: &str, choices: &[Value]) -> Value {
    let mut candidate = format!("invalid-{name}");
    while choices.iter().any(|c| c.as_str() == Some(candidate.as_str())) {
        candidate.push_str("-x");
    }
    Value::String(candidate)
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub endpoint: String,
    pub method: String,
    pub base_url: String,
    pub api_prefix: String,
    pub enum_cap: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        GeneratorOptions::from_config(&GeneratorConfig::default(), "")
    }
}

impl GeneratorOptions {
    pub fn from_config(cfg: &GeneratorConfig, endpoint: &str) -> Self {
        GeneratorOptions {
            endpoint: endpoint.to_string(),
            method: "POST".to_string(),
            base_url: cfg.base_url.clone(),
            api_prefix: cfg.api_prefix.clone(),
            enum_cap: cfg.enum_cap,
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.trim().to_ascii_uppercase();
        self
    }

    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let endpoint = self.endpoint.trim_matches('/');
        [base, prefix, endpoint]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("/")
    }

    fn body_in_query(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "DELETE" | "HEAD")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generator {
    options: GeneratorOptions,
}

/// Generate with default options.
pub fn generate(schema: &SchemaModel) -> Result<GeneratedArtifacts> {
    Generator::default().generate(schema)
}

impl Generator {
    pub fn new(options: GeneratorOptions) -> Self {
        Generator { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Validate the schema, then derive parameters, examples and test cases.
    pub fn generate(&self, schema: &SchemaModel) -> Result<GeneratedArtifacts> {
        schema.validate()?;

        let examples = self.examples(schema);
        let test_cases = self.test_cases(schema, &examples);
        tracing::debug!(
            endpoint = %self.options.endpoint,
            examples = examples.len(),
            test_cases = test_cases.len(),
            "generated artifacts"
        );

        Ok(GeneratedArtifacts {
            endpoint: self.options.endpoint.clone(),
            method: self.options.method.clone(),
            parameters: parameters(schema),
            examples,
            test_cases,
        })
    }

    pub fn invocation(&self, body: &Body) -> Invocation {
        let method = self.options.method.clone();
        let url = self.options.url();
        if self.options.body_in_query() {
            let query = body
                .iter()
                .map(|(k, v)| Param::new(k.clone(), display_value(v)))
                .collect();
            return Invocation {
                method,
                url,
                headers: Vec::new(),
                body: None,
                query,
            };
        }
        Invocation {
            method,
            url,
            headers: vec![Param::new("Content-Type", "application/json")],
            body: Some(Value::Object(body.clone())),
            query: Vec::new(),
        }
    }

    fn example(&self, name: impl Into<String>, description: impl Into<String>, body: Body) -> Example {
        Example {
            name: name.into(),
            description: description.into(),
            invocation: self.invocation(&body),
            body,
        }
    }

    fn examples(&self, schema: &SchemaModel) -> Vec<Example> {
        let mut out = Vec::new();
        let props = &schema.properties;
        let minimal = minimal_body(schema);

        if !schema.required.is_empty() {
            out.push(self.example("minimal", "Required fields only", minimal.clone()));
        }
        if props.is_empty() {
            return out;
        }
        out.push(self.example(
            "full",
            "All fields",
            body_of(props, |_| Variant::Default),
        ));

        let cap = self.options.enum_cap.max(1);
        for prop in props {
            let Some(choices) = prop.spec.enum_choices() else {
                continue;
            };
            for value in choices.iter().take(cap) {
                let mut body = minimal.clone();
                body.insert(prop.name.clone(), value.clone());
                let shown = display_value(value);
                out.push(self.example(
                    format!("{}={shown}", prop.name),
                    format!("{} set to {shown}", prop.name),
                    body,
                ));
            }
        }

        out.push(self.example(
            "alternate",
            "Every field set to an alternate value",
            body_of(props, |_| Variant::Alternate),
        ));

        if props.iter().any(|p| p.spec.ty == PropertyType::Array) {
            out.push(self.example(
                "array-multiple",
                "Array fields carry two items",
                body_of(props, |spec| {
                    if spec.ty == PropertyType::Array {
                        Variant::Multiple
                    } else {
                        Variant::Default
                    }
                }),
            ));
        }

        if props.iter().any(|p| p.spec.is_constrained()) {
            for (name, variant, label) in [
                ("boundary-min", Variant::Min, "minimum"),
                ("boundary-max", Variant::Max, "maximum"),
            ] {
                out.push(self.example(
                    name,
                    format!("Constrained fields at their {label}"),
                    body_of(props, |spec| {
                        if spec.is_constrained() {
                            variant
                        } else {
                            Variant::Default
                        }
                    }),
                ));
            }
        }
        out
    }

    fn test_cases(&self, schema: &SchemaModel, examples: &[Example]) -> Vec<TestCase> {
        let mut out: Vec<TestCase> = examples
            .iter()
            .map(|ex| {
                TestCase::new(
                    format!("valid: {}", ex.name),
                    CaseKind::Success,
                    None,
                    ex.body.clone(),
                    Expectation::Success,
                )
            })
            .collect();

        let minimal = minimal_body(schema);
        let with = |name: &str, value: Value| {
            let mut body = minimal.clone();
            body.insert(name.to_string(), value);
            body
        };

        for prop in schema.required_properties() {
            let mut body = minimal.clone();
            body.remove(&prop.name);
            out.push(TestCase::new(
                format!("missing required: {}", prop.name),
                CaseKind::MissingRequired,
                Some(prop.name.as_str()),
                body,
                Expectation::Failure,
            ));
        }

        for prop in &schema.properties {
            out.push(TestCase::new(
                format!("wrong type: {} ({})", prop.name, prop.spec.ty),
                CaseKind::WrongType,
                Some(prop.name.as_str()),
                with(&prop.name, wrong_type_value(prop.spec.ty)),
                Expectation::Failure,
            ));
        }

        for prop in &schema.properties {
            if let Some(choices) = prop.spec.enum_choices() {
                out.push(TestCase::new(
                    format!("invalid enum: {}", prop.name),
                    CaseKind::InvalidEnum,
                    Some(prop.name.as_str()),
                    with(&prop.name, invalid_enum_value(&prop.name, choices)),
                    Expectation::Failure,
                ));
            }
        }

        for prop in &schema.properties {
            for (label, value, kind) in boundary_points(&prop.spec) {
                let expected = if kind == CaseKind::BoundaryAt {
                    Expectation::Success
                } else {
                    Expectation::Failure
                };
                out.push(TestCase::new(
                    format!("boundary: {} {label}", prop.name),
                    kind,
                    Some(prop.name.as_str()),
                    with(&prop.name, value),
                    expected,
                ));
            }
        }

        let empty_expected = if schema.required.is_empty() {
            Expectation::Success
        } else {
            Expectation::Failure
        };
        out.push(TestCase::new(
            "empty body".to_string(),
            CaseKind::EmptyBody,
            None,
            Body::new(),
            empty_expected,
        ));

        for prop in schema.required_properties() {
            out.push(TestCase::new(
                format!("null value: {}", prop.name),
                CaseKind::NullValue,
                Some(prop.name.as_str()),
                with(&prop.name, Value::Null),
                Expectation::Failure,
            ));
        }

        let extra = extra_field_name(schema);
        let mut case = TestCase::new(
            format!("extra field: {extra}"),
            CaseKind::ExtraField,
            Some(extra.as_str()),
            with(&extra, Value::from("extra")),
            Expectation::Success,
        );
        case.note = Some("passes unless the endpoint rejects unknown keys".to_string());
        out.push(case);

        out
    }
}

fn body_of(props: &[Property], variant_for: impl Fn(&PropertySpec) -> Variant) -> Body {
    props
        .iter()
        .map(|p| (p.name.clone(), synthesize(&p.name, &p.spec, variant_for(&p.spec))))
        .collect()
}

fn minimal_body(schema: &SchemaModel) -> Body {
    schema
        .required_properties()
        .map(|p| (p.name.clone(), synthesize(&p.name, &p.spec, Variant::Default)))
        .collect()
}

/// At-boundary and one-past-boundary points, in min-then-max order.
fn boundary_points(spec: &PropertySpec) -> Vec<(String, Value, CaseKind)> {
    let mut out = Vec::new();
    if spec.has_numeric_bounds() {
        if let Some(min) = spec.minimum {
            out.push((format!("at minimum ({})", format_number(min)), number_value(min), CaseKind::BoundaryAt));
            out.push((format!("below minimum ({})", format_number(min - 1.0)), number_value(min - 1.0), CaseKind::BoundaryPast));
        }
        if let Some(max) = spec.maximum {
            out.push((format!("at maximum ({})", format_number(max)), number_value(max), CaseKind::BoundaryAt));
            out.push((format!("above maximum ({})", format_number(max + 1.0)), number_value(max + 1.0), CaseKind::BoundaryPast));
        }
    } else if spec.has_length_bounds() {
        if let Some(min) = spec.min_length {
            out.push((format!("at min length ({min})"), Value::String("x".repeat(min)), CaseKind::BoundaryAt));
            if min > 0 {
                out.push((format!("below min length ({})", min - 1), Value::String("x".repeat(min - 1)), CaseKind::BoundaryPast));
            }
        }
        if let Some(max) = spec.max_length {
            out.push((format!("at max length ({max})"), Value::String("x".repeat(max)), CaseKind::BoundaryAt));
            let past = max.saturating_add(1);
            out.push((format!("above max length ({past})"), Value::String("x".repeat(past)), CaseKind::BoundaryPast));
        }
    }
    out
}

fn extra_field_name(schema: &SchemaModel) -> String {
    let mut name = EXTRA_FIELD.to_string();
    while schema.property(&name).is_some() {
        name.insert(0, '_');
    }
    name
}

fn parameters(schema: &SchemaModel) -> Vec<Parameter> {
    schema
        .properties
        .iter()
        .map(|p| Parameter {
            name: p.name.clone(),
            ty: p.spec.ty,
            required: schema.is_required(&p.name),
            description: p.spec.description.clone(),
            default: p.spec.default.clone(),
            constraints: p.spec.constraint_summary(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use serde_json::json;

    fn schema(value: Value) -> SchemaModel {
        SchemaModel::from_json_value(&value).unwrap()
    }

    fn success_inputs(out: &GeneratedArtifacts) -> Vec<&Body> {
        out.cases_of(CaseKind::Success).map(|c| &c.input).collect()
    }

    #[test]
    fn single_required_string() {
        let s = schema(json!({
            "properties": {"domain": {"type": "string"}},
            "required": ["domain"]
        }));
        let out = generate(&s).unwrap();

        let minimal = &out.examples[0];
        assert_eq!(minimal.name, "minimal");
        assert_eq!(Value::Object(minimal.body.clone()), json!({"domain": "example-domain"}));

        let valid = out.cases_of(CaseKind::Success).next().unwrap();
        assert_eq!(valid.expected_status, 200);
        assert_eq!(valid.input, minimal.body);

        let missing: Vec<_> = out.cases_of(CaseKind::MissingRequired).collect();
        assert_eq!(missing.len(), 1);
        assert!(missing[0].input.get("domain").is_none());
        assert_eq!(missing[0].expected, Expectation::Failure);
        assert_eq!(missing[0].expected_status, 400);
    }

    #[test]
    fn optional_enum_gets_one_success_per_value() {
        let s = schema(json!({
            "properties": {"mode": {"type": "string", "enum": ["full", "logo"]}}
        }));
        let out = generate(&s).unwrap();
        let inputs = success_inputs(&out);
        let full = inputs.iter().filter(|b| b.len() == 1 && b["mode"] == json!("full"));
        let logo = inputs.iter().filter(|b| b.len() == 1 && b["mode"] == json!("logo"));
        assert!(full.count() >= 1);
        assert!(logo.count() >= 1);
        assert!(out.examples.iter().any(|e| e.name == "mode=full"));
        assert!(out.examples.iter().any(|e| e.name == "mode=logo"));
        // nothing required: no minimal example and the empty body is valid
        assert!(out.examples.iter().all(|e| e.name != "minimal"));
        let empty = out.cases_of(CaseKind::EmptyBody).next().unwrap();
        assert_eq!(empty.expected, Expectation::Success);
    }

    #[test]
    fn numeric_boundaries() {
        let s = schema(json!({
            "properties": {"count": {"type": "integer", "minimum": 1, "maximum": 10}},
            "required": ["count"]
        }));
        let out = generate(&s).unwrap();
        let points: Vec<(Value, Expectation)> = out
            .test_cases
            .iter()
            .filter(|c| matches!(c.kind, CaseKind::BoundaryAt | CaseKind::BoundaryPast))
            .map(|c| (c.input["count"].clone(), c.expected))
            .collect();
        assert_eq!(
            points,
            vec![
                (json!(1), Expectation::Success),
                (json!(0), Expectation::Failure),
                (json!(10), Expectation::Success),
                (json!(11), Expectation::Failure),
            ]
        );

        let min = out.examples.iter().find(|e| e.name == "boundary-min").unwrap();
        let max = out.examples.iter().find(|e| e.name == "boundary-max").unwrap();
        assert_eq!(min.body["count"], json!(1));
        assert_eq!(max.body["count"], json!(10));
    }

    #[test]
    fn numeric_values_stay_in_range() {
        let s = schema(json!({
            "properties": {"ratio": {"type": "number", "minimum": 0.5, "maximum": 2}}
        }));
        let out = generate(&s).unwrap();
        for ex in &out.examples {
            let v = ex.body["ratio"].as_f64().unwrap();
            assert!((0.5..=2.0).contains(&v), "{} out of range in {}", v, ex.name);
        }
    }

    #[test]
    fn string_length_boundaries() {
        let s = schema(json!({
            "properties": {"code": {"type": "string", "minLength": 2, "maxLength": 4}}
        }));
        let out = generate(&s).unwrap();
        let lens: Vec<(usize, Expectation)> = out
            .test_cases
            .iter()
            .filter(|c| c.target.as_deref() == Some("code"))
            .filter(|c| matches!(c.kind, CaseKind::BoundaryAt | CaseKind::BoundaryPast))
            .map(|c| (c.input["code"].as_str().unwrap().len(), c.expected))
            .collect();
        assert_eq!(
            lens,
            vec![
                (2, Expectation::Success),
                (1, Expectation::Failure),
                (4, Expectation::Success),
                (5, Expectation::Failure),
            ]
        );
        let full = out.examples.iter().find(|e| e.name == "full").unwrap();
        let len = full.body["code"].as_str().unwrap().len();
        assert!((2..=4).contains(&len));
    }

    #[test]
    fn generation_is_deterministic() {
        let s = schema(json!({
            "properties": {
                "email": {"type": "string"},
                "mode": {"enum": ["a", "b", "c"]},
                "tags": {"type": "array", "items": {"type": "string"}},
                "limit": {"type": "integer", "minimum": 1, "maximum": 50}
            },
            "required": ["email", "limit"]
        }));
        let first = generate(&s).unwrap();
        let second = generate(&s).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn every_required_field_has_one_missing_and_one_null_case() {
        let s = schema(json!({
            "properties": {
                "a": {"type": "string"},
                "b": {"type": "integer"},
                "c": {"type": "boolean"}
            },
            "required": ["a", "c"]
        }));
        let out = generate(&s).unwrap();
        for name in ["a", "c"] {
            let missing: Vec<_> = out
                .cases_of(CaseKind::MissingRequired)
                .filter(|c| c.target.as_deref() == Some(name))
                .collect();
            let null: Vec<_> = out
                .cases_of(CaseKind::NullValue)
                .filter(|c| c.target.as_deref() == Some(name))
                .collect();
            assert_eq!(missing.len(), 1);
            assert_eq!(null.len(), 1);
            assert!(!missing[0].input.contains_key(name));
            assert_eq!(null[0].input[name], Value::Null);
            assert_eq!(missing[0].expected, Expectation::Failure);
            assert_eq!(null[0].expected, Expectation::Failure);
        }
        assert_eq!(out.cases_of(CaseKind::MissingRequired).count(), 2);
        assert_eq!(out.cases_of(CaseKind::NullValue).count(), 2);
    }

    #[test]
    fn undeclared_required_field_fails_closed() {
        let s = schema(json!({
            "properties": {"a": {"type": "string"}},
            "required": ["b"]
        }));
        assert!(generate(&s).is_err());
    }

    #[test]
    fn huge_length_bound_fails_closed() {
        let s = schema(json!({
            "properties": {"name": {"type": "string", "maxLength": u64::MAX}},
            "required": ["name"]
        }));
        let err = generate(&s).unwrap_err();
        assert!(matches!(err, FlowError::InvalidSchema(_)));
    }

    #[test]
    fn single_value_enum_gets_its_example() {
        let s = schema(json!({
            "properties": {"version": {"type": "string", "enum": ["v2"]}}
        }));
        let out = generate(&s).unwrap();
        let names: Vec<&str> = out.examples.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"version=v2"));
        assert!(out
            .cases_of(CaseKind::Success)
            .any(|c| c.input.get("version") == Some(&json!("v2"))));
    }

    #[test]
    fn wrong_type_changes_json_type() {
        let s = schema(json!({
            "properties": {
                "s": {"type": "string"},
                "n": {"type": "number"},
                "flag": {"type": "boolean"},
                "list": {"type": "array"},
                "obj": {"type": "object"}
            }
        }));
        let out = generate(&s).unwrap();
        let wrong: Vec<_> = out.cases_of(CaseKind::WrongType).collect();
        assert_eq!(wrong.len(), 5);
        assert!(wrong[0].input["s"].is_number());
        assert!(wrong[1].input["n"].is_string());
        assert!(wrong[2].input["flag"].is_string());
        assert!(wrong[3].input["list"].is_string());
        assert!(wrong[4].input["obj"].is_string());
    }

    #[test]
    fn enum_values_are_capped() {
        let s = schema(json!({
            "properties": {"size": {"enum": ["xs", "s", "m", "l", "xl", "xxl"]}}
        }));
        let out = generate(&s).unwrap();
        let per_value = out
            .examples
            .iter()
            .filter(|e| e.name.starts_with("size="))
            .count();
        assert_eq!(per_value, DEFAULT_ENUM_CAP);

        let invalid = out.cases_of(CaseKind::InvalidEnum).next().unwrap();
        assert_eq!(invalid.input["size"], json!("invalid-size"));
        assert_eq!(invalid.expected, Expectation::Failure);
    }

    #[test]
    fn name_hints_and_placeholders() {
        assert_eq!(
            synthesize("userEmail", &PropertySpec::default(), Variant::Default),
            json!("user@example.com")
        );
        assert_eq!(
            synthesize("callback_url", &PropertySpec::default(), Variant::Alternate),
            json!("https://test.org/page")
        );
        assert_eq!(
            synthesize("providerId", &PropertySpec::default(), Variant::Default),
            json!("abc123")
        );
        // "provider" contains "id" but is not an id field
        assert_eq!(
            synthesize("provider", &PropertySpec::default(), Variant::Default),
            json!("example-provider")
        );
        assert_eq!(
            synthesize("provider", &PropertySpec::default(), Variant::Alternate),
            json!("alt-provider")
        );
    }

    #[test]
    fn defaults_and_alternates() {
        let mut flag = PropertySpec::new(PropertyType::Boolean);
        assert_eq!(synthesize("f", &flag, Variant::Default), json!(true));
        assert_eq!(synthesize("f", &flag, Variant::Alternate), json!(false));
        flag.default = Some(json!(false));
        assert_eq!(synthesize("f", &flag, Variant::Default), json!(false));
        assert_eq!(synthesize("f", &flag, Variant::Alternate), json!(true));

        let int = PropertySpec::new(PropertyType::Integer);
        assert_eq!(synthesize("n", &int, Variant::Default), json!(100));
        assert_eq!(synthesize("n", &int, Variant::Alternate), json!(50));
        let num = PropertySpec::new(PropertyType::Number);
        assert_eq!(synthesize("n", &num, Variant::Default), json!(42));

        let mut lit = PropertySpec::new(PropertyType::String);
        lit.const_value = Some(json!("v2"));
        assert_eq!(synthesize("version", &lit, Variant::Alternate), json!("v2"));
    }

    #[test]
    fn arrays_and_objects() {
        let s = schema(json!({
            "properties": {
                "tags": {"type": "array", "items": {"type": "string"}},
                "meta": {"type": "object", "properties": {"limit": {"type": "integer"}}}
            }
        }));
        let out = generate(&s).unwrap();
        let full = out.examples.iter().find(|e| e.name == "full").unwrap();
        assert_eq!(full.body["tags"], json!(["example-tags_item"]));
        assert_eq!(full.body["meta"], json!({"limit": 100}));

        let multi = out.examples.iter().find(|e| e.name == "array-multiple").unwrap();
        assert_eq!(multi.body["tags"], json!(["example-tags_item", "alt-tags_item"]));
    }

    #[test]
    fn extra_field_is_annotated() {
        let s = schema(json!({"properties": {"a": {"type": "string"}}, "required": ["a"]}));
        let out = generate(&s).unwrap();
        let extra = out.cases_of(CaseKind::ExtraField).next().unwrap();
        assert_eq!(extra.expected, Expectation::Success);
        assert!(extra.note.is_some());
        assert_eq!(extra.input["unexpected_field"], json!("extra"));
        assert_eq!(extra.input["a"], json!("example-a"));
    }

    #[test]
    fn case_order_follows_kind_sequence() {
        let s = schema(json!({
            "properties": {
                "mode": {"enum": ["a", "b"]},
                "count": {"type": "integer", "minimum": 1}
            },
            "required": ["count"]
        }));
        let out = generate(&s).unwrap();
        let order = [
            CaseKind::Success,
            CaseKind::MissingRequired,
            CaseKind::WrongType,
            CaseKind::InvalidEnum,
            CaseKind::BoundaryAt,
            CaseKind::BoundaryPast,
            CaseKind::EmptyBody,
            CaseKind::NullValue,
            CaseKind::ExtraField,
        ];
        let rank = |k: CaseKind| {
            // at/past interleave, so they share a rank
            let r = order.iter().position(|o| *o == k).unwrap();
            if k == CaseKind::BoundaryPast { r - 1 } else { r }
        };
        let ranks: Vec<usize> = out.test_cases.iter().map(|c| rank(c.kind)).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn invocation_shapes() {
        let s = schema(json!({"properties": {"q": {"type": "string"}}, "required": ["q"]}));
        let opts = GeneratorOptions {
            endpoint: "search".into(),
            ..GeneratorOptions::default()
        };
        let post = Generator::new(opts.clone()).generate(&s).unwrap();
        let inv = &post.examples[0].invocation;
        assert_eq!(inv.method, "POST");
        assert_eq!(inv.url, "http://localhost:3001/api/v2/search");
        assert_eq!(inv.body, Some(json!({"q": "example-q"})));
        assert!(inv.query.is_empty());

        let get = Generator::new(opts.with_method("get")).generate(&s).unwrap();
        let inv = &get.examples[0].invocation;
        assert_eq!(inv.method, "GET");
        assert!(inv.body.is_none());
        assert_eq!(inv.query, vec![Param::new("q", "example-q")]);
    }

    #[test]
    fn parameter_table_rows() {
        let s = schema(json!({
            "properties": {
                "count": {"type": "integer", "minimum": 1, "maximum": 10, "description": "How many"}
            },
            "required": ["count"]
        }));
        let out = generate(&s).unwrap();
        assert_eq!(out.parameters.len(), 1);
        let row = &out.parameters[0];
        assert!(row.required);
        assert_eq!(row.description.as_deref(), Some("How many"));
        assert_eq!(row.constraints, vec!["min 1", "max 10"]);
    }
}

//! Declarative request schema model.
//!
//! A [`SchemaModel`] is an ordered list of properties plus the names that
//! are required. It can be read from JSON-Schema-shaped JSON or YAML, or
//! scraped from Zod source. Parsing is lenient about shape; [`SchemaModel::validate`]
//! is the fail-fast gate the generator runs before producing anything.

use crate::error::{FlowError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Largest `minLength`/`maxLength` the generator will materialize.
pub const MAX_LENGTH_BOUND: usize = 1_000_000;

// ---------------------------------------------------------------------------
// PropertyType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    pub fn all() -> &'static [PropertyType] {
        &[
            PropertyType::String,
            PropertyType::Number,
            PropertyType::Integer,
            PropertyType::Boolean,
            PropertyType::Array,
            PropertyType::Object,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Integer => "integer",
            PropertyType::Boolean => "boolean",
            PropertyType::Array => "array",
            PropertyType::Object => "object",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, PropertyType::Number | PropertyType::Integer)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        PropertyType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| FlowError::InvalidSchema(format!("unknown property type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// PropertySpec / SchemaModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub ty: PropertyType,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySpec>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

impl PropertySpec {
    pub fn new(ty: PropertyType) -> Self {
        PropertySpec {
            ty,
            ..Default::default()
        }
    }

    /// Enum values when the property is a non-empty enum.
    pub fn enum_choices(&self) -> Option<&[Value]> {
        self.enum_values.as_deref().filter(|v| !v.is_empty())
    }

    pub fn has_numeric_bounds(&self) -> bool {
        self.ty.is_numeric() && (self.minimum.is_some() || self.maximum.is_some())
    }

    pub fn has_length_bounds(&self) -> bool {
        self.ty == PropertyType::String
            && self.enum_choices().is_none()
            && self.const_value.is_none()
            && (self.min_length.is_some() || self.max_length.is_some())
    }

    /// Whether the boundary variants and boundary test cases apply.
    pub fn is_constrained(&self) -> bool {
        self.has_numeric_bounds() || self.has_length_bounds()
    }

    /// Human-readable constraint summary for parameter tables.
    pub fn constraint_summary(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(values) = self.enum_choices() {
            let joined: Vec<String> = values.iter().map(display_value).collect();
            out.push(format!("one of: {}", joined.join(", ")));
        }
        if let Some(c) = &self.const_value {
            out.push(format!("must equal {}", display_value(c)));
        }
        if let Some(min) = self.minimum {
            out.push(format!("min {}", format_number(min)));
        }
        if let Some(max) = self.maximum {
            out.push(format!("max {}", format_number(max)));
        }
        if let Some(min) = self.min_length {
            out.push(format!("min length {min}"));
        }
        if let Some(max) = self.max_length {
            out.push(format!("max length {max}"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    #[serde(flatten)]
    pub spec: PropertySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaModel {
    pub properties: Vec<Property>,
    pub required: Vec<String>,
}

impl SchemaModel {
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.spec)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Required properties in declaration order.
    pub fn required_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| self.is_required(&p.name))
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Read a schema file, choosing the parser from the extension:
    /// `.json`, `.yaml`/`.yml`, and `.ts`/`.js` for Zod source.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Self::from_json_str(&text),
            "yaml" | "yml" => Self::from_yaml_str(&text),
            "ts" | "tsx" | "js" | "mjs" => Self::from_zod(&text),
            _ => Self::from_json_str(&text).or_else(|_| Self::from_yaml_str(&text)),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(&value)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_json_value(&value)
    }

    /// Build a model from a JSON-Schema-shaped object. Property order is the
    /// document order. A property may also mark itself with `required: true`.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FlowError::InvalidSchema("schema must be an object".into()))?;
        let props = match obj.get("properties") {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(FlowError::InvalidSchema(
                    "'properties' must be an object".into(),
                ))
            }
            None => {
                return Err(FlowError::InvalidSchema(
                    "schema must declare 'properties'".into(),
                ))
            }
        };

        let mut required = string_list(obj.get("required"), "required")?;
        for (name, prop) in props {
            if prop.get("required") == Some(&Value::Bool(true)) && !required.contains(name) {
                required.push(name.clone());
            }
        }

        Ok(SchemaModel {
            properties: parse_properties(props, "")?,
            required,
        })
    }

    /// Scrape `name: z.kind(args).chain()` fields out of Zod source.
    /// Nested object bodies are not descended into.
    pub fn from_zod(source: &str) -> Result<Self> {
        let mut model = SchemaModel::default();
        let mut seen = HashSet::new();

        for caps in zod_field_regex().captures_iter(source) {
            let name = &caps[1];
            if ZOD_SKIP.contains(&name) || !seen.insert(name.to_string()) {
                continue;
            }
            let spec = zod_property(&caps[2], &caps[3], &caps[4]);
            let chain = &caps[4];
            let optional = chain.contains(".optional()")
                || chain.contains(".nullish()")
                || chain.contains(".default(");
            if !optional {
                model.required.push(name.to_string());
            }
            model.properties.push(Property {
                name: name.to_string(),
                spec,
            });
        }

        if model.properties.is_empty() {
            return Err(FlowError::InvalidSchema(
                "no zod fields found in source".into(),
            ));
        }
        Ok(model)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Reject schemas the generator cannot faithfully cover.
    pub fn validate(&self) -> Result<()> {
        validate_properties(&self.properties, "")?;
        for name in &self.required {
            if self.property(name).is_none() {
                return Err(FlowError::InvalidSchema(format!(
                    "required field '{name}' is not a declared property"
                )));
            }
        }
        Ok(())
    }
}

fn validate_properties(props: &[Property], prefix: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for prop in props {
        let path = format!("{prefix}{}", prop.name);
        if !seen.insert(prop.name.as_str()) {
            return Err(FlowError::InvalidSchema(format!(
                "duplicate property '{path}'"
            )));
        }
        validate_spec(&prop.spec, &path)?;
    }
    Ok(())
}

fn validate_spec(spec: &PropertySpec, path: &str) -> Result<()> {
    if matches!(&spec.enum_values, Some(v) if v.is_empty()) {
        return Err(FlowError::InvalidSchema(format!(
            "'{path}' declares an empty enum"
        )));
    }
    if let (Some(min), Some(max)) = (spec.minimum, spec.maximum) {
        if min > max {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' has minimum {} above maximum {}",
                format_number(min),
                format_number(max)
            )));
        }
    }
    for (key, bound) in [("minLength", spec.min_length), ("maxLength", spec.max_length)] {
        if let Some(n) = bound.filter(|n| *n > MAX_LENGTH_BOUND) {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' {key} {n} exceeds the limit of {MAX_LENGTH_BOUND}"
            )));
        }
    }
    if let (Some(min), Some(max)) = (spec.min_length, spec.max_length) {
        if min > max {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' has minLength {min} above maxLength {max}"
            )));
        }
    }
    if let Some(items) = &spec.items {
        validate_spec(items, &format!("{path}[]"))?;
    }
    validate_properties(&spec.properties, &format!("{path}."))
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn parse_properties(map: &Map<String, Value>, prefix: &str) -> Result<Vec<Property>> {
    map.iter()
        .map(|(name, value)| {
            Ok(Property {
                name: name.clone(),
                spec: parse_spec(value, &format!("{prefix}{name}"))?,
            })
        })
        .collect()
}

fn parse_spec(value: &Value, path: &str) -> Result<PropertySpec> {
    let obj = value
        .as_object()
        .ok_or_else(|| FlowError::InvalidSchema(format!("property '{path}' must be an object")))?;

    let enum_values = match obj.get("enum") {
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' enum must be a list"
            )))
        }
        None => None,
    };
    let const_value = obj.get("const").cloned();

    let ty: PropertyType = match obj.get("type") {
        Some(Value::String(s)) => s.parse()?,
        // ["string", "null"] style unions keep the first concrete type.
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(str::parse::<PropertyType>)
            .transpose()?
            .unwrap_or_default(),
        Some(other) => {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' has non-string type {other}"
            )))
        }
        None => infer_type(obj, enum_values.as_deref(), const_value.as_ref()),
    };

    let items = match obj.get("items") {
        Some(items @ Value::Object(_)) => Some(Box::new(parse_spec(items, &format!("{path}[]"))?)),
        Some(_) => {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' items must be an object"
            )))
        }
        None => None,
    };
    let properties = match obj.get("properties") {
        Some(Value::Object(map)) => parse_properties(map, &format!("{path}."))?,
        Some(_) => {
            return Err(FlowError::InvalidSchema(format!(
                "'{path}' properties must be an object"
            )))
        }
        None => Vec::new(),
    };

    Ok(PropertySpec {
        ty,
        enum_values,
        const_value,
        minimum: number_field(obj, "minimum", path)?,
        maximum: number_field(obj, "maximum", path)?,
        min_length: length_field(obj, "minLength", path)?,
        max_length: length_field(obj, "maxLength", path)?,
        default: obj.get("default").cloned(),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        items,
        properties,
    })
}

fn infer_type(
    obj: &Map<String, Value>,
    enum_values: Option<&[Value]>,
    const_value: Option<&Value>,
) -> PropertyType {
    if obj.contains_key("properties") {
        return PropertyType::Object;
    }
    if obj.contains_key("items") {
        return PropertyType::Array;
    }
    let sample = const_value.or_else(|| enum_values.and_then(|v| v.first()));
    match sample {
        Some(v) => type_of_value(v),
        None if obj.contains_key("minimum") || obj.contains_key("maximum") => {
            PropertyType::Number
        }
        None => PropertyType::String,
    }
}

fn type_of_value(v: &Value) -> PropertyType {
    match v {
        Value::Bool(_) => PropertyType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => PropertyType::Integer,
        Value::Number(_) => PropertyType::Number,
        Value::Array(_) => PropertyType::Array,
        Value::Object(_) => PropertyType::Object,
        _ => PropertyType::String,
    }
}

fn number_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| FlowError::InvalidSchema(format!("'{path}' {key} must be a number"))),
    }
}

fn length_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<usize>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(usize::try_from(n).unwrap_or(usize::MAX)))
            .ok_or_else(|| {
                FlowError::InvalidSchema(format!("'{path}' {key} must be a non-negative integer"))
            }),
    }
}

fn string_list(value: Option<&Value>, field: &str) -> Result<Vec<String>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let list = value
        .as_array()
        .ok_or_else(|| FlowError::InvalidSchema(format!("'{field}' must be a list")))?;
    let mut out: Vec<String> = Vec::new();
    for item in list {
        let name = item
            .as_str()
            .ok_or_else(|| FlowError::InvalidSchema(format!("'{field}' entries must be strings")))?;
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    Ok(out)
}

/// Render a value without JSON quoting for strings.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Zod scraping
// ---------------------------------------------------------------------------

const ZOD_SKIP: &[&str] = &["z", "const", "export", "type", "schema"];

fn zod_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+):\s*z\.(\w+)\(([^)]*)\)([^\n,}]*)").unwrap())
}

fn zod_quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"["']([^"']*)["']"#).unwrap())
}

fn zod_inner_kind_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"z\.(\w+)").unwrap())
}

fn zod_chain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\.(min|max|length|describe|default)\(\s*("[^"]*"|'[^']*'|[^)]*?)\s*\)"#)
            .unwrap()
    })
}

fn zod_kind(kind: &str) -> PropertyType {
    match kind {
        "number" => PropertyType::Number,
        "bigint" => PropertyType::Integer,
        "boolean" => PropertyType::Boolean,
        "array" => PropertyType::Array,
        "object" | "record" => PropertyType::Object,
        _ => PropertyType::String,
    }
}

fn zod_literal(arg: &str) -> Value {
    let arg = arg.trim();
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(unquote(arg).to_string()))
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
        .unwrap_or(s)
}

fn zod_property(kind: &str, args: &str, chain: &str) -> PropertySpec {
    let mut spec = PropertySpec::new(zod_kind(kind));
    match kind {
        "enum" => {
            spec.enum_values = Some(
                zod_quoted_regex()
                    .captures_iter(args)
                    .map(|c| Value::String(c[1].to_string()))
                    .collect(),
            );
        }
        "literal" => {
            let value = zod_literal(args);
            spec.ty = type_of_value(&value);
            spec.const_value = Some(value);
        }
        "array" => {
            let inner = zod_inner_kind_regex()
                .captures(args)
                .map(|c| zod_kind(&c[1]))
                .unwrap_or_default();
            spec.items = Some(Box::new(PropertySpec::new(inner)));
        }
        _ => {}
    }
    if spec.ty == PropertyType::Number && chain.contains(".int()") {
        spec.ty = PropertyType::Integer;
    }

    for caps in zod_chain_regex().captures_iter(chain) {
        let arg = &caps[2];
        match &caps[1] {
            "describe" => spec.description = Some(unquote(arg).to_string()),
            "default" => spec.default = Some(zod_literal(arg)),
            bound => {
                let Ok(n) = arg.trim().parse::<f64>() else {
                    continue;
                };
                let is_min = bound != "max";
                let is_max = bound != "min";
                if spec.ty == PropertyType::String {
                    let n = n.max(0.0) as usize;
                    if is_min {
                        spec.min_length = Some(n);
                    }
                    if is_max {
                        spec.max_length = Some(n);
                    }
                } else if spec.ty.is_numeric() {
                    if is_min {
                        spec.minimum = Some(n);
                    }
                    if is_max {
                        spec.maximum = Some(n);
                    }
                }
            }
        }
    }
    spec
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

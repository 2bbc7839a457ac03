//! Model stub generation from a sample JSON object.
//!
//! [`ClassFormatter`] infers one field per key from a sample document and renders Rust
//! source for a [`Mappable`](crate::mapper::Mappable) struct. With substructures enabled,
//! nested objects (and the first element of arrays of objects) become sibling structs,
//! named after their key, listed root first in depth-first order.
//!
//! Naming and field order are controlled by an explicit [`FormatterConfig`].
//!
//! # Examples
//!
//! ```rust
//! use respmap::formatter::{ClassFormatter, FormatterConfig};
//! use serde_json::json;
//!
//! let sample = json!({"name": "Sam", "age": 30, "address": {"city": "X"}});
//! let source = ClassFormatter::serialize(
//!     sample.as_object().unwrap(),
//!     "Person",
//!     true,
//!     &FormatterConfig::default(),
//! );
//!
//! assert!(source.contains("pub struct Person {"));
//! assert!(source.contains("pub address: Option<Address>,"));
//! assert!(source.contains("pub struct Address {"));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

type JsonObject = serde_json::Map<String, Value>;

type FieldOrder = Arc<dyn Fn((&str, &Value), (&str, &Value)) -> Ordering + Send + Sync>;
type NameTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Header emitted once at the top of the generated source.
pub const SOURCE_HEADER: &str = "use respmap::mapper::{Map, Mappable};\nuse serde::Deserialize;\n";

/// Type label for date-like strings when date detection is enabled.
#[cfg(feature = "chrono")]
pub const DATE_TYPE: &str = "chrono::DateTime<chrono::Utc>";

const VALUE_TYPE: &str = "serde_json::Value";

static WORD_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid word boundary regex"));
static NON_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("valid separator regex"));

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where",
    "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// Upper-cases the first character and lower-cases the rest.
///
/// The default class-name transform: `address` becomes `Address`,
/// `three_day_forecast` becomes `Three_day_forecast`.
pub fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn words(key: &str) -> Vec<String> {
    let split = WORD_BOUNDARY.replace_all(key, "${1} ${2}");
    NON_IDENT
        .split(&split)
        .flat_map(str::split_whitespace)
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Converts a JSON key to `PascalCase`: `three_day_forecast` becomes `ThreeDayForecast`.
///
/// Keys without any alphanumeric character fall back to [`capitalize`].
pub fn to_pascal_case(key: &str) -> String {
    let name: String = words(key).iter().map(|w| capitalize(w)).collect();
    match name.chars().next() {
        None => capitalize(key),
        Some(c) if c.is_ascii_digit() => format!("_{name}"),
        Some(_) => name,
    }
}

/// Converts a JSON key to a `snake_case` field name.
///
/// Keywords become raw identifiers (`type` becomes `r#type`) and a leading digit is
/// prefixed with an underscore.
///
/// # Examples
///
/// ```rust
/// use respmap::formatter::to_snake_case;
///
/// assert_eq!(to_snake_case("threeDayForecast"), "three_day_forecast");
/// assert_eq!(to_snake_case("Content-Type"), "content_type");
/// assert_eq!(to_snake_case("type"), "r#type");
/// assert_eq!(to_snake_case("3d"), "_3d");
/// ```
pub fn to_snake_case(key: &str) -> String {
    let name = words(key).join("_");
    match name.as_str() {
        "" => "_".to_string(),
        "self" | "super" | "crate" => format!("{name}_"),
        n if KEYWORDS.contains(&n) => format!("r#{name}"),
        n if n.starts_with(|c: char| c.is_ascii_digit()) => format!("_{name}"),
        _ => name,
    }
}

/// Naming, ordering and type-detection policy for [`ClassFormatter`].
///
/// [`FormatterConfig::default`] keeps keys as field names, capitalizes class names and
/// keeps the document's key order. [`FormatterConfig::rust`] produces idiomatic Rust
/// names and orders fields by key.
///
/// # Examples
///
/// ```rust
/// use respmap::formatter::{FormatterConfig, to_pascal_case};
///
/// let config = FormatterConfig::default()
///     .with_class_names(to_pascal_case)
///     .with_sort(|a, b| a.0.len().cmp(&b.0.len()));
/// assert_eq!(config.class_name("three_day_forecast"), "ThreeDayForecast");
/// ```
#[derive(Clone)]
pub struct FormatterConfig {
    sort: Option<FieldOrder>,
    variable_name: NameTransform,
    class_name: NameTransform,
    #[cfg(feature = "chrono")]
    date_detection: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            sort: None,
            variable_name: Arc::new(|key: &str| key.to_string()),
            class_name: Arc::new(capitalize),
            #[cfg(feature = "chrono")]
            date_detection: false,
        }
    }
}

impl FormatterConfig {
    /// Snake-case fields, `PascalCase` structs, fields ordered by key.
    pub fn rust() -> Self {
        Self::default()
            .with_variable_names(to_snake_case)
            .with_class_names(to_pascal_case)
            .with_sort(|a, b| a.0.cmp(b.0))
    }

    /// Orders fields with `compare`, called with `(key, value)` pairs.
    pub fn with_sort<F>(mut self, compare: F) -> Self
    where
        F: Fn((&str, &Value), (&str, &Value)) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(compare));
        self
    }

    /// Maps JSON keys to field names.
    pub fn with_variable_names<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.variable_name = Arc::new(transform);
        self
    }

    /// Maps JSON keys of nested objects to struct names.
    pub fn with_class_names<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.class_name = Arc::new(transform);
        self
    }

    /// Labels RFC 3339 strings with [`DATE_TYPE`] instead of `String`.
    #[cfg(feature = "chrono")]
    pub fn with_date_detection(mut self, enabled: bool) -> Self {
        self.date_detection = enabled;
        self
    }

    /// Field name for a JSON key.
    pub fn variable_name(&self, key: &str) -> String {
        (self.variable_name)(key)
    }

    /// Struct name for the nested object at a JSON key.
    pub fn class_name(&self, key: &str) -> String {
        (self.class_name)(key)
    }

    /// The fields of `json` in emission order.
    ///
    /// Without a comparator this is the document's own key order.
    pub fn ordered_fields<'a>(&self, json: &'a JsonObject) -> Vec<(&'a str, &'a Value)> {
        let mut fields: Vec<(&str, &Value)> = json.iter().map(|(k, v)| (k.as_str(), v)).collect();
        if let Some(compare) = &self.sort {
            fields.sort_by(|a, b| compare(*a, *b));
        }
        fields
    }

    /// Infers the Rust type label for one field.
    ///
    /// Checked in order: string, integer, boolean, float, object, array of objects,
    /// array of arrays, any other array. `null` gets `serde_json::Value`.
    pub fn type_label(&self, key: &str, value: &Value) -> String {
        match value {
            Value::String(s) => self.string_label(s).to_string(),
            Value::Number(n) if n.is_i64() => "i64".to_string(),
            Value::Number(n) if n.is_u64() => "u64".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Number(_) => "f64".to_string(),
            Value::Object(_) => self.class_name(key),
            Value::Array(items) if is_object_array(items) => {
                format!("Vec<{}>", self.class_name(key))
            }
            Value::Array(items) if items.iter().all(Value::is_array) => {
                format!("Vec<Vec<{VALUE_TYPE}>>")
            }
            Value::Array(_) => format!("Vec<{VALUE_TYPE}>"),
            Value::Null => VALUE_TYPE.to_string(),
        }
    }

    #[cfg(feature = "chrono")]
    fn string_label(&self, s: &str) -> &'static str {
        if self.date_detection && chrono::DateTime::parse_from_rfc3339(s).is_ok() {
            DATE_TYPE
        } else {
            "String"
        }
    }

    #[cfg(not(feature = "chrono"))]
    fn string_label(&self, _s: &str) -> &'static str {
        "String"
    }
}

impl fmt::Debug for FormatterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatterConfig")
            .field("sorted", &self.sort.is_some())
            .finish_non_exhaustive()
    }
}

/// Empty arrays count as arrays of objects, so they still yield a (field-less) struct.
fn is_object_array(items: &[Value]) -> bool {
    items.iter().all(Value::is_object)
}

/// One inferred field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSkeleton {
    /// JSON key the field binds to
    pub key: String,

    /// Rendered field name
    pub name: String,

    /// Rust type, without the surrounding `Option`
    pub type_label: String,
}

/// A struct inferred from one JSON object, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSkeleton {
    /// Struct name
    pub name: String,

    /// Fields in emission order
    pub fields: Vec<FieldSkeleton>,
}

impl ClassSkeleton {
    /// Infers the fields of `json` under `config`.
    pub fn from_json(name: impl Into<String>, json: &JsonObject, config: &FormatterConfig) -> Self {
        let fields = config
            .ordered_fields(json)
            .into_iter()
            .map(|(key, value)| FieldSkeleton {
                key: key.to_string(),
                name: config.variable_name(key),
                type_label: config.type_label(key, value),
            })
            .collect();

        Self {
            name: name.into(),
            fields,
        }
    }

    fn longest_name(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.name.chars().count())
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for ClassSkeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.name;

        writeln!(f, "#[derive(Debug, Clone, Default, Deserialize)]")?;
        writeln!(f, "#[serde(default)]")?;
        if self.fields.is_empty() {
            writeln!(f, "pub struct {name} {{}}")?;
        } else {
            writeln!(f, "pub struct {name} {{")?;
            for field in &self.fields {
                if field.name.trim_start_matches("r#") != field.key {
                    writeln!(f, "    #[serde(rename = {:?})]", field.key)?;
                }
                writeln!(f, "    pub {}: Option<{}>,", field.name, field.type_label)?;
            }
            writeln!(f, "}}")?;
        }
        writeln!(f)?;

        writeln!(f, "impl {name} {{")?;
        writeln!(f, "    pub fn new() -> Self {{")?;
        writeln!(f, "        Self::default()")?;
        writeln!(f, "    }}")?;
        writeln!(f, "}}")?;
        writeln!(f)?;

        writeln!(f, "impl Mappable for {name} {{")?;
        if self.fields.is_empty() {
            writeln!(f, "    fn mapping(&mut self, _map: &Map<'_>) {{}}")?;
            return write!(f, "}}");
        }

        let longest = self.longest_name();
        writeln!(f, "    fn mapping(&mut self, map: &Map<'_>) {{")?;
        for field in &self.fields {
            let pad = longest - field.name.chars().count() + 1;
            writeln!(
                f,
                "        map.bind(&mut self.{},{:pad$}{:?});",
                field.name, "", field.key
            )?;
        }
        writeln!(f, "    }}")?;
        write!(f, "}}")
    }
}

/// Generates [`Mappable`](crate::mapper::Mappable) struct source from sample JSON.
pub struct ClassFormatter;

impl ClassFormatter {
    /// Renders `json` as a struct named `root_name`, plus one struct per nested object
    /// when `include_substructures` is set.
    ///
    /// The output starts with [`SOURCE_HEADER`]; structs follow root first, separated
    /// by blank lines. Given the same input and config the output is byte-identical.
    ///
    /// Struct names are not deduplicated: two nested keys that map to the same class
    /// name (`item` and `Item`, or the same key at two depths) render two structs with
    /// that name, and the output needs a manual rename before it compiles.
    pub fn serialize(
        json: &JsonObject,
        root_name: &str,
        include_substructures: bool,
        config: &FormatterConfig,
    ) -> String {
        let rendered: Vec<String> = Self::skeletons(json, root_name, include_substructures, config)
            .iter()
            .map(ClassSkeleton::to_string)
            .collect();

        format!("{SOURCE_HEADER}\n{}\n", rendered.join("\n\n"))
    }

    /// Infers the structs [`serialize`](ClassFormatter::serialize) would render.
    pub fn skeletons(
        json: &JsonObject,
        root_name: &str,
        include_substructures: bool,
        config: &FormatterConfig,
    ) -> Vec<ClassSkeleton> {
        if !include_substructures {
            return vec![ClassSkeleton::from_json(root_name, json, config)];
        }

        Self::find_substructures(root_name, json, config)
            .into_iter()
            .map(|(name, object)| ClassSkeleton::from_json(name, &object, config))
            .collect()
    }

    /// Flattens `json` and every nested object into `(struct name, object)` pairs,
    /// root first, depth first, children in field order.
    ///
    /// An array of objects is represented by its first element; an empty array by an
    /// empty object.
    pub fn find_substructures(
        root_name: &str,
        json: &JsonObject,
        config: &FormatterConfig,
    ) -> Vec<(String, JsonObject)> {
        let mut structures = Vec::new();
        let mut pending = vec![(root_name.to_string(), json.clone())];

        while let Some((name, object)) = pending.pop() {
            let children: Vec<(String, JsonObject)> = config
                .ordered_fields(&object)
                .into_iter()
                .filter_map(|(key, value)| {
                    let child = match value {
                        Value::Object(nested) => nested.clone(),
                        Value::Array(items) if is_object_array(items) => items
                            .first()
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default(),
                        _ => return None,
                    };
                    Some((config.class_name(key), child))
                })
                .collect();

            tracing::trace!(structure = %name, children = children.len(), "discovered substructures");
            pending.extend(children.into_iter().rev());
            structures.push((name, object));
        }

        structures
    }
}

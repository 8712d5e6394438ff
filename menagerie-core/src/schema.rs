//! Typed value descriptors used to admit written data and to parse emitted instances.
//!
//! A [`Schema`] both validates and transforms: admitting through
//! [`Schema::Reference`] turns an id string into a stored reference, and emitting
//! through [`Schema::Hidden`] drops a write-only value.
//!
//! Absence and `null` are the same thing to a schema. Objects keep every key present
//! in their input and omit keys that were absent and parsed to nothing, so partial
//! updates never touch fields they do not mention.

use bson::{Bson, Document};
use std::fmt;
use thiserror::Error;

use crate::value::Reference;

/// Describes the accepted shape of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Accepts any value unchanged, including absence.
    Any,
    String,
    /// Any integer or floating point number.
    Number,
    Boolean,
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// An object with the given keys; unknown keys are stripped.
    Object(Vec<(String, Schema)>),
    /// A homogeneous list.
    Array(Box<Schema>),
    /// The inner schema, or absence.
    Optional(Box<Schema>),
    /// The inner schema, or a missing object key. An explicit null still has to
    /// satisfy the inner schema.
    Omittable(Box<Schema>),
    /// Accepts only absence. Used for values that cannot be written directly.
    Never,
    /// Accepts anything and always produces absence. Used for write-only values; an
    /// object drops the key entirely.
    Hidden,
    /// Accepts an id string (or an existing reference) into the named collection and
    /// produces the stored reference.
    Reference(String),
}

impl Schema {
    /// Builds an object schema from `(key, schema)` pairs.
    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Schema)>) -> Self {
        Schema::Object(
            fields
                .into_iter()
                .map(|(key, schema)| (key.into(), schema))
                .collect(),
        )
    }

    pub fn enumeration<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Schema::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Wraps this schema so absence is accepted.
    pub fn optional(&self) -> Self {
        match self {
            Schema::Optional(_) => self.clone(),
            _ => Schema::Optional(Box::new(self.clone())),
        }
    }

    /// Lifts this schema to a list of values of this shape.
    pub fn array(&self) -> Self {
        Schema::Array(Box::new(self.clone()))
    }

    /// Lets every key of an object schema be left out. Null is only accepted where the
    /// key's own schema accepts it. Other schemas are returned as is.
    pub fn partial(&self) -> Self {
        match self {
            Schema::Object(fields) => Schema::Object(
                fields
                    .iter()
                    .map(|(key, schema)| {
                        let relaxed = match schema {
                            Schema::Omittable(_) => schema.clone(),
                            _ => Schema::Omittable(Box::new(schema.clone())),
                        };
                        (key.clone(), relaxed)
                    })
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Validates and transforms `value`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every mismatch found.
    pub fn parse(&self, value: &Bson) -> Result<Bson, ValidationError> {
        let mut path = Vec::new();
        let mut issues = Vec::new();
        let parsed = self.parse_at(value, &mut path, &mut issues);

        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Like [`parse`](Self::parse) for object schemas, returning the parsed document.
    pub fn parse_document(&self, document: &Document) -> Result<Document, ValidationError> {
        match self.parse(&Bson::Document(document.clone()))? {
            Bson::Document(parsed) => Ok(parsed),
            _ => Ok(Document::new()),
        }
    }

    /// Whether `value` would parse successfully.
    pub fn accepts(&self, value: &Bson) -> bool {
        self.parse(value).is_ok()
    }

    fn parse_at(
        &self,
        value: &Bson,
        path: &mut Vec<String>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Bson {
        match (self, value) {
            (Schema::Any, _) => value.clone(),
            (Schema::Hidden, _) => Bson::Null,
            (Schema::Optional(_) | Schema::Never, Bson::Null) => Bson::Null,
            (Schema::Optional(inner), _) => inner.parse_at(value, path, issues),
            (Schema::Omittable(inner), _) => inner.parse_at(value, path, issues),
            (Schema::Never, _) => report(path, issues, IssueKind::NotAllowed),
            (_, Bson::Null) => report(path, issues, IssueKind::Required),
            (Schema::String, Bson::String(_)) => value.clone(),
            (Schema::Number, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => value.clone(),
            (Schema::Boolean, Bson::Boolean(_)) => value.clone(),
            (Schema::Enum(options), Bson::String(s)) => {
                if options.iter().any(|option| option == s) {
                    value.clone()
                } else {
                    report(path, issues, IssueKind::InvalidEnumValue {
                        options: options.clone(),
                        found: s.clone(),
                    })
                }
            }
            (Schema::Reference(collection), Bson::String(id)) => {
                Reference::new(collection.as_str(), id.as_str()).to_bson()
            }
            (Schema::Reference(collection), _) => match Reference::from_bson(value) {
                Some(reference) if &reference.collection == collection => value.clone(),
                _ => report(path, issues, IssueKind::InvalidType {
                    expected: self.describe(),
                    found: describe_value(value),
                }),
            },
            (Schema::Array(item), Bson::Array(items)) => Bson::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, element)| {
                        path.push(i.to_string());
                        let parsed = item.parse_at(element, path, issues);
                        path.pop();
                        parsed
                    })
                    .collect(),
            ),
            (Schema::Object(fields), Bson::Document(document)) => {
                let mut parsed = Document::new();
                for (key, schema) in fields {
                    path.push(key.clone());
                    match document.get(key) {
                        Some(_) if *schema == Schema::Hidden => {}
                        None if matches!(schema, Schema::Omittable(_)) => {}
                        Some(field_value) => {
                            parsed.insert(key.clone(), schema.parse_at(field_value, path, issues));
                        }
                        None => {
                            let field_value = schema.parse_at(&Bson::Null, path, issues);
                            if field_value != Bson::Null {
                                parsed.insert(key.clone(), field_value);
                            }
                        }
                    }
                    path.pop();
                }
                Bson::Document(parsed)
            }
            _ => report(path, issues, IssueKind::InvalidType {
                expected: self.describe(),
                found: describe_value(value),
            }),
        }
    }

    fn describe(&self) -> String {
        match self {
            Schema::Any => "any".into(),
            Schema::String => "string".into(),
            Schema::Number => "number".into(),
            Schema::Boolean => "boolean".into(),
            Schema::Enum(options) => format!("one of {}", options.join(", ")),
            Schema::Object(_) => "object".into(),
            Schema::Array(item) => format!("array of {}", item.describe()),
            Schema::Optional(inner) => format!("optional {}", inner.describe()),
            Schema::Never => "nothing".into(),
            Schema::Hidden => "anything".into(),
            Schema::Omittable(inner) => inner.describe(),
            Schema::Reference(collection) => format!("id of {collection}"),
        }
    }
}

fn report(path: &[String], issues: &mut Vec<ValidationIssue>, kind: IssueKind) -> Bson {
    issues.push(ValidationIssue {
        path: path.to_vec(),
        kind,
    });
    Bson::Null
}

fn describe_value(value: &Bson) -> String {
    match value {
        Bson::Null => "null",
        Bson::String(_) => "string",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "number",
        Bson::Boolean(_) => "boolean",
        Bson::Array(_) => "array",
        Bson::Document(_) if Reference::is_reference(value) => "reference",
        Bson::Document(_) => "object",
        _ => "unsupported value",
    }
    .to_string()
}

/// Why a single value was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// A value was required but absent.
    Required,
    InvalidType { expected: String, found: String },
    InvalidEnumValue { options: Vec<String>, found: String },
    /// A value was supplied where none may be written.
    NotAllowed,
}

/// A rejected value and where it sits in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: Vec<String>,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = if self.path.is_empty() {
            "value".to_string()
        } else {
            self.path.join(".")
        };

        match &self.kind {
            IssueKind::Required => write!(f, "{at}: required"),
            IssueKind::InvalidType { expected, found } => {
                write!(f, "{at}: expected {expected}, received {found}")
            }
            IssueKind::InvalidEnumValue { options, found } => {
                write!(f, "{at}: expected one of [{}], received '{found}'", options.join(", "))
            }
            IssueKind::NotAllowed => write!(f, "{at}: not allowed"),
        }
    }
}

/// Every issue found while parsing one value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("validation failed: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

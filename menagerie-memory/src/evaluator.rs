//! Expression evaluation against the in-memory database state.
//!
//! Evaluation walks the expression tree with a stack of variable bindings. Sets
//! (`Documents`, `Match`) only exist as the argument of `Paginate`, which materializes
//! them into a page object `{ "data": [...] }`.

use bson::{Bson, Document, datetime::DateTime};
use std::{cmp::Ordering, collections::HashMap};

use menagerie_core::{
    error::{ZooError, ZooResult},
    query::Expr,
    value::{COLLECTIONS, INDEXES, REF_KEY, Reference},
};

use crate::store::State;

/// Entries returned by `Paginate` when no size is given.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Type-erased, comparable representation of BSON values.
///
/// Numbers are normalized to f64 so values written as different integer widths still
/// match and sort together.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Whether two values are equal once numbers are normalized.
pub(crate) fn same_value(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Orders two values, treating incomparable values as equal.
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> Ordering {
    Comparable::from(left)
        .partial_cmp(&Comparable::from(right))
        .unwrap_or(Ordering::Equal)
}

/// One step of a path: an object key or an array position.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Segment {
    Key(String),
    Position(usize),
}

impl Segment {
    fn from_bson(value: &Bson) -> ZooResult<Self> {
        match value {
            Bson::String(key) => Ok(Segment::Key(key.clone())),
            Bson::Int32(position) if *position >= 0 => Ok(Segment::Position(*position as usize)),
            Bson::Int64(position) if *position >= 0 => Ok(Segment::Position(*position as usize)),
            other => Err(ZooError::InvalidExpression(format!(
                "invalid path segment {other}"
            ))),
        }
    }
}

/// Converts an evaluated path, either one segment or an array of them.
fn to_segments(path: &Bson) -> ZooResult<Vec<Segment>> {
    match path {
        Bson::Array(items) => items.iter().map(Segment::from_bson).collect(),
        single => Ok(vec![Segment::from_bson(single)?]),
    }
}

pub(crate) fn key_segments(path: &[String]) -> Vec<Segment> {
    path.iter().cloned().map(Segment::Key).collect()
}

/// Walks `path` inside `value`. Stepping into a reference reads its `id` or
/// `collection`. Null values count as absent.
pub(crate) fn resolve<'v>(value: &'v Bson, path: &[Segment]) -> Option<&'v Bson> {
    let mut current = value;

    for segment in path {
        current = match (current, segment) {
            (Bson::Document(document), Segment::Key(key)) => {
                match document.get(REF_KEY).and_then(Bson::as_document) {
                    Some(reference) if key == "id" || key == "collection" => reference.get(key)?,
                    _ => document.get(key)?,
                }
            }
            (Bson::Array(items), Segment::Position(position)) => items.get(*position)?,
            _ => return None,
        };
    }

    match current {
        Bson::Null => None,
        found => Some(found),
    }
}

fn as_reference(value: &Bson) -> ZooResult<Reference> {
    Reference::from_bson(value)
        .ok_or_else(|| ZooError::InvalidExpression(format!("expected a reference, received {value}")))
}

/// Name of the collection a collection reference points at.
fn as_collection(value: &Bson) -> ZooResult<String> {
    match as_reference(value)? {
        Reference { collection, id } if collection == COLLECTIONS => Ok(id),
        other => Err(ZooError::InvalidExpression(format!(
            "expected a collection, received {other}"
        ))),
    }
}

fn as_index(value: &Bson) -> ZooResult<String> {
    match as_reference(value)? {
        Reference { collection, id } if collection == INDEXES => Ok(id),
        other => Err(ZooError::InvalidExpression(format!(
            "expected an index, received {other}"
        ))),
    }
}

fn as_document(value: Bson) -> ZooResult<Document> {
    match value {
        Bson::Document(document) => Ok(document),
        Bson::Null => Ok(Document::new()),
        other => Err(ZooError::InvalidExpression(format!(
            "expected an object, received {other}"
        ))),
    }
}

/// The elements of an array or of a page's `data`.
fn into_items(value: Bson) -> ZooResult<(Vec<Bson>, bool)> {
    match value {
        Bson::Array(items) => Ok((items, false)),
        Bson::Document(mut page) => match page.remove("data") {
            Some(Bson::Array(items)) => Ok((items, true)),
            _ => Err(ZooError::InvalidExpression(
                "expected an array or a page".into(),
            )),
        },
        other => Err(ZooError::InvalidExpression(format!(
            "expected an array or a page, received {other}"
        ))),
    }
}

fn page(items: Vec<Bson>) -> Bson {
    let mut page = Document::new();
    page.insert("data", Bson::Array(items));
    Bson::Document(page)
}

fn data_of(params: Bson) -> ZooResult<Document> {
    match as_document(params)?.remove("data") {
        Some(data) => as_document(data),
        None => Ok(Document::new()),
    }
}

/// Evaluates expressions against one database state.
pub(crate) struct Evaluator<'s> {
    state: &'s mut State,
    scope: Vec<(String, Bson)>,
}

impl<'s> Evaluator<'s> {
    pub fn new(state: &'s mut State) -> Self {
        Self {
            state,
            scope: Vec::new(),
        }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> ZooResult<Bson> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Array(items) => Ok(Bson::Array(
                items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<ZooResult<_>>()?,
            )),
            Expr::Object(entries) => {
                let mut document = Document::new();
                for (key, value) in entries {
                    document.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(Bson::Document(document))
            }
            Expr::Var(name) => self
                .scope
                .iter()
                .rev()
                .find(|(bound, _)| bound == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| ZooError::InvalidExpression(format!("unbound variable {name}"))),
            Expr::Let { bindings, body } => {
                let depth = self.scope.len();
                let result = self.evaluate_let(bindings, body);
                self.scope.truncate(depth);
                result
            }
            Expr::Lambda { .. } => Err(ZooError::InvalidExpression(
                "a lambda can only be applied by Map".into(),
            )),
            Expr::Select {
                path,
                from,
                default,
            } => {
                let segments = to_segments(&self.evaluate(path)?)?;
                let from = self.evaluate(from)?;

                match (resolve(&from, &segments), default) {
                    (Some(found), _) => Ok(found.clone()),
                    (None, Some(default)) => self.evaluate(default),
                    (None, None) => Err(ZooError::InvalidExpression(format!(
                        "value not found at {segments:?}"
                    ))),
                }
            }
            Expr::ContainsPath { path, from } => {
                let segments = to_segments(&self.evaluate(path)?)?;
                let from = self.evaluate(from)?;

                Ok(Bson::Boolean(resolve(&from, &segments).is_some()))
            }
            Expr::If {
                condition,
                then,
                otherwise,
            } => match self.evaluate(condition)? {
                Bson::Boolean(true) => self.evaluate(then),
                Bson::Boolean(false) => self.evaluate(otherwise),
                other => Err(ZooError::InvalidExpression(format!(
                    "expected a boolean condition, received {other}"
                ))),
            },
            Expr::Get(reference) => {
                let reference = as_reference(&self.evaluate(reference)?)?;
                Ok(Bson::Document(self.state.get(&reference)?))
            }
            Expr::Ref { collection, id } => {
                let collection = as_collection(&self.evaluate(collection)?)?;
                let id = match self.evaluate(id)? {
                    Bson::String(id) => id,
                    Bson::Int32(id) => id.to_string(),
                    Bson::Int64(id) => id.to_string(),
                    other => {
                        return Err(ZooError::InvalidExpression(format!(
                            "invalid document id {other}"
                        )));
                    }
                };
                Ok(Reference::new(collection, id).to_bson())
            }
            Expr::Collection(name) => Ok(Reference::collection(name.as_str()).to_bson()),
            Expr::Index(name) => Ok(Reference::index(name.as_str()).to_bson()),
            Expr::Documents(_) | Expr::Match { .. } => Err(ZooError::InvalidExpression(
                "a set can only be read through Paginate".into(),
            )),
            Expr::Paginate { set, size } => {
                let entries = self.evaluate_set(set)?;
                Ok(page(
                    entries
                        .into_iter()
                        .take(size.unwrap_or(DEFAULT_PAGE_SIZE))
                        .collect(),
                ))
            }
            Expr::Map { collection, lambda } => {
                let (items, paged) = into_items(self.evaluate(collection)?)?;
                let mapped = items
                    .into_iter()
                    .map(|item| self.apply(lambda, item))
                    .collect::<ZooResult<Vec<_>>>()?;

                Ok(if paged { page(mapped) } else { Bson::Array(mapped) })
            }
            Expr::Count(collection) => {
                let (items, _) = into_items(self.evaluate(collection)?)?;
                Ok(Bson::Int64(items.len() as i64))
            }
            Expr::Subtract(operands) => self.evaluate_subtract(operands),
            Expr::Create { collection, params } => {
                let collection = as_collection(&self.evaluate(collection)?)?;
                let data = data_of(self.evaluate(params)?)?;
                Ok(Bson::Document(self.state.create_document(&collection, data)?))
            }
            Expr::Update { reference, params } => {
                let reference = as_reference(&self.evaluate(reference)?)?;
                let data = data_of(self.evaluate(params)?)?;
                Ok(Bson::Document(self.state.update_document(&reference, data)?))
            }
            Expr::Delete(reference) => {
                let reference = as_reference(&self.evaluate(reference)?)?;
                Ok(Bson::Document(self.state.delete(&reference)?))
            }
            Expr::CreateCollection(definition) => {
                Ok(Bson::Document(self.state.create_collection(definition)?))
            }
            Expr::CreateIndex(definition) => {
                Ok(Bson::Document(self.state.create_index(definition)?))
            }
            Expr::Do(statements) => {
                let mut last = Bson::Null;
                for statement in statements {
                    last = self.evaluate(statement)?;
                }
                Ok(last)
            }
        }
    }

    fn evaluate_let(&mut self, bindings: &[(String, Expr)], body: &Expr) -> ZooResult<Bson> {
        for (name, value) in bindings {
            let value = self.evaluate(value)?;
            self.scope.push((name.clone(), value));
        }

        self.evaluate(body)
    }

    fn apply(&mut self, lambda: &Expr, argument: Bson) -> ZooResult<Bson> {
        let Expr::Lambda { params, body } = lambda else {
            return Err(ZooError::InvalidExpression(
                "Map expects a lambda".into(),
            ));
        };

        let depth = self.scope.len();
        match params.as_slice() {
            [param] => self.scope.push((param.clone(), argument)),
            _ => {
                let Bson::Array(values) = argument else {
                    return Err(ZooError::InvalidExpression(format!(
                        "cannot destructure {argument} into {} parameters",
                        params.len()
                    )));
                };
                for (param, value) in params.iter().zip(values) {
                    self.scope.push((param.clone(), value));
                }
            }
        }

        let result = self.evaluate(body);
        self.scope.truncate(depth);
        result
    }

    fn evaluate_set(&mut self, set: &Expr) -> ZooResult<Vec<Bson>> {
        match set {
            Expr::Documents(collection) => {
                let collection = as_collection(&self.evaluate(collection)?)?;
                self.state.documents(&collection)
            }
            Expr::Match { index, terms } => {
                let index = as_index(&self.evaluate(index)?)?;
                let terms = match self.evaluate(terms)? {
                    Bson::Array(terms) => terms,
                    single => vec![single],
                };
                self.state.match_index(&index, &terms)
            }
            other => Err(ZooError::InvalidExpression(format!(
                "expected a set, received {other}"
            ))),
        }
    }

    fn evaluate_subtract(&mut self, operands: &[Expr]) -> ZooResult<Bson> {
        let values = operands
            .iter()
            .map(|operand| self.evaluate(operand))
            .collect::<ZooResult<Vec<_>>>()?;
        let Some((first, rest)) = values.split_first() else {
            return Err(ZooError::InvalidExpression(
                "Subtract needs at least one operand".into(),
            ));
        };

        let integer = |value: &Bson| match value {
            Bson::Int32(n) => Some(i64::from(*n)),
            Bson::Int64(n) => Some(*n),
            _ => None,
        };
        let float = |value: &Bson| match value {
            Bson::Double(n) => Some(*n),
            other => integer(other).map(|n| n as f64),
        };

        if let Some(first) = integer(first) {
            if let Some(rest) = rest.iter().map(integer).collect::<Option<Vec<_>>>() {
                return Ok(Bson::Int64(rest.into_iter().fold(first, |acc, n| acc - n)));
            }
        }

        match (float(first), rest.iter().map(float).collect::<Option<Vec<_>>>()) {
            (Some(first), Some(rest)) => Ok(Bson::Double(
                rest.into_iter().fold(first, |acc, n| acc - n),
            )),
            _ => Err(ZooError::InvalidExpression(
                "Subtract expects numbers".into(),
            )),
        }
    }
}

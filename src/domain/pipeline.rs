//! Typed aggregation stages and the executor that runs them.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s. Order matters: each stage
//! only sees the fields produced by the stages before it, so a projection that
//! reads `food.name` must come after the join that introduces `food`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bigdecimal::BigDecimal;
use serde_json::Value;

use super::deadline::Deadline;
use super::errors::DomainError;
use super::money::{decimal_from_number, decimal_to_number};
use super::records::Collection;

pub type Document = serde_json::Map<String, Value>;

/// Conjunction of equality predicates over dotted field paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// A `null` clause matches an explicit `null` only, never a missing
    /// field, the same as JSONB containment.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(path, expected)| lookup_path(doc, path) == Some(expected))
    }
}

/// Resolve `a.b.c` against nested objects.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn as_decimal(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => decimal_from_number(n),
        _ => None,
    }
}

fn decimal_value(value: &BigDecimal) -> Value {
    decimal_to_number(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(Value),
    Multiply(Box<Expr>, Box<Expr>),
    Slice {
        field: String,
        start: usize,
        len: usize,
    },
}

impl Expr {
    pub fn field(path: impl Into<String>) -> Self {
        Expr::Field(path.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn multiply(left: Expr, right: Expr) -> Self {
        Expr::Multiply(Box::new(left), Box::new(right))
    }

    pub fn slice(field: impl Into<String>, start: usize, len: usize) -> Self {
        Expr::Slice {
            field: field.into(),
            start,
            len,
        }
    }

    /// `None` means the expression produced nothing and the projected field is
    /// left out.
    fn eval(&self, doc: &Document) -> Option<Value> {
        match self {
            Expr::Field(path) => lookup_path(doc, path).cloned(),
            Expr::Literal(value) => Some(value.clone()),
            Expr::Multiply(left, right) => {
                let l = as_decimal(&left.eval(doc)?)?;
                let r = as_decimal(&right.eval(doc)?)?;
                Some(decimal_value(&(l * r)))
            }
            Expr::Slice { field, start, len } => {
                let items = lookup_path(doc, field)?.as_array()?;
                let from = (*start).min(items.len());
                let to = from.saturating_add(*len).min(items.len());
                Some(Value::Array(items[from..to].to_vec()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Decimal sum; non-numeric and missing values are skipped.
    Sum(Expr),
    Count,
    /// Collect every input document of the group.
    PushRoot,
}

/// Left outer join of `from` documents whose `foreign_field` equals the local
/// `local_field`, stored as an array under `as_field`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub from: Collection,
    pub local_field: String,
    pub foreign_field: String,
    pub as_field: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Lookup(Lookup),
    Unwind {
        path: String,
        preserve_null_and_empty: bool,
    },
    Project(Vec<(String, Expr)>),
    /// An empty key puts every input document into one group.
    Group {
        key: Vec<(String, Expr)>,
        accumulators: Vec<(String, Accumulator)>,
    },
}

/// Where `Lookup` stages read foreign documents from.
pub trait JoinSource {
    fn fetch(
        &self,
        collection: Collection,
        filter: &Filter,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn matching(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    /// Join at most one foreign document and flatten it into `as_field`;
    /// documents without a match are kept with the field absent.
    pub fn join_one(
        self,
        from: Collection,
        local_field: &str,
        foreign_field: &str,
        as_field: &str,
    ) -> Self {
        self.stage(Stage::Lookup(Lookup {
            from,
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
        }))
        .stage(Stage::Unwind {
            path: as_field.to_string(),
            preserve_null_and_empty: true,
        })
    }

    pub fn project(self, fields: Vec<(&str, Expr)>) -> Self {
        self.stage(Stage::Project(named(fields)))
    }

    pub fn group(self, key: Vec<(&str, Expr)>, accumulators: Vec<(&str, Accumulator)>) -> Self {
        self.stage(Stage::Group {
            key: named(key),
            accumulators: named(accumulators),
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run against `collection`. A leading `Match` is handed to the source as
    /// the initial fetch filter instead of scanning the whole collection.
    pub fn run<J: JoinSource + ?Sized>(
        &self,
        source: &J,
        collection: Collection,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError> {
        let (seed, rest) = match self.stages.split_first() {
            Some((Stage::Match(filter), rest)) => (filter.clone(), rest),
            _ => (Filter::all(), self.stages.as_slice()),
        };
        let input = source.fetch(collection, &seed, deadline)?;
        apply_stages(rest, input, source, deadline)
    }

    /// Run every stage over an already loaded input sequence.
    pub fn execute<J: JoinSource + ?Sized>(
        &self,
        input: Vec<Document>,
        source: &J,
        deadline: Deadline,
    ) -> Result<Vec<Document>, DomainError> {
        apply_stages(&self.stages, input, source, deadline)
    }
}

fn named<T>(fields: Vec<(&str, T)>) -> Vec<(String, T)> {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn apply_stages<J: JoinSource + ?Sized>(
    stages: &[Stage],
    mut docs: Vec<Document>,
    source: &J,
    deadline: Deadline,
) -> Result<Vec<Document>, DomainError> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Lookup(lookup) => apply_lookup(lookup, docs, source, deadline)?,
            Stage::Unwind {
                path,
                preserve_null_and_empty,
            } => apply_unwind(path, *preserve_null_and_empty, docs),
            Stage::Project(fields) => docs.iter().map(|d| project(fields, d)).collect(),
            Stage::Group { key, accumulators } => apply_group(key, accumulators, docs),
        };
    }
    Ok(docs)
}

fn apply_lookup<J: JoinSource + ?Sized>(
    lookup: &Lookup,
    docs: Vec<Document>,
    source: &J,
    deadline: Deadline,
) -> Result<Vec<Document>, DomainError> {
    let locals: Vec<Option<&Value>> = docs
        .iter()
        .map(|doc| lookup_path(doc, &lookup.local_field).filter(|v| !v.is_null()))
        .collect();

    // One fetch per distinct key, with the number of documents that join it.
    let mut fetched: HashMap<String, (Vec<Value>, usize)> = HashMap::new();
    for local in locals.iter().flatten() {
        match fetched.entry(local.to_string()) {
            Entry::Occupied(mut slot) => slot.get_mut().1 += 1,
            Entry::Vacant(slot) => {
                let found = source
                    .fetch(
                        lookup.from,
                        &Filter::eq(lookup.foreign_field.clone(), (*local).clone()),
                        deadline,
                    )?
                    .into_iter()
                    .map(Value::Object)
                    .collect();
                slot.insert((found, 1));
            }
        }
    }
    let keys: Vec<Option<String>> = locals
        .into_iter()
        .map(|local| local.map(Value::to_string))
        .collect();

    let mut joined = Vec::with_capacity(docs.len());
    for (mut doc, key) in docs.into_iter().zip(keys) {
        // The last document joining a key takes the fetched list itself.
        let matches = match key.map(|k| fetched.entry(k)) {
            Some(Entry::Occupied(mut slot)) if slot.get().1 > 1 => {
                slot.get_mut().1 -= 1;
                slot.get().0.clone()
            }
            Some(Entry::Occupied(slot)) => slot.remove().0,
            Some(Entry::Vacant(_)) | None => Vec::new(),
        };
        doc.insert(lookup.as_field.clone(), Value::Array(matches));
        joined.push(doc);
    }
    Ok(joined)
}

fn apply_unwind(path: &str, preserve: bool, docs: Vec<Document>) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        match doc.remove(path) {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    copy.insert(path.to_string(), item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(scalar) => {
                doc.insert(path.to_string(), scalar);
                out.push(doc);
            }
        }
    }
    out
}

fn project(fields: &[(String, Expr)], doc: &Document) -> Document {
    fields
        .iter()
        .filter_map(|(name, expr)| expr.eval(doc).map(|v| (name.clone(), v)))
        .collect()
}

enum AccState {
    Sum(BigDecimal),
    Count(i64),
    Push(Vec<Value>),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => AccState::Sum(BigDecimal::from(0)),
            Accumulator::Count => AccState::Count(0),
            Accumulator::PushRoot => AccState::Push(Vec::new()),
        }
    }

    fn feed(&mut self, acc: &Accumulator, doc: &Document) {
        match (self, acc) {
            (AccState::Sum(total), Accumulator::Sum(expr)) => {
                if let Some(n) = expr.eval(doc).as_ref().and_then(as_decimal) {
                    *total += n;
                }
            }
            (AccState::Count(n), Accumulator::Count) => *n += 1,
            (AccState::Push(items), Accumulator::PushRoot) => {
                items.push(Value::Object(doc.clone()))
            }
            _ => {}
        }
    }

    fn finish(self) -> Value {
        match self {
            AccState::Sum(total) => decimal_value(&total),
            AccState::Count(n) => Value::from(n),
            AccState::Push(items) => Value::Array(items),
        }
    }
}

fn apply_group(
    key: &[(String, Expr)],
    accumulators: &[(String, Accumulator)],
    docs: Vec<Document>,
) -> Vec<Document> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<AccState>)> = Vec::new();

    for doc in &docs {
        let id = if key.is_empty() {
            Value::Null
        } else {
            Value::Object(
                key.iter()
                    .map(|(name, expr)| (name.clone(), expr.eval(doc).unwrap_or(Value::Null)))
                    .collect(),
            )
        };
        let slot = *index.entry(id.to_string()).or_insert_with(|| {
            groups.push((
                id.clone(),
                accumulators.iter().map(|(_, acc)| AccState::new(acc)).collect(),
            ));
            groups.len() - 1
        });
        for (state, (_, acc)) in groups[slot].1.iter_mut().zip(accumulators) {
            state.feed(acc, doc);
        }
    }

    groups
        .into_iter()
        .map(|(id, states)| {
            let mut out = Document::new();
            out.insert("_id".to_string(), id);
            for (state, (name, _)) in states.into_iter().zip(accumulators) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[derive(Default)]
    struct Fixture {
        collections: HashMap<Collection, Vec<Document>>,
        fetches: RefCell<usize>,
    }

    impl Fixture {
        fn with(mut self, collection: Collection, docs: Vec<Value>) -> Self {
            self.collections
                .insert(collection, docs.into_iter().map(doc).collect());
            self
        }
    }

    impl JoinSource for Fixture {
        fn fetch(
            &self,
            collection: Collection,
            filter: &Filter,
            deadline: Deadline,
        ) -> Result<Vec<Document>, DomainError> {
            deadline.remaining()?;
            *self.fetches.borrow_mut() += 1;
            Ok(self
                .collections
                .get(&collection)
                .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(std::time::Duration::from_secs(5))
    }

    #[test]
    fn filter_matches_nested_paths() {
        let d = doc(json!({"order": {"table_id": "t1"}, "qty": 2}));
        assert!(Filter::eq("order.table_id", "t1").matches(&d));
        assert!(Filter::eq("order.table_id", "t1").and("qty", 2).matches(&d));
        assert!(!Filter::eq("qty", 3).matches(&d));
        assert!(Filter::all().matches(&d));
    }

    #[test]
    fn null_clause_matches_explicit_null_only() {
        let d = doc(json!({"table_id": null, "qty": 2}));
        assert!(Filter::eq("table_id", Value::Null).matches(&d));
        assert!(!Filter::eq("missing", Value::Null).matches(&d));
        assert!(!Filter::eq("qty", Value::Null).matches(&d));
    }

    #[test]
    fn join_one_flattens_single_match_and_preserves_misses() {
        let source = Fixture::default().with(
            Collection::Food,
            vec![json!({"food_id": "f1", "name": "Soup"})],
        );
        let input = vec![
            doc(json!({"food_id": "f1"})),
            doc(json!({"food_id": "f404"})),
            doc(json!({})),
        ];
        let out = Pipeline::new()
            .join_one(Collection::Food, "food_id", "food_id", "food")
            .execute(input, &source, deadline())
            .expect("pipeline");

        assert_eq!(out.len(), 3);
        assert_eq!(out[0]["food"]["name"], json!("Soup"));
        assert!(!out[1].contains_key("food"));
        assert!(!out[2].contains_key("food"));
    }

    #[test]
    fn lookup_fetches_each_distinct_key_once() {
        let source = Fixture::default().with(
            Collection::Food,
            vec![
                json!({"food_id": "f1", "name": "Soup"}),
                json!({"food_id": "f2", "name": "Bread"}),
            ],
        );
        let input = vec![
            doc(json!({"food_id": "f1"})),
            doc(json!({"food_id": "f2"})),
            doc(json!({"food_id": "f1"})),
            doc(json!({"food_id": "f1"})),
        ];
        let out = Pipeline::new()
            .join_one(Collection::Food, "food_id", "food_id", "food")
            .execute(input, &source, deadline())
            .expect("pipeline");
        assert_eq!(*source.fetches.borrow(), 2);
        let names: Vec<_> = out.iter().map(|d| d["food"]["name"].clone()).collect();
        assert_eq!(names, vec![json!("Soup"), json!("Bread"), json!("Soup"), json!("Soup")]);
    }

    #[test]
    fn unwind_without_preserve_drops_empty_arrays() {
        let input = vec![
            doc(json!({"tags": ["a", "b"]})),
            doc(json!({"tags": []})),
        ];
        let out = Pipeline::new()
            .stage(Stage::Unwind {
                path: "tags".to_string(),
                preserve_null_and_empty: false,
            })
            .execute(input, &Fixture::default(), deadline())
            .expect("pipeline");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["tags"], json!("a"));
        assert_eq!(out[1]["tags"], json!("b"));
    }

    #[test]
    fn project_omits_missing_fields_and_multiplies_decimals() {
        let input = vec![doc(json!({"price": 4.0, "qty": 2, "food": {"name": "Tea"}}))];
        let out = Pipeline::new()
            .project(vec![
                ("food_name", Expr::field("food.name")),
                ("table_number", Expr::field("table.table_number")),
                ("line_total", Expr::multiply(Expr::field("price"), Expr::field("qty"))),
                ("one", Expr::literal(1)),
            ])
            .execute(input, &Fixture::default(), deadline())
            .expect("pipeline");
        assert_eq!(out[0]["food_name"], json!("Tea"));
        assert!(!out[0].contains_key("table_number"));
        assert_eq!(out[0]["line_total"].as_f64(), Some(8.0));
        assert_eq!(out[0]["one"], json!(1));
    }

    #[test]
    fn group_sums_counts_and_pushes_per_composite_key() {
        let input = vec![
            doc(json!({"o": "a", "t": 1, "amount": 0.1})),
            doc(json!({"o": "b", "t": 2, "amount": 5})),
            doc(json!({"o": "a", "t": 1, "amount": 0.2})),
            doc(json!({"o": "a", "t": 1})),
        ];
        let out = Pipeline::new()
            .group(
                vec![("o", Expr::field("o")), ("t", Expr::field("t"))],
                vec![
                    ("total", Accumulator::Sum(Expr::field("amount"))),
                    ("count", Accumulator::Count),
                    ("items", Accumulator::PushRoot),
                ],
            )
            .execute(input, &Fixture::default(), deadline())
            .expect("pipeline");

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["_id"], json!({"o": "a", "t": 1}));
        assert_eq!(out[0]["total"].as_f64(), Some(0.3));
        assert_eq!(out[0]["count"], json!(3));
        assert_eq!(out[0]["items"].as_array().map(Vec::len), Some(3));
        assert_eq!(out[1]["total"].as_f64(), Some(5.0));
    }

    #[test]
    fn group_over_nothing_yields_nothing() {
        let out = Pipeline::new()
            .group(vec![], vec![("count", Accumulator::Count)])
            .execute(Vec::new(), &Fixture::default(), deadline())
            .expect("pipeline");
        assert!(out.is_empty());
    }

    #[test]
    fn slice_clamps_to_array_bounds() {
        let input = vec![doc(json!({"data": [1, 2, 3]}))];
        let out = Pipeline::new()
            .project(vec![
                ("head", Expr::slice("data", 1, 10)),
                ("past_end", Expr::slice("data", 7, 2)),
            ])
            .execute(input, &Fixture::default(), deadline())
            .expect("pipeline");
        assert_eq!(out[0]["head"], json!([2, 3]));
        assert_eq!(out[0]["past_end"], json!([]));
    }

    #[test]
    fn run_seeds_from_leading_match() {
        let source = Fixture::default().with(
            Collection::OrderItem,
            vec![json!({"order_id": "x"}), json!({"order_id": "y"})],
        );
        let out = Pipeline::new()
            .matching(Filter::eq("order_id", "y"))
            .run(&source, Collection::OrderItem, deadline())
            .expect("pipeline");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["order_id"], json!("y"));
    }

    #[test]
    fn expired_deadline_fails_the_run() {
        let source = Fixture::default();
        let result = Pipeline::new().run(
            &source,
            Collection::Food,
            Deadline::after(std::time::Duration::ZERO),
        );
        assert!(matches!(result, Err(DomainError::Timeout)));
    }
}

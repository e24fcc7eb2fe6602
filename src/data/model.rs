use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Serialize, Serializer};

/// Per-cell identifier column of annotation files.
pub const CELL: &str = "Cell";
pub const CELL_TYPE: &str = "CellType";
/// Column the loader adds to every annotation row.
pub const DONOR_ID: &str = "DonorID";

// ---------------------------------------------------------------------------
// Value – a single cell in a table column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring common Pandas dtypes.
/// Group-by keys live in `BTreeMap`s, so `Value` must be `Ord`.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeMap keys --

/// Equality follows `Ord`: floats compare by `total_cmp`, so `NaN == NaN`
/// and `0.0 != -0.0`, matching the bitwise `Hash`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

impl Value {
    /// Type a raw text field the way a dataframe reader would.
    pub fn infer(s: &str) -> Value {
        if s.is_empty() {
            return Value::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Value::Float(f);
        }
        if s == "true" || s == "false" {
            return Value::Bool(s == "true");
        }
        Value::String(s.to_string())
    }

    /// Text form for file export. Unlike `Display` this is lossless:
    /// floats keep a fractional part so they re-read as floats, and
    /// `Null` becomes the empty field.
    pub fn to_field(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(v) => format!("{v:?}"),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Serializes as the plain scalar so CSV export writes bare fields.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Column / Table – the row/column abstraction the analysis works on
// ---------------------------------------------------------------------------

/// A named, ordered sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// Ordered named columns of equal length. Rows are positional, so row
/// numbers are always `0..n_rows()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Build a table from a header and row-major records. Short rows are
    /// padded with `Null`, which callers rule out earlier when they care.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let n_rows = rows.len();
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(n_rows),
            })
            .collect();
        for row in rows {
            let mut row = row.into_iter();
            for col in &mut columns {
                col.values.push(row.next().unwrap_or(Value::Null));
            }
        }
        Table { columns, n_rows }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// All values of row `i`, in column order.
    pub fn row(&self, i: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[i]).collect()
    }

    /// Set `name` to `value` on every row, replacing an existing column of
    /// the same name in place.
    pub fn set_constant_column(&mut self, name: &str, value: Value) {
        let values = vec![value; self.n_rows];
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
    }

    /// Row-wise concatenation. The result holds the union of all columns in
    /// order of first appearance; rows from a table lacking a column get
    /// `Null` there.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut names: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !names.contains(&c.name) {
                    names.push(c.name.clone());
                }
            }
        }
        let n_rows: usize = tables.iter().map(|t| t.n_rows).sum();
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::with_capacity(n_rows),
            })
            .collect();

        for mut t in tables {
            for col in &mut columns {
                match t.columns.iter_mut().find(|c| c.name == col.name) {
                    Some(src) => col.values.append(&mut src.values),
                    None => col
                        .values
                        .extend(std::iter::repeat(Value::Null).take(t.n_rows)),
                }
            }
        }
        Table { columns, n_rows }
    }

    /// Distinct values of a column in order of first appearance.
    pub fn unique(&self, name: &str) -> Option<Vec<Value>> {
        let col = self.column(name)?;
        let mut seen = HashSet::new();
        Some(
            col.values
                .iter()
                .filter(|v| seen.insert(*v))
                .cloned()
                .collect(),
        )
    }

    /// Group rows by the given columns and count each group. Groups come
    /// back ordered by key. `None` if any column is absent.
    pub fn group_count(&self, names: &[&str]) -> Option<Vec<(Vec<Value>, usize)>> {
        let cols: Vec<&Column> = names
            .iter()
            .map(|n| self.column(n))
            .collect::<Option<_>>()?;
        let mut counts: BTreeMap<Vec<Value>, usize> = BTreeMap::new();
        for i in 0..self.n_rows {
            let key = cols.iter().map(|c| c.values[i].clone()).collect();
            *counts.entry(key).or_default() += 1;
        }
        Some(counts.into_iter().collect())
    }

    /// Counts per value of one column, most frequent first.
    pub fn value_counts(&self, name: &str) -> Option<Vec<(Value, usize)>> {
        let mut counts: Vec<(Value, usize)> = self
            .group_count(&[name])?
            .into_iter()
            .filter_map(|(mut key, n)| key.pop().map(|v| (v, n)))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Some(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            header.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| Value::infer(s)).collect())
                .collect(),
        )
    }

    #[test]
    fn infer_types() {
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("42"), Value::Integer(42));
        assert_eq!(Value::infer("1.5"), Value::Float(1.5));
        assert_eq!(Value::infer("true"), Value::Bool(true));
        assert_eq!(Value::infer("T cell"), Value::String("T cell".into()));
    }

    #[test]
    fn float_equality_agrees_with_hash() {
        use std::collections::HashSet;

        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Integer(1), Value::Float(1.0));

        let set: HashSet<Value> = [Value::Float(0.0), Value::Float(-0.0), Value::Float(0.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn float_fields_reread_as_floats() {
        for v in [2.0, 0.1, 1e-7, -3.25] {
            assert_eq!(Value::infer(&Value::Float(v).to_field()), Value::Float(v));
        }
        assert_eq!(Value::Null.to_field(), "");
    }

    #[test]
    fn concat_takes_column_union_and_fills_null() {
        let a = table(&["Cell", "CellType"], &[&["c1", "T1"]]);
        let b = table(&["Cell", "Score"], &[&["c2", "3"], &["c3", "4"]]);
        let all = Table::concat(vec![a, b]);

        assert_eq!(all.n_rows(), 3);
        assert_eq!(all.column_names(), vec!["Cell", "CellType", "Score"]);
        let cell_type = &all.column("CellType").unwrap().values;
        assert_eq!(cell_type, &vec![Value::from("T1"), Value::Null, Value::Null]);
        let score = &all.column("Score").unwrap().values;
        assert_eq!(score, &vec![Value::Null, Value::Integer(3), Value::Integer(4)]);
    }

    #[test]
    fn concat_of_nothing_is_empty() {
        let t = Table::concat(Vec::new());
        assert!(t.is_empty());
        assert!(t.columns().is_empty());
    }

    #[test]
    fn set_constant_column_overwrites_existing() {
        let mut t = table(&["Cell", "DonorID"], &[&["c1", "old"], &["c2", "old"]]);
        t.set_constant_column("DonorID", Value::from("new"));
        assert_eq!(t.column_names(), vec!["Cell", "DonorID"]);
        assert!(t.column("DonorID").unwrap().values.iter().all(|v| v == &Value::from("new")));

        t.set_constant_column("Batch", Value::Integer(1));
        assert_eq!(t.column("Batch").unwrap().values.len(), 2);
    }

    #[test]
    fn unique_keeps_first_appearance_order() {
        let t = table(&["CellType"], &[&["B"], &["A"], &["B"], &["C"]]);
        assert_eq!(
            t.unique("CellType").unwrap(),
            vec![Value::from("B"), Value::from("A"), Value::from("C")]
        );
        assert!(t.unique("Missing").is_none());
    }

    #[test]
    fn group_and_value_counts() {
        let t = table(
            &["DonorID", "CellType"],
            &[&["X2", "T"], &["X1", "B"], &["X1", "T"], &["X1", "T"]],
        );
        let groups = t.group_count(&["DonorID", "CellType"]).unwrap();
        assert_eq!(
            groups,
            vec![
                (vec![Value::from("X1"), Value::from("B")], 1),
                (vec![Value::from("X1"), Value::from("T")], 2),
                (vec![Value::from("X2"), Value::from("T")], 1),
            ]
        );

        let counts = t.value_counts("CellType").unwrap();
        assert_eq!(counts, vec![(Value::from("T"), 3), (Value::from("B"), 1)]);
        assert!(t.group_count(&["DonorID", "Nope"]).is_none());
    }
}

//! Record filters
//!
//! A small, bounded predicate model over persisted records. Field references
//! are dotted paths (`ChildObject.Number`). Filters are either built in code:
//!
//! ```
//! use docrepo_core::filter::Filter;
//!
//! let f = Filter::eq("Status", "open").and(Filter::gt("Priority", 2));
//! ```
//!
//! or parsed from text:
//!
//! ```
//! use docrepo_core::filter::Filter;
//!
//! let f: Filter = r#"Status == "open" && Priority > 2"#.parse().unwrap();
//! assert!(f.matches(&serde_json::json!({ "Status": "open", "Priority": 3 })));
//! ```
//!
//! The text grammar is `clause ((&& | and | || | or) clause)*` where a clause
//! is `path op literal` with `op` one of `== != > >= < <= contains`. `&&` binds
//! tighter than `||`. Literals are double-quoted strings, numbers, `true`,
//! `false` and `null`.

use crate::error::{RepoError, RepoResult};
use crate::path::Selector;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
        }
    }
}

/// A predicate over persisted records
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches everything
    #[default]
    All,
    /// Compare the value at `field` with a literal
    Compare {
        /// Dotted field path
        field: String,
        /// Operator
        op: Comparison,
        /// Literal to compare against
        value: Value,
    },
    /// Array at `field` contains `value`, or string at `field` contains it
    Contains {
        /// Dotted field path
        field: String,
        /// Element or substring
        value: Value,
    },
    /// All sub-filters match
    And(Vec<Filter>),
    /// Any sub-filter matches
    Or(Vec<Filter>),
    /// Sub-filter does not match
    Not(Box<Filter>),
}

impl Filter {
    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ne, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    /// `field contains value`
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Start a filter on the field a selector points at
    pub fn on<R, V>(selector: &Selector<R, V>) -> RepoResult<FieldRef> {
        Ok(FieldRef {
            path: selector.dot_path()?,
        })
    }

    /// Conjunction, flattening nested `And` and dropping `All`
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested `Or`
    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (left, right) => Filter::Or(vec![left, right]),
        }
    }

    /// Negation
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare { field, op, value } => {
                let actual = lookup(record, field).unwrap_or(&Value::Null);
                match op {
                    Comparison::Eq => values_equal(actual, value),
                    Comparison::Ne => !values_equal(actual, value),
                    Comparison::Gt => ordered(actual, value) == Some(Ordering::Greater),
                    Comparison::Ge => matches!(
                        ordered(actual, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    Comparison::Lt => ordered(actual, value) == Some(Ordering::Less),
                    Comparison::Le => matches!(
                        ordered(actual, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                }
            }
            Filter::Contains { field, value } => match lookup(record, field) {
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, value)),
                Some(Value::String(s)) => value.as_str().map(|v| s.contains(v)).unwrap_or(false),
                _ => false,
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "true"),
            Filter::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            Filter::Contains { field, value } => write!(f, "{} contains {}", field, value),
            Filter::And(filters) => write_joined(f, filters, " && "),
            Filter::Or(filters) => write_joined(f, filters, " || "),
            Filter::Not(inner) => write!(f, "!({})", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, filters: &[Filter], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", filter)?;
    }
    write!(f, ")")
}

/// A field reference produced from a selector, awaiting its operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    path: String,
}

impl FieldRef {
    /// Dotted path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `field == value`
    pub fn eq(self, value: impl Into<Value>) -> Filter {
        Filter::eq(self.path, value)
    }

    /// `field != value`
    pub fn ne(self, value: impl Into<Value>) -> Filter {
        Filter::ne(self.path, value)
    }

    /// `field > value`
    pub fn gt(self, value: impl Into<Value>) -> Filter {
        Filter::gt(self.path, value)
    }

    /// `field < value`
    pub fn lt(self, value: impl Into<Value>) -> Filter {
        Filter::lt(self.path, value)
    }

    /// `field contains value`
    pub fn contains(self, value: impl Into<Value>) -> Filter {
        Filter::contains(self.path, value)
    }
}

// =============================================================================
// Value helpers
// =============================================================================

/// Resolve a dotted path inside a record
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(record);
    }
    path.split('.').try_fold(record, |current, key| current.get(key))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values used for sorting
///
/// Values of different kinds order by kind (null, bool, number, string,
/// array, object). Arrays and objects of the same kind compare equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match ordered(a, b) {
        Some(order) => order,
        None => type_rank(a).cmp(&type_rank(b)),
    }
}

// =============================================================================
// Text parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Op(Comparison),
    Contains,
    And,
    Or,
    Literal(Value),
}

fn invalid(msg: impl Into<String>) -> RepoError {
    RepoError::InvalidInput(msg.into())
}

fn tokenize(input: &str) -> RepoResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '"' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(invalid("unterminated string literal")),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = chars
                                .get(i + 1)
                                .ok_or_else(|| invalid("dangling escape in string literal"))?;
                            text.push(*escaped);
                            i += 2;
                        }
                        Some(ch) => {
                            text.push(*ch);
                            i += 1;
                        }
                    }
                }
                i += 1;
                tokens.push(Token::Literal(Value::String(text)));
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(invalid(format!("expected '{0}{0}' at position {1}", c, i)));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '=' | '!' | '<' | '>' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, next_is_eq) {
                    ('=', true) => Comparison::Eq,
                    ('!', true) => Comparison::Ne,
                    ('<', true) => Comparison::Le,
                    ('>', true) => Comparison::Ge,
                    ('<', false) => Comparison::Lt,
                    ('>', false) => Comparison::Gt,
                    _ => return Err(invalid(format!("unexpected '{}' at position {}", c, i))),
                };
                tokens.push(Token::Op(op));
                i += if next_is_eq { 2 } else { 1 };
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E' | '+' | '-'))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: Value = serde_json::from_str(&text)
                    .map_err(|_| invalid(format!("invalid number literal '{}'", text)))?;
                tokens.push(Token::Literal(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "contains" => Token::Contains,
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "null" => Token::Literal(Value::Null),
                    _ => Token::Path(word),
                });
            }
            other => {
                return Err(invalid(format!(
                    "unexpected character '{}' at position {}",
                    other, i
                )))
            }
        }
    }

    Ok(tokens)
}

fn parse_clause(tokens: &[Token]) -> RepoResult<Filter> {
    match tokens {
        [Token::Path(field), Token::Op(op), Token::Literal(value)] => Ok(Filter::Compare {
            field: field.clone(),
            op: *op,
            value: value.clone(),
        }),
        [Token::Path(field), Token::Contains, Token::Literal(value)] => {
            Ok(Filter::contains(field.clone(), value.clone()))
        }
        _ => Err(invalid("expected clause of the form `path op literal`")),
    }
}

impl FromStr for Filter {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        if tokens.is_empty() {
            return Ok(Filter::All);
        }

        let mut disjuncts = Vec::new();
        for group in tokens.split(|t| *t == Token::Or) {
            let mut conjunction = Filter::All;
            for clause in group.split(|t| *t == Token::And) {
                conjunction = conjunction.and(parse_clause(clause)?);
            }
            disjuncts.push(conjunction);
        }

        Ok(match disjuncts.len() {
            1 => disjuncts.remove(0),
            _ => Filter::Or(disjuncts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Field;
    use serde_json::json;

    #[test]
    fn test_compare_numbers_across_representations() {
        let record = json!({ "Number": 5 });
        assert!(Filter::eq("Number", 5.0).matches(&record));
        assert!(Filter::gt("Number", 4).matches(&record));
        assert!(!Filter::lt("Number", 5).matches(&record));
        assert!(Filter::le("Number", 5).matches(&record));
    }

    #[test]
    fn test_nested_lookup() {
        let record = json!({ "ChildObject": { "Number": 8 } });
        assert!(Filter::eq("ChildObject.Number", 8).matches(&record));
        assert!(!Filter::eq("ChildObject.Missing", 8).matches(&record));
    }

    #[test]
    fn test_missing_field_compares_as_null() {
        let record = json!({});
        assert!(Filter::eq("Gone", Value::Null).matches(&record));
        assert!(!Filter::gt("Gone", 1).matches(&record));
    }

    #[test]
    fn test_contains_array_and_string() {
        let record = json!({ "ItemType": ["Child", "Base"], "Name": "hello world" });
        assert!(Filter::contains("ItemType", "Base").matches(&record));
        assert!(!Filter::contains("ItemType", "Other").matches(&record));
        assert!(Filter::contains("Name", "lo wo").matches(&record));
    }

    #[test]
    fn test_and_flattens_and_drops_all() {
        let f = Filter::All
            .and(Filter::eq("A", 1))
            .and(Filter::eq("B", 2))
            .and(Filter::All);
        match f {
            Filter::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
        assert_eq!(Filter::All.and(Filter::All), Filter::All);
    }

    #[test]
    fn test_parse_precedence() {
        let f: Filter = r#"A == 1 && B == 2 || C == "x""#.parse().unwrap();
        assert!(f.matches(&json!({ "A": 1, "B": 2 })));
        assert!(f.matches(&json!({ "C": "x" })));
        assert!(!f.matches(&json!({ "A": 1, "C": "y" })));
    }

    #[test]
    fn test_parse_keywords_and_literals() {
        let f: Filter = "IsActive == true and Score >= -1.5 and Tags contains \"red\""
            .parse()
            .unwrap();
        assert!(f.matches(&json!({ "IsActive": true, "Score": 0, "Tags": ["red"] })));
        assert!(!f.matches(&json!({ "IsActive": false, "Score": 0, "Tags": ["red"] })));
    }

    #[test]
    fn test_parse_empty_is_all() {
        assert_eq!("   ".parse::<Filter>().unwrap(), Filter::All);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "A ==".parse::<Filter>(),
            Err(RepoError::InvalidInput(_))
        ));
        assert!(matches!(
            "A = 1".parse::<Filter>(),
            Err(RepoError::InvalidInput(_))
        ));
        assert!(matches!(
            "A == \"open".parse::<Filter>(),
            Err(RepoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_filter_from_selector() {
        struct Doc;
        struct Child;
        const CHILD: Field<Doc, Child> = Field::new("ChildObject");
        const NUMBER: Field<Child, i32> = Field::new("Number");

        let selector = Selector::<Doc>::root().field(CHILD).field(NUMBER);
        let f = Filter::on(&selector).unwrap().eq(12);
        assert_eq!(f, Filter::eq("ChildObject.Number", 12));
    }

    #[test]
    fn test_compare_values_orders_kinds() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }

    #[test]
    fn test_display_renders_clauses() {
        let f = Filter::eq("A", 1).and(Filter::ne("B", "x"));
        let text = f.to_string();
        assert!(text.contains("A == 1"));
        assert!(text.contains("B != \"x\""));
    }
}

//! InfluxQL Abstract Syntax Tree
//!
//! Typed representation of the SELECT statements the transpiler consumes.
//! Statements normally arrive already parsed; [`crate::influxql::parse_query`]
//! is a convenience front-end producing the same types.
//!
//! # Example Queries
//!
//! ```text
//! SELECT mean(value) FROM db0..cpu GROUP BY host
//! SELECT max(usage) FROM telegraf.autogen.cpu WHERE time > now() - 1h GROUP BY time(10m)
//! ```

use std::fmt;

/// One or more statements submitted together
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub statements: Vec<SelectStatement>,
}

impl Query {
    /// Create a query from a single statement
    pub fn single(statement: SelectStatement) -> Self {
        Self {
            statements: vec![statement],
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

/// A parsed SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Projected fields, in source order
    pub fields: Vec<Field>,
    /// FROM clause sources
    pub sources: Vec<Source>,
    /// WHERE clause, time predicates included
    pub condition: Option<Expr>,
    /// GROUP BY dimensions, in source order
    pub dimensions: Vec<Dimension>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectStatement {
    /// Start building a statement selecting from a measurement
    pub fn from_measurement(measurement: Measurement) -> SelectBuilder {
        SelectBuilder::new(measurement)
    }

    /// The `GROUP BY time(...)` dimension, if any
    pub fn time_dimension(&self) -> Option<&Expr> {
        self.dimensions.iter().map(|d| &d.expr).find(|e| match e {
            Expr::Call { name, .. } => name.eq_ignore_ascii_case("time"),
            _ => false,
        })
    }

    /// Whether any projected field contains a function call
    pub fn has_call(&self) -> bool {
        self.fields.iter().any(|f| f.expr.contains_call())
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        write_list(f, &self.fields)?;
        write!(f, " FROM ")?;
        write_list(f, &self.sources)?;
        if let Some(cond) = &self.condition {
            write!(f, " WHERE {}", cond)?;
        }
        if !self.dimensions.is_empty() {
            write!(f, " GROUP BY ")?;
            write_list(f, &self.dimensions)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// A projected field in the SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    /// Optional `AS` alias
    pub alias: Option<String>,
}

impl Field {
    /// Create a field without alias
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Base column name before de-duplication: the alias, else the first
    /// function name, else the first referenced field.
    pub fn name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        self.expr.base_name().unwrap_or_default()
    }

    /// True for a bare `time` reference, which is implicit in every result
    pub fn is_time(&self) -> bool {
        matches!(&self.expr, Expr::VarRef(name) if is_time_ref(name))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", quote_ident(alias))?;
        }
        Ok(())
    }
}

/// A FROM clause source
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Measurement(Measurement),
    /// `/regex/` measurement selector
    Regex(String),
    Subquery(Box<SelectStatement>),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measurement(m) => write!(f, "{}", m),
            Self::Regex(re) => write!(f, "/{}/", re.replace('/', "\\/")),
            Self::Subquery(stmt) => write!(f, "({})", stmt),
        }
    }
}

/// A fully or partially qualified measurement reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub database: Option<String>,
    pub retention_policy: Option<String>,
    pub name: String,
}

impl Measurement {
    /// Unqualified measurement
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            retention_policy: None,
            name: name.into(),
        }
    }

    /// Builder method: set the database
    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    /// Builder method: set the retention policy
    pub fn retention_policy(mut self, rp: impl Into<String>) -> Self {
        self.retention_policy = Some(rp.into());
        self
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.database, &self.retention_policy) {
            (Some(db), Some(rp)) => write!(f, "{}.{}.", quote_ident(db), quote_ident(rp))?,
            (Some(db), None) => write!(f, "{}..", quote_ident(db))?,
            (None, Some(rp)) => write!(f, "{}.", quote_ident(rp))?,
            (None, None) => {}
        }
        write!(f, "{}", quote_ident(&self.name))
    }
}

/// A GROUP BY dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub expr: Expr,
}

impl Dimension {
    /// Group by a tag
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            expr: Expr::VarRef(name.into()),
        }
    }

    /// Group by `time(every)`
    pub fn time(every: i64) -> Self {
        Self {
            expr: Expr::call("time", vec![Expr::Literal(Literal::Duration(every))]),
        }
    }

    /// Group by `time(every, offset)`
    pub fn time_with_offset(every: i64, offset: Expr) -> Self {
        Self {
            expr: Expr::call("time", vec![Expr::Literal(Literal::Duration(every)), offset]),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// Scalar and boolean expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a field, tag or `time`
    VarRef(String),
    /// Function call such as `mean(value)` or `now()`
    Call { name: String, args: Vec<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Paren(Box<Expr>),
    Literal(Literal),
    Wildcard,
}

impl Expr {
    /// Field or tag reference
    pub fn var(name: impl Into<String>) -> Self {
        Self::VarRef(name.into())
    }

    /// Function call
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            name: name.into(),
            args,
        }
    }

    /// Binary expression
    pub fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// String literal
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    /// `now()`
    pub fn now() -> Self {
        Self::call("now", Vec::new())
    }

    /// Does this expression reference `time` anywhere
    pub fn references_time(&self) -> bool {
        match self {
            Self::VarRef(name) => is_time_ref(name),
            Self::Call { args, .. } => args.iter().any(Expr::references_time),
            Self::Binary { lhs, rhs, .. } => lhs.references_time() || rhs.references_time(),
            Self::Not(inner) | Self::Paren(inner) => inner.references_time(),
            Self::Literal(_) | Self::Wildcard => false,
        }
    }

    /// Does this expression contain a function call
    pub fn contains_call(&self) -> bool {
        match self {
            Self::Call { .. } => true,
            Self::Binary { lhs, rhs, .. } => lhs.contains_call() || rhs.contains_call(),
            Self::Not(inner) | Self::Paren(inner) => inner.contains_call(),
            Self::VarRef(_) | Self::Literal(_) | Self::Wildcard => false,
        }
    }

    /// Does this expression contain a wildcard
    pub fn contains_wildcard(&self) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Call { args, .. } => args.iter().any(Expr::contains_wildcard),
            Self::Binary { lhs, rhs, .. } => lhs.contains_wildcard() || rhs.contains_wildcard(),
            Self::Not(inner) | Self::Paren(inner) => inner.contains_wildcard(),
            Self::VarRef(_) | Self::Literal(_) => false,
        }
    }

    /// Name used for the result column: first call name, else first reference
    fn base_name(&self) -> Option<String> {
        match self {
            Self::Call { name, .. } => Some(name.to_lowercase()),
            Self::VarRef(name) => Some(name.clone()),
            Self::Binary { lhs, rhs, .. } => {
                let calls = [lhs.as_ref(), rhs.as_ref()];
                calls
                    .iter()
                    .find(|e| e.contains_call())
                    .and_then(|e| e.base_name())
                    .or_else(|| lhs.base_name())
                    .or_else(|| rhs.base_name())
            }
            Self::Not(inner) | Self::Paren(inner) => inner.base_name(),
            Self::Literal(_) | Self::Wildcard => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VarRef(name) => write!(f, "{}", quote_ident(name)),
            Self::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Self::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Self::Not(inner) => write!(f, "NOT {}", inner),
            Self::Paren(inner) => write!(f, "({})", inner),
            Self::Literal(lit) => write!(f, "{}", lit),
            Self::Wildcard => write!(f, "*"),
        }
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Duration in nanoseconds
    Duration(i64),
    /// Regex pattern without the surrounding slashes
    Regex(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{:?}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Duration(d) => write!(f, "{}", format_duration(*d)),
            Self::Regex(re) => write!(f, "/{}/", re.replace('/', "\\/")),
        }
    }
}

/// Binary operators, arithmetic through logical
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// `=~`
    RegexMatch,
    /// `!~`
    RegexNotMatch,
    And,
    Or,
}

impl BinaryOp {
    /// Comparison operators yield booleans from two scalars
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::Ne
                | Self::Lt
                | Self::Lte
                | Self::Gt
                | Self::Gte
                | Self::RegexMatch
                | Self::RegexNotMatch
        )
    }

    /// The operator with operands swapped (`a < b` == `b > a`)
    pub fn flip(&self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            other => *other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::RegexMatch => "=~",
            Self::RegexNotMatch => "!~",
            Self::And => "AND",
            Self::Or => "OR",
        };
        write!(f, "{}", s)
    }
}

/// Builder for constructing statements programmatically
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    fields: Vec<Field>,
    measurement: Measurement,
    condition: Option<Expr>,
    dimensions: Vec<Dimension>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    /// Create a new builder over a measurement
    pub fn new(measurement: Measurement) -> Self {
        Self {
            fields: Vec::new(),
            measurement,
            condition: None,
            dimensions: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add a projected field
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add `function(field)`
    pub fn call(self, function: &str, field: &str) -> Self {
        self.field(Field::new(Expr::call(function, vec![Expr::var(field)])))
    }

    /// Add a raw field reference
    pub fn raw(self, field: &str) -> Self {
        self.field(Field::new(Expr::var(field)))
    }

    /// Set the WHERE clause
    pub fn condition(mut self, cond: Expr) -> Self {
        self.condition = Some(cond);
        self
    }

    /// Add a GROUP BY dimension
    pub fn group_by(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Add a GROUP BY tag
    pub fn group_by_tag(self, tag: &str) -> Self {
        self.group_by(Dimension::tag(tag))
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Build the statement
    pub fn build(self) -> SelectStatement {
        SelectStatement {
            fields: self.fields,
            sources: vec![Source::Measurement(self.measurement)],
            condition: self.condition,
            dimensions: self.dimensions,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// `time` is matched case-insensitively
pub fn is_time_ref(name: &str) -> bool {
    name.eq_ignore_ascii_case("time")
}

const NANOS_PER_UNIT: [(&str, i64); 7] = [
    ("w", 7 * 24 * 3_600_000_000_000),
    ("d", 24 * 3_600_000_000_000),
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("u", 1_000),
];

/// Render a nanosecond duration using the largest unit that divides it
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    for (unit, size) in NANOS_PER_UNIT {
        if nanos % size == 0 {
            return format!("{}{}", nanos / size, unit);
        }
    }
    format!("{}ns", nanos)
}

fn quote_ident(name: &str) -> String {
    let bare = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if bare {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_basic() {
        let stmt = SelectStatement::from_measurement(Measurement::new("cpu").database("db0"))
            .call("mean", "value")
            .group_by_tag("host")
            .build();

        assert_eq!(stmt.fields.len(), 1);
        assert_eq!(stmt.dimensions.len(), 1);
        assert!(stmt.has_call());
        assert_eq!(stmt.to_string(), "SELECT mean(value) FROM db0..cpu GROUP BY host");
    }

    #[test]
    fn test_field_names() {
        assert_eq!(Field::new(Expr::call("MEAN", vec![Expr::var("v")])).name(), "mean");
        assert_eq!(Field::new(Expr::var("usage")).name(), "usage");
        assert_eq!(
            Field::new(Expr::call("max", vec![Expr::var("v")]))
                .with_alias("peak")
                .name(),
            "peak"
        );

        let scaled = Expr::binary(
            Expr::Literal(Literal::Integer(2)),
            BinaryOp::Mul,
            Expr::call("sum", vec![Expr::var("v")]),
        );
        assert_eq!(Field::new(scaled).name(), "sum");
    }

    #[test]
    fn test_time_detection() {
        let cond = Expr::binary(
            Expr::binary(Expr::var("host"), BinaryOp::Eq, Expr::string("a")),
            BinaryOp::And,
            Expr::binary(Expr::var("TIME"), BinaryOp::Gt, Expr::now()),
        );
        assert!(cond.references_time());
        assert!(Field::new(Expr::var("time")).is_time());
        assert!(!Field::new(Expr::var("timer")).is_time());
    }

    #[test]
    fn test_time_dimension_lookup() {
        let stmt = SelectStatement::from_measurement(Measurement::new("cpu"))
            .call("count", "value")
            .group_by_tag("host")
            .group_by(Dimension::time(60_000_000_000))
            .build();

        assert_eq!(stmt.time_dimension().map(|e| e.to_string()).as_deref(), Some("time(1m)"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3_600_000_000_000), "1h");
        assert_eq!(format_duration(90_000_000_000), "90s");
        assert_eq!(format_duration(1_500), "1500ns");
        assert_eq!(format_duration(0), "0s");
    }

    #[test]
    fn test_display_quoting() {
        let m = Measurement::new("cpu load").database("db0").retention_policy("autogen");
        assert_eq!(m.to_string(), "db0.autogen.\"cpu load\"");
        assert_eq!(Literal::String("it's".into()).to_string(), "'it\\'s'");
    }

    #[test]
    fn test_flip_operator() {
        assert_eq!(BinaryOp::Lt.flip(), BinaryOp::Gt);
        assert_eq!(BinaryOp::Gte.flip(), BinaryOp::Lte);
        assert_eq!(BinaryOp::Eq.flip(), BinaryOp::Eq);
    }
}

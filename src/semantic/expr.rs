//! Function expression tree

use serde::{Deserialize, Serialize};
use std::fmt;

/// A lambda over named row parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpression {
    pub params: Vec<String>,
    pub body: Expression,
}

impl FunctionExpression {
    /// Single-parameter function, the shape used by filter and map
    pub fn row(param: impl Into<String>, body: Expression) -> Self {
        Self {
            params: vec![param.into()],
            body,
        }
    }
}

impl fmt::Display for FunctionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) => {}", self.params.join(", "), self.body)
    }
}

/// Expression tree nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expression {
    Identifier {
        name: String,
    },
    Member {
        object: Box<Expression>,
        property: String,
    },
    StringLiteral {
        value: String,
    },
    IntegerLiteral {
        value: i64,
    },
    FloatLiteral {
        value: f64,
    },
    BooleanLiteral {
        value: bool,
    },
    /// Nanoseconds
    DurationLiteral {
        value: i64,
    },
    RegexpLiteral {
        value: String,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        argument: Box<Expression>,
    },
    Object {
        properties: Vec<Property>,
    },
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }

    /// `object.property` where `object` is an identifier
    pub fn member(object: impl Into<String>, property: impl Into<String>) -> Self {
        Self::Member {
            object: Box::new(Self::identifier(object)),
            property: property.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::StringLiteral {
            value: value.into(),
        }
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Self {
        Self::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Self::logical(LogicalOperator::And, left, right)
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Self::logical(LogicalOperator::Or, left, right)
    }

    /// `left == right`
    pub fn equal(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOperator::Equal, left, right)
    }

    pub fn not(argument: Expression) -> Self {
        Self::Unary {
            operator: UnaryOperator::Not,
            argument: Box::new(argument),
        }
    }

    pub fn object(properties: Vec<Property>) -> Self {
        Self::Object { properties }
    }

    /// Properties of an object expression
    pub fn properties(&self) -> Option<&[Property]> {
        match self {
            Self::Object { properties } => Some(properties),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier { name } => write!(f, "{}", name),
            Self::Member { object, property } => {
                if is_plain_property(property) {
                    write!(f, "{}.{}", object, property)
                } else {
                    write!(f, "{}[{:?}]", object, property)
                }
            }
            Self::StringLiteral { value } => write!(f, "{:?}", value),
            Self::IntegerLiteral { value } => write!(f, "{}", value),
            Self::FloatLiteral { value } => write!(f, "{:?}", value),
            Self::BooleanLiteral { value } => write!(f, "{}", value),
            Self::DurationLiteral { value } => {
                write!(f, "{}", crate::influxql::format_duration(*value))
            }
            Self::RegexpLiteral { value } => write!(f, "/{}/", value),
            Self::Binary {
                operator,
                left,
                right,
            } => write!(f, "{} {} {}", left, operator, right),
            Self::Logical {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Self::Unary { operator, argument } => write!(f, "{} {}", operator, argument),
            Self::Object { properties } => {
                write!(f, "{{")?;
                for (i, p) in properties.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", p.key, p.value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn is_plain_property(name: &str) -> bool {
    name.chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A key/value pair of an object expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: Expression,
}

impl Property {
    pub fn new(key: impl Into<String>, value: Expression) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Scalar binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    RegexpMatch,
    NotRegexpMatch,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
            Self::RegexpMatch => "=~",
            Self::NotRegexpMatch => "!~",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => write!(f, "not"),
        }
    }
}

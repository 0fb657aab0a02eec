// ABOUTME: Evaluator for parsed selector expressions over a service definition.
// ABOUTME: Implements the comparison, membership and truthiness rules of the expression language.

use std::cmp::Ordering;
use std::fmt;

use super::error::SelectorError;
use super::parser::{BinaryOp, BoolOp, CompareOp, Const, Expr, Method};

/// Runtime value of a selector expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
        }
    }

    fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(n) => Some(Number::Int(*n)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

impl From<&serde_yaml::Value> for Value {
    fn from(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::None,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => Value::Str(s.clone()),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (Value::from(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(&tagged.value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

/// Names visible to an expression: `service` and `name`.
pub struct Scope {
    service: Value,
    name: String,
}

impl Scope {
    pub fn new(name: &str, definition: &serde_yaml::Value) -> Self {
        Self {
            service: Value::from(definition),
            name: name.to_string(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, SelectorError> {
        match name {
            "service" => Ok(self.service.clone()),
            "name" => Ok(Value::Str(self.name.clone())),
            other => Err(SelectorError::UnknownName(other.to_string())),
        }
    }
}

pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value, SelectorError> {
    match expr {
        Expr::Const(c) => Ok(match c {
            Const::None => Value::None,
            Const::Bool(b) => Value::Bool(*b),
            Const::Int(n) => Value::Int(*n),
            Const::Float(f) => Value::Float(*f),
            Const::Str(s) => Value::Str(s.clone()),
        }),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Name(name) => scope.lookup(name),
        Expr::Subscript { target, index } => {
            subscript(evaluate(target, scope)?, &evaluate(index, scope)?)
        }
        Expr::Call {
            target,
            method,
            args,
        } => {
            let target = evaluate(target, scope)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(target, *method, &args)
        }
        Expr::Neg(operand) => match evaluate(operand, scope)?.as_number() {
            Some(Number::Int(n)) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| SelectorError::Type("integer overflow".to_string())),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(SelectorError::Type(
                "bad operand type for unary -".to_string(),
            )),
        },
        Expr::Not(operand) => Ok(Value::Bool(!evaluate(operand, scope)?.is_truthy())),
        Expr::Binary { op, left, right } => {
            binary(*op, evaluate(left, scope)?, evaluate(right, scope)?)
        }
        Expr::Compare { first, rest } => {
            let mut left = evaluate(first, scope)?;
            for (op, right) in rest {
                let right = evaluate(right, scope)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::Bool { op, left, right } => {
            let left = evaluate(left, scope)?;
            match (op, left.is_truthy()) {
                (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                _ => evaluate(right, scope),
            }
        }
    }
}

fn subscript(target: Value, index: &Value) -> Result<Value, SelectorError> {
    match target {
        Value::Map(entries) => entries
            .into_iter()
            .find(|(k, _)| equals(k, index))
            .map(|(_, v)| v)
            .ok_or_else(|| SelectorError::KeyNotFound(index.to_string())),
        Value::List(items) => {
            let i = sequence_index(index, items.len())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = sequence_index(index, chars.len())?;
            Ok(Value::Str(chars[i].to_string()))
        }
        other => Err(SelectorError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn sequence_index(index: &Value, len: usize) -> Result<usize, SelectorError> {
    let Value::Int(i) = index else {
        return Err(SelectorError::Type(format!(
            "indices must be integers, not {}",
            index.type_name()
        )));
    };
    let resolved = if *i < 0 { *i + len as i64 } else { *i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(SelectorError::IndexOutOfRange(*i));
    }
    Ok(resolved as usize)
}

fn call(target: Value, method: Method, args: &[Value]) -> Result<Value, SelectorError> {
    let Value::Str(s) = target else {
        return Err(SelectorError::Type(format!(
            "'{}' object has no attribute '{}'",
            target.type_name(),
            method.name()
        )));
    };

    match method {
        Method::StartsWith | Method::EndsWith => {
            let [arg] = args else {
                return Err(arity(method, 1, args.len()));
            };
            let candidates: Vec<&str> = match arg {
                Value::Str(prefix) => vec![prefix.as_str()],
                Value::List(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::Str(p) => Ok(p.as_str()),
                        other => Err(type_arg(method, other)),
                    })
                    .collect::<Result<_, _>>()?,
                other => return Err(type_arg(method, other)),
            };
            let hit = candidates.iter().any(|c| match method {
                Method::StartsWith => s.starts_with(c),
                _ => s.ends_with(c),
            });
            Ok(Value::Bool(hit))
        }
        Method::Lower | Method::Upper => {
            if !args.is_empty() {
                return Err(arity(method, 0, args.len()));
            }
            Ok(Value::Str(match method {
                Method::Lower => s.to_lowercase(),
                _ => s.to_uppercase(),
            }))
        }
        Method::Strip => match args {
            [] => Ok(Value::Str(s.trim().to_string())),
            [Value::Str(chars)] => Ok(Value::Str(
                s.trim_matches(|c| chars.contains(c)).to_string(),
            )),
            [other] => Err(type_arg(method, other)),
            _ => Err(arity(method, 1, args.len())),
        },
    }
}

fn arity(method: Method, expected: usize, given: usize) -> SelectorError {
    SelectorError::Type(format!(
        "{}() takes {} argument(s) ({} given)",
        method.name(),
        expected,
        given
    ))
}

fn type_arg(method: Method, arg: &Value) -> SelectorError {
    SelectorError::Type(format!(
        "{}() argument must be str, not {}",
        method.name(),
        arg.type_name()
    ))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, SelectorError> {
    let symbol = match op {
        BinaryOp::Add => '+',
        BinaryOp::Sub => '-',
    };

    match (op, &left, &right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => return Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            return Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()));
        }
        _ => {}
    }

    match (left.as_number(), right.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| SelectorError::Type("integer overflow".to_string()))
        }
        (Some(a), Some(b)) => Ok(Value::Float(match op {
            BinaryOp::Add => a.as_f64() + b.as_f64(),
            BinaryOp::Sub => a.as_f64() - b.as_f64(),
        })),
        _ => Err(SelectorError::Type(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            symbol,
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, SelectorError> {
    match op {
        CompareOp::Eq => Ok(equals(left, right)),
        CompareOp::NotEq => Ok(!equals(left, right)),
        CompareOp::Is => Ok(identical(left, right)),
        CompareOp::IsNot => Ok(!identical(left, right)),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Lt | CompareOp::LtE | CompareOp::Gt | CompareOp::GtE => {
            let ordering = order(left, right).ok_or_else(|| {
                SelectorError::Type(format!(
                    "ordering not supported between instances of '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            Ok(match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::LtE => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        };
    }

    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| {
                    b.iter()
                        .any(|(other_k, other_v)| equals(k, other_k) && equals(v, other_v))
                })
        }
        _ => false,
    }
}

/// Identity for singletons and scalars. Containers are never identical.
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, SelectorError> {
    match container {
        Value::Map(entries) => Ok(entries.iter().any(|(k, _)| equals(k, item))),
        Value::List(items) => Ok(items.iter().any(|x| equals(x, item))),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => Err(SelectorError::Type(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(SelectorError::Type(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        };
    }

    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !equals(x, y) {
                    return order(x, y);
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

/// The language's sentinel booleans. `nocap` is the true value and `cap`
/// the false value; comparisons and logical opcodes produce and consume
/// these sentinels, never a bare host boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Truth {
    Nocap,
    Cap,
}

impl Truth {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Truth::Nocap
        } else {
            Truth::Cap
        }
    }

    pub fn is_true(self) -> bool {
        self == Truth::Nocap
    }

    pub fn negate(self) -> Self {
        match self {
            Truth::Nocap => Truth::Cap,
            Truth::Cap => Truth::Nocap,
        }
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truth::Nocap => write!(f, "nocap"),
            Truth::Cap => write!(f, "cap"),
        }
    }
}

/// Surface types. Shared by the AST, the function table, and the INPUT
/// opcode (which needs to know what to coerce the read line into).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Int,
    Float,
    Bool,
    Str,
    Void,
    Array(Box<Type>),
    Stack(Box<Type>),
    Queue(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// Placeholder for `spill()` before the declaration's target type is
    /// known; the type checker treats it as a wildcard.
    Unknown,
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_indexable(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Map(_, _) | Type::Str)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "string"),
            Type::Void => write!(f, "void"),
            Type::Array(t) => write!(f, "{t}[]"),
            Type::Stack(t) => write!(f, "stack<{t}>"),
            Type::Queue(t) => write!(f, "queue<{t}>"),
            Type::Map(k, v) => write!(f, "hashmap<{k}, {v}>"),
            Type::Unknown => write!(f, "undefined"),
        }
    }
}

/// Values usable as hashmap keys. Ordered so map rendering is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapKey {
    Int(i64),
    Str(String),
    Bool(Truth),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Int(n) => write_int(f, *n),
            MapKey::Str(s) => write!(f, "{s}"),
            MapKey::Bool(t) => write!(f, "{t}"),
        }
    }
}

/// Runtime values. Collections carry shared interior mutability so that
/// every binding of the same collection observes in-place mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Void,
    Int(i64),
    Float(f64),
    Bool(Truth),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Stack(Rc<RefCell<Vec<Value>>>),
    Queue(Rc<RefCell<VecDeque<Value>>>),
    Map(Rc<RefCell<BTreeMap<MapKey, Value>>>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn new_stack() -> Self {
        Value::Stack(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn new_queue() -> Self {
        Value::Queue(Rc::new(RefCell::new(VecDeque::new())))
    }

    pub fn new_map() -> Self {
        Value::Map(Rc::new(RefCell::new(BTreeMap::new())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Stack(_) => "stack",
            Value::Queue(_) => "queue",
            Value::Map(_) => "hashmap",
        }
    }

    /// Key form of this value, if it can key a hashmap.
    pub fn as_key(&self) -> Option<MapKey> {
        match self {
            Value::Int(n) => Some(MapKey::Int(*n)),
            Value::Str(s) => Some(MapKey::Str(s.clone())),
            Value::Bool(t) => Some(MapKey::Bool(*t)),
            _ => None,
        }
    }
}

/// Coerce one raw input line to the declared target type. `Unknown`
/// infers: integer text becomes an int, `x.y` text a float, anything
/// else stays a string.
pub fn coerce_input(ty: &Type, raw: &str) -> Result<Value, String> {
    let text = raw.trim_end_matches(['\n', '\r']);
    let numeric = text.strip_prefix('~').unwrap_or(text);
    match ty {
        Type::Int => match numeric.parse::<i64>() {
            Ok(n) if text.starts_with('~') => Ok(Value::Int(-n)),
            Ok(n) => Ok(Value::Int(n)),
            Err(_) => Err(format!("expected an int, got {text:?}")),
        },
        Type::Float => match numeric.parse::<f64>() {
            Ok(x) if text.starts_with('~') => Ok(Value::Float(-x)),
            Ok(x) => Ok(Value::Float(x)),
            Err(_) => Err(format!("expected a float, got {text:?}")),
        },
        Type::Bool => match text {
            "nocap" => Ok(Value::Bool(Truth::Nocap)),
            "cap" => Ok(Value::Bool(Truth::Cap)),
            _ => Err(format!("expected nocap or cap, got {text:?}")),
        },
        Type::Str => Ok(Value::Str(text.to_string())),
        Type::Unknown => {
            if let Ok(n) = text.parse::<i64>() {
                Ok(Value::Int(n))
            } else if let Ok(x) = text.parse::<f64>() {
                Ok(Value::Float(x))
            } else {
                Ok(Value::Str(text.to_string()))
            }
        }
        other => Err(format!("cannot read a {other} from input")),
    }
}

/// Negative numbers render with the language's `~` prefix glyph, never a
/// minus sign.
fn write_int(f: &mut fmt::Formatter<'_>, n: i64) -> fmt::Result {
    if n < 0 {
        write!(f, "~{}", n.unsigned_abs())
    } else {
        write!(f, "{n}")
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    let a = x.abs();
    let sign = if x.is_sign_negative() && x != 0.0 { "~" } else { "" };
    if a.fract() == 0.0 && a.is_finite() {
        write!(f, "{sign}{a:.1}")
    } else {
        write!(f, "{sign}{a}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Int(n) => write_int(f, *n),
            Value::Float(x) => write_float(f, *x),
            Value::Bool(t) => write!(f, "{t}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => write_seq(f, items.borrow().iter()),
            Value::Stack(items) => write_seq(f, items.borrow().iter()),
            Value::Queue(items) => write_seq(f, items.borrow().iter()),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

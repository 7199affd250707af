//! Compile-time constant values

use std::fmt;

use xtypes_ast::{BinaryOp, BasicLit, LitKind, UnaryOp};

/// The value of a constant expression.
///
/// `Unknown` marks constants whose value could not be determined (after an
/// error); it absorbs every operation without producing follow-on errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConstValue {
    #[default]
    Unknown,
    Bool(bool),
    Int(i128),
    Float(f64),
    String(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Unknown => f.write_str("unknown"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(i) => write!(f, "{i}"),
            ConstValue::Float(x) => write!(f, "{x}"),
            ConstValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Why a constant operation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConstOpError {
    DivByZero,
    Overflow,
    /// The operator is not defined for the operand values
    Undefined,
}

impl ConstValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ConstValue::Unknown)
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(i) => Some(*i),
            ConstValue::Float(x) if x.fract() == 0.0 && x.abs() < 1e38 => Some(*x as i128),
            _ => None,
        }
    }

    /// Parse a literal token.
    pub(crate) fn from_literal(lit: &BasicLit) -> Option<ConstValue> {
        let text = lit.value.replace('_', "");
        match lit.kind {
            LitKind::Int => parse_int(&text).map(ConstValue::Int),
            LitKind::Float => text.parse().ok().map(ConstValue::Float),
            LitKind::Char => unquote(&lit.value, '\'')
                .and_then(|s| s.chars().next())
                .map(|c| ConstValue::Int(c as i128)),
            LitKind::String => unquote(&lit.value, '"')
                .or_else(|| unquote(&lit.value, '`'))
                .map(ConstValue::String),
        }
    }

    pub(crate) fn unary(op: UnaryOp, x: &ConstValue) -> Result<ConstValue, ConstOpError> {
        use ConstValue::*;
        Ok(match (op, x) {
            (_, Unknown) => Unknown,
            (UnaryOp::Pos, Int(_) | Float(_)) => x.clone(),
            (UnaryOp::Neg, Int(i)) => Int(i.checked_neg().ok_or(ConstOpError::Overflow)?),
            (UnaryOp::Neg, Float(f)) => Float(-f),
            (UnaryOp::Not, Bool(b)) => Bool(!b),
            (UnaryOp::Xor, Int(i)) => Int(!i),
            _ => return Err(ConstOpError::Undefined),
        })
    }

    pub(crate) fn binary(op: BinaryOp, x: &ConstValue, y: &ConstValue) -> Result<ConstValue, ConstOpError> {
        use ConstValue::*;
        if x.is_unknown() || y.is_unknown() {
            return Ok(Unknown);
        }
        if op.is_comparison() {
            return compare(op, x, y).map(Bool);
        }
        Ok(match (x, y) {
            (Int(a), Int(b)) => Int(int_op(op, *a, *b)?),
            (Int(_) | Float(_), Int(_) | Float(_)) => {
                let (a, b) = (x.to_f64(), y.to_f64());
                Float(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Quo if b == 0.0 => return Err(ConstOpError::DivByZero),
                    BinaryOp::Quo => a / b,
                    _ => return Err(ConstOpError::Undefined),
                })
            }
            (String(a), String(b)) if op == BinaryOp::Add => String(format!("{a}{b}")),
            (Bool(a), Bool(b)) => match op {
                BinaryOp::LAnd => Bool(*a && *b),
                BinaryOp::LOr => Bool(*a || *b),
                _ => return Err(ConstOpError::Undefined),
            },
            _ => return Err(ConstOpError::Undefined),
        })
    }

    pub(crate) fn to_f64(&self) -> f64 {
        match self {
            ConstValue::Int(i) => *i as f64,
            ConstValue::Float(f) => *f,
            _ => 0.0,
        }
    }
}

fn int_op(op: BinaryOp, a: i128, b: i128) -> Result<i128, ConstOpError> {
    let overflow = ConstOpError::Overflow;
    match op {
        BinaryOp::Add => a.checked_add(b).ok_or(overflow),
        BinaryOp::Sub => a.checked_sub(b).ok_or(overflow),
        BinaryOp::Mul => a.checked_mul(b).ok_or(overflow),
        BinaryOp::Quo | BinaryOp::Rem if b == 0 => Err(ConstOpError::DivByZero),
        BinaryOp::Quo => Ok(a / b),
        BinaryOp::Rem => Ok(a % b),
        BinaryOp::And => Ok(a & b),
        BinaryOp::Or => Ok(a | b),
        BinaryOp::Xor => Ok(a ^ b),
        BinaryOp::AndNot => Ok(a & !b),
        BinaryOp::Shl => u32::try_from(b)
            .ok()
            .and_then(|s| a.checked_shl(s))
            .ok_or(overflow),
        BinaryOp::Shr => u32::try_from(b)
            .map(|s| if s >= 128 { if a < 0 { -1 } else { 0 } } else { a >> s })
            .map_err(|_| overflow),
        _ => Err(ConstOpError::Undefined),
    }
}

fn compare(op: BinaryOp, x: &ConstValue, y: &ConstValue) -> Result<bool, ConstOpError> {
    use std::cmp::Ordering;
    use ConstValue::*;
    let ord = match (x, y) {
        (Int(a), Int(b)) => a.cmp(b),
        (Int(_) | Float(_), Int(_) | Float(_)) => x
            .to_f64()
            .partial_cmp(&y.to_f64())
            .ok_or(ConstOpError::Undefined)?,
        (String(a), String(b)) => a.cmp(b),
        (Bool(a), Bool(b)) if matches!(op, BinaryOp::Eql | BinaryOp::Neq) => a.cmp(b),
        _ => return Err(ConstOpError::Undefined),
    };
    Ok(match op {
        BinaryOp::Eql => ord == Ordering::Equal,
        BinaryOp::Neq => ord != Ordering::Equal,
        BinaryOp::Lss => ord == Ordering::Less,
        BinaryOp::Leq => ord != Ordering::Greater,
        BinaryOp::Gtr => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    })
}

fn parse_int(text: &str) -> Option<i128> {
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i128::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

fn unquote(text: &str, quote: char) -> Option<String> {
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
    if quote == '`' {
        return Some(inner.to_string());
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            other => other,
        });
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(kind: LitKind, value: &str) -> BasicLit {
        BasicLit {
            kind,
            value: value.into(),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(ConstValue::from_literal(&lit(LitKind::Int, "0x1f")), Some(ConstValue::Int(31)));
        assert_eq!(ConstValue::from_literal(&lit(LitKind::Int, "1_000")), Some(ConstValue::Int(1000)));
        assert_eq!(ConstValue::from_literal(&lit(LitKind::Int, "017")), Some(ConstValue::Int(15)));
        assert_eq!(ConstValue::from_literal(&lit(LitKind::Char, "'a'")), Some(ConstValue::Int(97)));
        assert_eq!(
            ConstValue::from_literal(&lit(LitKind::String, "\"a\\n\"")),
            Some(ConstValue::String("a\n".into()))
        );
    }

    #[test]
    fn test_integer_arithmetic() {
        let v = ConstValue::binary(BinaryOp::Shl, &ConstValue::Int(1), &ConstValue::Int(10));
        assert_eq!(v, Ok(ConstValue::Int(1024)));
        let v = ConstValue::binary(BinaryOp::Quo, &ConstValue::Int(1), &ConstValue::Int(0));
        assert_eq!(v, Err(ConstOpError::DivByZero));
    }

    #[test]
    fn test_unknown_absorbs() {
        let v = ConstValue::binary(BinaryOp::Add, &ConstValue::Unknown, &ConstValue::Int(1));
        assert_eq!(v, Ok(ConstValue::Unknown));
    }

    #[test]
    fn test_comparison_yields_bool() {
        let v = ConstValue::binary(BinaryOp::Lss, &ConstValue::Int(1), &ConstValue::Float(1.5));
        assert_eq!(v, Ok(ConstValue::Bool(true)));
    }
}

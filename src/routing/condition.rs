//! Condition evaluation.
//!
//! # Responsibilities
//! - Compile store conditions into typed operators (regex compiled once)
//! - Evaluate one condition against a request context
//! - Fold a chain of results left to right through their combinators
//!
//! # Design Decisions
//! - Missing field = non-match, never an error; negation does not apply to it
//! - Ordering operators need numeric-coercible values on both sides, else false
//! - Integers compare exactly; floats only when a side is fractional
//! - Pattern matching on non-textual data is false, not an error
//! - Flat left-to-right fold, no operator precedence
//! - Pure functions; safe to call from any number of threads

use std::cmp::Ordering;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use crate::model::{Combinator, Condition, RequestContext};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    InSet,
    Matches,
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "equals" | "eq" | "==" => Ok(Operator::Equals),
            "not_equals" | "ne" | "!=" => Ok(Operator::NotEquals),
            "greater_than" | "gt" | ">" => Ok(Operator::GreaterThan),
            "less_than" | "lt" | "<" => Ok(Operator::LessThan),
            "in" | "in_set" => Ok(Operator::InSet),
            "matches" | "matches_pattern" | "regex" => Ok(Operator::Matches),
            _ => Err(format!("unknown operator `{}`", raw)),
        }
    }
}

#[derive(Debug, Clone)]
enum Comparand {
    Value(Value),
    Set(Vec<Value>),
    Pattern(Regex),
}

/// A condition ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    field: String,
    operator: Operator,
    comparand: Comparand,
    negate: bool,
    combinator: Combinator,
}

impl CompiledCondition {
    pub fn compile(condition: &Condition) -> Result<Self, String> {
        if condition.field.trim().is_empty() {
            return Err("condition has an empty field path".to_string());
        }
        let operator: Operator = condition.operator.parse()?;
        let comparand = match operator {
            Operator::Equals | Operator::NotEquals | Operator::GreaterThan | Operator::LessThan => {
                Comparand::Value(condition.value.clone())
            }
            Operator::InSet => match &condition.value {
                Value::Array(items) => Comparand::Set(items.clone()),
                _ => return Err(format!("set membership on `{}` needs an array value", condition.field)),
            },
            Operator::Matches => {
                let pattern = condition.value.as_str().ok_or_else(|| {
                    format!("pattern on `{}` must be a string", condition.field)
                })?;
                let regex = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern on `{}`: {}", condition.field, e))?;
                Comparand::Pattern(regex)
            }
        };

        Ok(Self {
            field: condition.field.trim().to_string(),
            operator,
            comparand,
            negate: condition.negate,
            combinator: condition.combinator,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// Evaluate against a context, negation included.
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        let Some(actual) = ctx.field(&self.field) else {
            return false;
        };
        let result = match (&self.operator, &self.comparand) {
            (Operator::Equals, Comparand::Value(expected)) => values_equal(&actual, expected),
            (Operator::NotEquals, Comparand::Value(expected)) => !values_equal(&actual, expected),
            (Operator::GreaterThan, Comparand::Value(bound)) => {
                compare_numbers(&actual, bound) == Some(Ordering::Greater)
            }
            (Operator::LessThan, Comparand::Value(bound)) => {
                compare_numbers(&actual, bound) == Some(Ordering::Less)
            }
            (Operator::InSet, Comparand::Set(items)) => {
                items.iter().any(|item| values_equal(&actual, item))
            }
            (Operator::Matches, Comparand::Pattern(regex)) => match &actual {
                Value::String(s) => regex.is_match(s),
                Value::Number(n) => regex.is_match(&n.to_string()),
                _ => false,
            },
            _ => false,
        };
        result != self.negate
    }
}

/// Compile a rule's conditions, sorted by their order index (stable on ties).
pub fn compile_conditions(conditions: &[Condition]) -> Result<Vec<CompiledCondition>, String> {
    let mut ordered: Vec<&Condition> = conditions.iter().collect();
    ordered.sort_by_key(|c| c.order);
    ordered.into_iter().map(CompiledCondition::compile).collect()
}

/// Evaluate an ordered chain. An empty chain always matches.
///
/// Each condition's combinator joins its result with the next one; the last
/// combinator is ignored.
pub fn evaluate(conditions: &[CompiledCondition], ctx: &RequestContext) -> bool {
    let Some((first, rest)) = conditions.split_first() else {
        return true;
    };
    let mut result = first.matches(ctx);
    let mut joiner = first.combinator;
    for condition in rest {
        result = match joiner {
            Combinator::And => result && condition.matches(ctx),
            Combinator::Or => result || condition.matches(ctx),
        };
        joiner = condition.combinator;
    }
    result
}

/// Numeric view of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

/// Numbers, or strings that parse as numbers. Integral text stays integral.
pub fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Number::Int(i as i128))
            } else if let Some(u) = n.as_u64() {
                Some(Number::Int(u as i128))
            } else {
                n.as_f64().map(Number::Float)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i128>() {
                Ok(i) => Some(Number::Int(i)),
                Err(_) => s.parse::<f64>().ok().filter(|n| n.is_finite()).map(Number::Float),
            }
        }
        _ => None,
    }
}

/// Ordering of two numeric-coercible values; `None` if either side is not numeric.
pub fn compare_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    match (as_number(left)?, as_number(right)?) {
        (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
        (Number::Int(a), Number::Float(b)) => compare_int_float(a, b),
        (Number::Float(a), Number::Int(b)) => compare_int_float(b, a).map(Ordering::reverse),
        (Number::Float(a), Number::Float(b)) => a.partial_cmp(&b),
    }
}

fn compare_int_float(int: i128, float: f64) -> Option<Ordering> {
    // Whole floats inside the i128 range convert exactly.
    if float.fract() == 0.0 && float.abs() < 1e38 {
        Some(int.cmp(&(float as i128)))
    } else {
        (int as f64).partial_cmp(&float)
    }
}

/// Type-aware equality: numeric where either side is a number, textual booleans accepted.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => compare_numbers(left, right) == Some(Ordering::Equal),
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        (Value::Null, _) | (_, Value::Null) => false,
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(field: &str, op: &str, value: Value) -> CompiledCondition {
        CompiledCondition::compile(&Condition::new(field, op, value)).unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new()
            .with_tenant("tenant-A")
            .with_attribute("amount", 5000)
            .with_attribute("amount_text", "5000.00")
            .with_attribute("currency", "EUR")
            .with_attribute("iban", "DE89370400440532013000")
            .with_attribute("instant", true)
    }

    #[test]
    fn test_operator_spellings() {
        assert_eq!("greater-than".parse::<Operator>(), Ok(Operator::GreaterThan));
        assert_eq!("==".parse::<Operator>(), Ok(Operator::Equals));
        assert_eq!("IN_SET".parse::<Operator>(), Ok(Operator::InSet));
        assert!("like".parse::<Operator>().is_err());
    }

    #[test]
    fn test_type_aware_equality() {
        assert!(compile("amount", "eq", json!(5000.0)).matches(&ctx()));
        assert!(compile("amount", "eq", json!("5000")).matches(&ctx()));
        assert!(compile("amount_text", "eq", json!(5000)).matches(&ctx()));
        assert!(compile("instant", "eq", json!("TRUE")).matches(&ctx()));
        assert!(!compile("currency", "eq", json!("eur")).matches(&ctx()));
        assert!(compile("currency", "ne", json!("USD")).matches(&ctx()));
    }

    #[test]
    fn test_ordering_needs_numbers() {
        assert!(compile("amount", ">", json!(1000)).matches(&ctx()));
        assert!(compile("amount_text", ">", json!(1000)).matches(&ctx()));
        assert!(!compile("currency", ">", json!(1000)).matches(&ctx()));
        assert!(!compile("amount", "<", json!(1000)).matches(&ctx()));
    }

    #[test]
    fn test_non_numeric_bound_is_false_then_negated() {
        let plain = compile("amount", ">", json!("abc"));
        assert!(!plain.matches(&ctx()));

        let negated = CompiledCondition::compile(&Condition::new("amount", ">", "abc").negated()).unwrap();
        assert!(negated.matches(&ctx()));

        // An OR chain keeps working around the non-numeric comparison.
        let chain = compile_conditions(&[
            Condition::new("amount", "<", "abc").then(Combinator::Or),
            Condition::new("currency", "eq", "EUR"),
        ])
        .unwrap();
        assert!(evaluate(&chain, &ctx()));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let ctx = RequestContext::new()
            .with_attribute("account", json!(9007199254740992u64))
            .with_attribute("account_text", "9007199254740992")
            .with_attribute("minor_units", json!(u64::MAX));

        assert!(!compile("account", "eq", json!(9007199254740993u64)).matches(&ctx));
        assert!(compile("account", "eq", json!(9007199254740992u64)).matches(&ctx));
        assert!(!compile("account_text", "eq", json!(9007199254740993u64)).matches(&ctx));
        assert!(compile("account", "lt", json!("9007199254740993")).matches(&ctx));
        assert!(compile("minor_units", "gt", json!(u64::MAX - 1)).matches(&ctx));
        assert!(compile("account", "eq", json!(9007199254740992.0)).matches(&ctx));
        assert!(compile("account", "gt", json!(0.5)).matches(&ctx));
    }

    #[test]
    fn test_set_and_pattern() {
        assert!(compile("currency", "in", json!(["EUR", "GBP"])).matches(&ctx()));
        assert!(!compile("currency", "in", json!(["USD"])).matches(&ctx()));
        assert!(compile("iban", "matches", json!("^DE\\d{20}$")).matches(&ctx()));
        assert!(!compile("instant", "matches", json!("true")).matches(&ctx()));
        assert!(compile("amount", "matches", json!("^5\\d+$")).matches(&ctx()));
        assert!(CompiledCondition::compile(&Condition::new("iban", "matches", "(")).is_err());
        assert!(CompiledCondition::compile(&Condition::new("iban", "in", "DE")).is_err());
    }

    #[test]
    fn test_missing_field_ignores_negation() {
        let cond = CompiledCondition::compile(&Condition::new("debtor.country", "eq", "DE").negated()).unwrap();
        assert!(!cond.matches(&ctx()));

        let cond = CompiledCondition::compile(&Condition::new("currency", "eq", "USD").negated()).unwrap();
        assert!(cond.matches(&ctx()));
    }

    #[test]
    fn test_left_to_right_fold() {
        // false AND true OR true == (false AND true) OR true == true
        let chain = compile_conditions(&[
            Condition::new("currency", "eq", "USD").then(Combinator::And),
            Condition::new("amount", ">", 1).then(Combinator::Or),
            Condition::new("tenant", "eq", "tenant-A"),
        ])
        .unwrap();
        assert!(evaluate(&chain, &ctx()));

        // true OR false AND false == (true OR false) AND false == false
        let chain = compile_conditions(&[
            Condition::new("currency", "eq", "EUR").then(Combinator::Or),
            Condition::new("amount", "<", 1).then(Combinator::And),
            Condition::new("tenant", "eq", "other"),
        ])
        .unwrap();
        assert!(!evaluate(&chain, &ctx()));
    }

    #[test]
    fn test_empty_chain_and_order_index() {
        assert!(evaluate(&[], &ctx()));

        let mut second = Condition::new("currency", "eq", "EUR").then(Combinator::Or);
        second.order = 1;
        let mut first = Condition::new("amount", "<", 1);
        first.order = 0;
        first.combinator = Combinator::Or;
        let chain = compile_conditions(&[second, first]).unwrap();
        assert_eq!(chain[0].field(), "amount");
        assert!(evaluate(&chain, &ctx()));
    }
}

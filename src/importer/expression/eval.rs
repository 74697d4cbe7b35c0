// ==========================================
// FinView 导入引擎 - 表达式求值
// ==========================================
// 纯函数: 只读取当前行与函数集合，不访问任何进程状态
// ==========================================

use crate::importer::expression::error::{EvalError, EvalResult};
use crate::importer::expression::helpers::Helpers;
use crate::importer::expression::parser::{Ast, BinaryOp, UnaryOp};
use crate::importer::expression::value::Value;
use std::cmp::Ordering;

/// 单行求值上下文
pub struct RowContext<'a> {
    pub row: &'a [String],
    pub helpers: &'a dyn Helpers,
}

impl<'a> RowContext<'a> {
    pub fn new(row: &'a [String], helpers: &'a dyn Helpers) -> Self {
        Self { row, helpers }
    }
}

pub fn eval(ast: &Ast, ctx: &RowContext<'_>) -> EvalResult<Value> {
    match ast {
        Ast::Literal(v) => Ok(v.clone()),
        Ast::Ident(name) => match name.as_str() {
            "row" => Ok(Value::List(
                ctx.row.iter().cloned().map(Value::String).collect(),
            )),
            other => Err(EvalError::UnknownIdentifier(other.to_string())),
        },
        Ast::List(items) => items
            .iter()
            .map(|item| eval(item, ctx))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::List),
        Ast::Index { target, index } => {
            let index = eval(index, ctx)?;
            // row[i] 直接取单元格，不复制整行
            if matches!(target.as_ref(), Ast::Ident(name) if name == "row") {
                let i = index_of(&index, ctx.row.len())?;
                return Ok(Value::String(ctx.row[i].clone()));
            }
            match eval(target, ctx)? {
                Value::List(mut items) => {
                    let i = index_of(&index, items.len())?;
                    Ok(items.swap_remove(i))
                }
                other => Err(EvalError::mismatch(format!(
                    "不能对 {} 类型取下标",
                    other.type_name()
                ))),
            }
        }
        Ast::Call { function, args } => {
            let args = args
                .iter()
                .map(|a| eval(a, ctx))
                .collect::<EvalResult<Vec<_>>>()?;
            ctx.helpers.call(function, args)
        }
        Ast::Unary { op, operand } => {
            let value = eval(operand, ctx)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(i)) => {
                    i.checked_neg().map(Value::Int).ok_or(EvalError::Overflow)
                }
                (UnaryOp::Neg, Value::Double(d)) => Ok(Value::Double(-d)),
                (UnaryOp::Not, other) => Err(EvalError::mismatch(format!(
                    "'!' 需要 bool, 实际 {}",
                    other.type_name()
                ))),
                (UnaryOp::Neg, other) => Err(EvalError::mismatch(format!(
                    "'-' 需要数字, 实际 {}",
                    other.type_name()
                ))),
            }
        }
        Ast::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, ctx)?;
            let rhs = eval(rhs, ctx)?;
            binary(*op, lhs, rhs)
        }
        Ast::And(lhs, rhs) => {
            if !condition(eval(lhs, ctx)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(condition(eval(rhs, ctx)?, "&&")?))
        }
        Ast::Or(lhs, rhs) => {
            if condition(eval(lhs, ctx)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(condition(eval(rhs, ctx)?, "||")?))
        }
        Ast::Conditional {
            condition: cond,
            then_branch,
            else_branch,
        } => {
            if condition(eval(cond, ctx)?, "?:")? {
                eval(then_branch, ctx)
            } else {
                eval(else_branch, ctx)
            }
        }
    }
}

fn condition(value: Value, op: &str) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::mismatch(format!(
            "'{}' 的条件必须是 bool, 实际 {}",
            op,
            other.type_name()
        ))),
    }
}

fn index_of(index: &Value, len: usize) -> EvalResult<usize> {
    let i = match index {
        Value::Int(i) => *i,
        other => {
            return Err(EvalError::mismatch(format!(
                "下标必须是 int, 实际 {}",
                other.type_name()
            )));
        }
    };
    usize::try_from(i)
        .ok()
        .filter(|u| *u < len)
        .ok_or(EvalError::IndexOutOfRange { index: i, len })
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => return Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(op, &lhs, &rhs)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, a, b),
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::String(a + &b))
        }
        (Value::List(mut a), Value::List(b)) if op == BinaryOp::Add => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (a, b) if a.is_number() && b.is_number() => {
            // 上面已排除 int/int，这里至少一侧为 double
            let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            double_arith(op, x, y)
        }
        (a, b) => Err(EvalError::mismatch(format!(
            "不支持 {} {} {}",
            a.type_name(),
            op.symbol(),
            b.type_name()
        ))),
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        _ => return Err(EvalError::mismatch(format!("int 不支持 '{}'", op.symbol()))),
    };
    result.map(Value::Int).ok_or(EvalError::Overflow)
}

fn double_arith(op: BinaryOp, a: f64, b: f64) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => {
            return Err(EvalError::mismatch(format!(
                "double 不支持 '{}'",
                op.symbol()
            )))
        }
    };
    if result.is_finite() {
        Ok(Value::Double(result))
    } else {
        Err(EvalError::Overflow)
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Ordering> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (a, b) if a.is_number() && b.is_number() => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or_else(|| EvalError::mismatch("NaN 不可比较")),
        (a, b) => Err(EvalError::mismatch(format!(
            "不能比较 {} {} {}",
            a.type_name(),
            op.symbol(),
            b.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::expression::helpers::HelperRegistry;
    use crate::importer::expression::parser::parse;

    fn run(src: &str, row: &[&str]) -> EvalResult<Value> {
        let row: Vec<String> = row.iter().map(|s| s.to_string()).collect();
        let helpers = HelperRegistry::new();
        let ctx = RowContext::new(&row, &helpers);
        eval(&parse(src).unwrap(), &ctx)
    }

    #[test]
    fn test_row_index() {
        assert_eq!(run("row[1]", &["a", "b"]).unwrap(), Value::from("b"));
        assert_eq!(
            run("row[2]", &["a", "b"]),
            Err(EvalError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            run("row[-1]", &["a"]),
            Err(EvalError::IndexOutOfRange { index: -1, len: 1 })
        );
        assert!(matches!(
            run("row['x']", &["a"]),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1 + 2 * 3", &[]).unwrap(), Value::Int(7));
        assert_eq!(run("7 / 2", &[]).unwrap(), Value::Int(3));
        assert_eq!(run("1 + 0.5", &[]).unwrap(), Value::Double(1.5));
        assert_eq!(
            run("-double(row[0]) * 2", &["1,25"]).unwrap(),
            Value::Double(-2.5)
        );
        assert_eq!(run("1 / 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(run("1.0 % 0", &[]), Err(EvalError::DivisionByZero));
        assert_eq!(run("9223372036854775807 + 1", &[]), Err(EvalError::Overflow));
        assert_eq!(
            run("-9223372036854775808", &[]).unwrap(),
            Value::Int(i64::MIN)
        );
        assert_eq!(run("-(-9223372036854775808)", &[]), Err(EvalError::Overflow));
    }

    #[test]
    fn test_no_implicit_string_conversion() {
        assert!(matches!(
            run("row[0] * 2", &["3"]),
            Err(EvalError::TypeMismatch(_))
        ));
        assert!(matches!(
            run("row[0] + 1", &["3"]),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_concat_and_split() {
        assert_eq!(
            run("row[0] + ' ' + row[1]", &["Coffee", "Shop"]).unwrap(),
            Value::from("Coffee Shop")
        );
        assert_eq!(
            run("split(row[0], '/')[1]", &["2024/03/01"]).unwrap(),
            Value::from("03")
        );
        assert_eq!(
            run("row[0].split('-').size()", &["a-b-c"]).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_conditional_sign() {
        let src = "row[1] == 'D' ? -double(row[0]) : double(row[0])";
        assert_eq!(run(src, &["10,5", "D"]).unwrap(), Value::Double(-10.5));
        assert_eq!(run(src, &["10,5", "C"]).unwrap(), Value::Double(10.5));
    }

    #[test]
    fn test_short_circuit() {
        // 右侧越界不会被求值
        assert_eq!(
            run("size(row) > 5 && row[5] == 'x'", &["a"]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(run("true || 1 / 0 == 1", &[]).unwrap(), Value::Bool(true));
        assert_eq!(run("false ? 1 / 0 : 2", &[]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_conditions_must_be_bool() {
        assert!(matches!(run("1 ? 2 : 3", &[]), Err(EvalError::TypeMismatch(_))));
        assert!(matches!(run("!row[0]", &["x"]), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("'abc' < 'abd'", &[]).unwrap(), Value::Bool(true));
        assert_eq!(run("2 >= 1.5", &[]).unwrap(), Value::Bool(true));
        assert_eq!(run("1 == 1.0", &[]).unwrap(), Value::Bool(true));
        assert_eq!(run("'1' == 1", &[]).unwrap(), Value::Bool(false));
        assert!(matches!(run("'1' < 2", &[]), Err(EvalError::TypeMismatch(_))));
    }
}

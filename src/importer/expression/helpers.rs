// ==========================================
// FinView 导入引擎 - 表达式内置函数
// ==========================================
// 函数集合封闭: 编译期检查函数名，运行期只调用已登记函数
// 测试可通过实现 Helpers trait 注入替身
// ==========================================

use crate::importer::expression::error::{EvalError, EvalResult};
use crate::importer::expression::value::Value;

/// 表达式可调用的函数集合
pub trait Helpers: Send + Sync {
    /// 是否登记了该函数（编译期检查）
    fn has(&self, name: &str) -> bool;

    /// 调用函数，参数已求值
    fn call(&self, name: &str, args: Vec<Value>) -> EvalResult<Value>;
}

/// 标准函数集合
#[derive(Debug, Default, Clone, Copy)]
pub struct HelperRegistry;

impl HelperRegistry {
    pub const NAMES: [&'static str; 9] = [
        "double",
        "split",
        "size",
        "trim",
        "string",
        "int",
        "contains",
        "startsWith",
        "endsWith",
    ];

    pub fn new() -> Self {
        Self
    }
}

impl Helpers for HelperRegistry {
    fn has(&self, name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    fn call(&self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        match name {
            "double" => {
                let [value] = take_args::<1>(name, args)?;
                double(&value).map(Value::Double)
            }
            "split" => {
                let [text, delimiter] = take_args::<2>(name, args)?;
                split(name, &text, &delimiter)
            }
            "size" => {
                let [value] = take_args::<1>(name, args)?;
                size(&value)
            }
            "trim" => {
                let [value] = take_args::<1>(name, args)?;
                let text = expect_str(name, &value)?;
                Ok(Value::String(text.trim().to_string()))
            }
            "string" => {
                let [value] = take_args::<1>(name, args)?;
                Ok(match value {
                    Value::String(s) => Value::String(s),
                    Value::Null => Value::String(String::new()),
                    other => Value::String(other.to_string()),
                })
            }
            "int" => {
                let [value] = take_args::<1>(name, args)?;
                int(&value).map(Value::Int)
            }
            "contains" => {
                let [haystack, needle] = take_args::<2>(name, args)?;
                match &haystack {
                    Value::List(items) => Ok(Value::Bool(items.contains(&needle))),
                    _ => {
                        let text = expect_str(name, &haystack)?;
                        let part = expect_str(name, &needle)?;
                        Ok(Value::Bool(text.contains(part)))
                    }
                }
            }
            "startsWith" => {
                let [text, prefix] = take_args::<2>(name, args)?;
                let text = expect_str(name, &text)?;
                let prefix = expect_str(name, &prefix)?;
                Ok(Value::Bool(text.starts_with(prefix)))
            }
            "endsWith" => {
                let [text, suffix] = take_args::<2>(name, args)?;
                let text = expect_str(name, &text)?;
                let suffix = expect_str(name, &suffix)?;
                Ok(Value::Bool(text.ends_with(suffix)))
            }
            other => Err(EvalError::UnknownFunction(other.to_string())),
        }
    }
}

/// 十进制文本解析
///
/// - 空白文本与 null 返回 0.0
/// - 小数逗号替换为小数点
/// - 数字原样转为 double
pub fn double(value: &Value) -> EvalResult<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Int(i) => Ok(*i as f64),
        Value::Double(d) => Ok(*d),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            let normalized = trimmed.replace(',', ".");
            match normalized.parse::<f64>() {
                Ok(d) if d.is_finite() => Ok(d),
                _ => Err(EvalError::InvalidNumber(text.clone())),
            }
        }
        other => Err(EvalError::mismatch(format!(
            "double() 不接受 {} 类型",
            other.type_name()
        ))),
    }
}

fn int(value: &Value) -> EvalResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Double(d) => {
            if !d.is_finite() || *d >= i64::MAX as f64 || *d < i64::MIN as f64 {
                return Err(EvalError::Overflow);
            }
            Ok(d.trunc() as i64)
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| EvalError::InvalidNumber(text.clone())),
        other => Err(EvalError::mismatch(format!(
            "int() 不接受 {} 类型",
            other.type_name()
        ))),
    }
}

fn split(name: &str, text: &Value, delimiter: &Value) -> EvalResult<Value> {
    let text = expect_str(name, text)?;
    let delimiter = expect_str(name, delimiter)?;
    if delimiter.is_empty() {
        return Err(EvalError::Helper {
            function: name.to_string(),
            message: "分隔符不能为空".to_string(),
        });
    }
    Ok(Value::List(
        text.split(delimiter)
            .map(|part| Value::String(part.to_string()))
            .collect(),
    ))
}

fn size(value: &Value) -> EvalResult<Value> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        other => {
            return Err(EvalError::mismatch(format!(
                "size() 不接受 {} 类型",
                other.type_name()
            )));
        }
    };
    i64::try_from(len)
        .map(Value::Int)
        .map_err(|_| EvalError::Overflow)
}

fn expect_str<'a>(function: &str, value: &'a Value) -> EvalResult<&'a str> {
    value.as_str().ok_or_else(|| {
        EvalError::mismatch(format!(
            "{}() 期望 string 参数, 实际 {}",
            function,
            value.type_name()
        ))
    })
}

fn take_args<const N: usize>(function: &str, args: Vec<Value>) -> EvalResult<[Value; N]> {
    let found = args.len();
    <[Value; N]>::try_from(args).map_err(|_| EvalError::Arity {
        function: function.to_string(),
        expected: N,
        found,
    })
}

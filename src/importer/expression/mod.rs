// ==========================================
// FinView 导入引擎 - 映射表达式
// ==========================================
// 职责: 按字段公式从原始单元格计算字段值
// 语言范围: 算术、比较、三元、字符串拼接、下标、封闭函数集合
// 不支持赋值、循环、外部访问
// ==========================================

pub mod error;
pub mod eval;
pub mod helpers;
pub mod lexer;
pub mod parser;
pub mod value;

pub use error::{EvalError, EvalResult};
pub use eval::RowContext;
pub use helpers::{HelperRegistry, Helpers};
pub use parser::Ast;
pub use value::Value;

use std::fmt;

/// 已编译的表达式
///
/// 编译阶段完成语法检查、标识符检查（仅允许 `row`）与函数名检查，
/// 求值阶段只会出现运行期错误。
#[derive(Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Ast,
}

impl Expression {
    /// 编译表达式
    ///
    /// # 参数
    /// - source: 表达式文本
    /// - helpers: 可调用的函数集合
    pub fn compile(source: &str, helpers: &dyn Helpers) -> EvalResult<Self> {
        let ast = parser::parse(source)?;

        let mut problem = None;
        ast.walk(&mut |node: &Ast| {
            if problem.is_some() {
                return;
            }
            match node {
                Ast::Ident(name) if name != "row" => {
                    problem = Some(EvalError::UnknownIdentifier(name.clone()));
                }
                Ast::Call { function, .. } if !helpers.has(function) => {
                    problem = Some(EvalError::UnknownFunction(function.clone()));
                }
                _ => {}
            }
        });
        if let Some(err) = problem {
            return Err(err);
        }

        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// 对单行求值
    pub fn evaluate(&self, ctx: &RowContext<'_>) -> EvalResult<Value> {
        eval::eval(&self.ast, ctx)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

/// 编译并立即求值（一次性场景）
pub fn evaluate(source: &str, ctx: &RowContext<'_>) -> EvalResult<Value> {
    Expression::compile(source, ctx.helpers)?.evaluate(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    /// 固定返回值的替身函数集合
    struct FixedDouble(f64);

    impl Helpers for FixedDouble {
        fn has(&self, name: &str) -> bool {
            name == "double"
        }

        fn call(&self, name: &str, _args: Vec<Value>) -> EvalResult<Value> {
            match name {
                "double" => Ok(Value::Double(self.0)),
                other => Err(EvalError::UnknownFunction(other.to_string())),
            }
        }
    }

    #[test]
    fn test_compile_rejects_unknown_names() {
        let helpers = HelperRegistry::new();
        assert_eq!(
            Expression::compile("col[0]", &helpers),
            Err(EvalError::UnknownIdentifier("col".to_string()))
        );
        assert_eq!(
            Expression::compile("system('ls')", &helpers),
            Err(EvalError::UnknownFunction("system".to_string()))
        );
        assert!(matches!(
            Expression::compile("row[", &helpers),
            Err(EvalError::Syntax { .. })
        ));
    }

    #[test]
    fn test_double_contract() {
        let helpers = HelperRegistry::new();
        let expr = Expression::compile("double(row[0])", &helpers).unwrap();

        let cases = [("", 0.0), (" ", 0.0), ("1,5", 1.5)];
        for (cell, expected) in cases {
            let cells = row(&[cell]);
            let ctx = RowContext::new(&cells, &helpers);
            assert_eq!(expr.evaluate(&ctx).unwrap(), Value::Double(expected));
        }

        let cells = row(&["abc"]);
        let ctx = RowContext::new(&cells, &helpers);
        assert_eq!(
            expr.evaluate(&ctx),
            Err(EvalError::InvalidNumber("abc".to_string()))
        );
    }

    #[test]
    fn test_injected_helpers() {
        let helpers = FixedDouble(42.0);
        let cells = row(&["ignored"]);
        let ctx = RowContext::new(&cells, &helpers);

        assert_eq!(
            evaluate("double(row[0]) + 1", &ctx).unwrap(),
            Value::Double(43.0)
        );
        // 替身未登记 split
        assert_eq!(
            evaluate("split(row[0], ',')", &ctx),
            Err(EvalError::UnknownFunction("split".to_string()))
        );
    }

    #[test]
    fn test_compiled_expression_is_reusable() {
        let helpers = HelperRegistry::new();
        let expr = Expression::compile("row[0] + '/' + row[1]", &helpers).unwrap();
        assert_eq!(expr.source(), "row[0] + '/' + row[1]");

        for (a, b) in [("x", "y"), ("1", "2")] {
            let cells = row(&[a, b]);
            let ctx = RowContext::new(&cells, &helpers);
            assert_eq!(
                expr.evaluate(&ctx).unwrap(),
                Value::String(format!("{}/{}", a, b))
            );
        }
    }
}

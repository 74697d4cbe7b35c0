// ==========================================
// FinView 导入引擎 - 表达式字段映射器
// ==========================================
// 阶段: 求值
// 职责: 原始单元格 → 5 个标准字段的表达式值
// 规则: 按固定字段顺序求值，第一个失败字段即中止该行
// ==========================================

use crate::domain::{CanonicalField, FieldMappings, MappingSpecification, RawRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::expression::{Expression, HelperRegistry, Helpers, RowContext, Value};
use crate::importer::importer_trait::RowEvaluator;
use std::sync::Arc;

/// 一行的求值结果（尚未标准化）
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues {
    pub line_number: usize,
    pub timestamp: Value,
    pub description: Value,
    pub amount_original: Value,
    pub currency_original: Value,
    pub amount_in_account_currency: Value,
}

impl FieldValues {
    pub fn get(&self, field: CanonicalField) -> &Value {
        match field {
            CanonicalField::Timestamp => &self.timestamp,
            CanonicalField::Description => &self.description,
            CanonicalField::AmountOriginal => &self.amount_original,
            CanonicalField::CurrencyOriginal => &self.currency_original,
            CanonicalField::AmountInAccountCurrency => &self.amount_in_account_currency,
        }
    }
}

// ==========================================
// ExpressionFieldMapper 实现
// ==========================================
pub struct ExpressionFieldMapper {
    // 与 CanonicalField::ALL 同序
    expressions: Vec<(CanonicalField, Expression)>,
    helpers: Arc<dyn Helpers>,
}

impl ExpressionFieldMapper {
    /// 使用标准函数集合编译规范中的全部表达式
    pub fn from_spec(spec: &MappingSpecification) -> ImportResult<Self> {
        Self::with_helpers(&spec.name, &spec.mappings, Arc::new(HelperRegistry::new()))
    }

    /// 使用指定函数集合编译
    ///
    /// # 参数
    /// - source_name: 出错时用于定位的规范名称
    /// - mappings: 字段表达式
    /// - helpers: 可调用的函数集合
    pub fn with_helpers(
        source_name: &str,
        mappings: &FieldMappings,
        helpers: Arc<dyn Helpers>,
    ) -> ImportResult<Self> {
        let mut expressions = Vec::with_capacity(CanonicalField::ALL.len());
        for (field, source) in mappings.iter() {
            let expression = Expression::compile(source, helpers.as_ref()).map_err(|e| {
                ImportError::spec_invalid(
                    source_name,
                    format!("mappings.{} 表达式无效: {}", field.key(), e),
                )
            })?;
            expressions.push((field, expression));
        }

        Ok(Self {
            expressions,
            helpers,
        })
    }
}

impl RowEvaluator for ExpressionFieldMapper {
    fn evaluate_row(&self, row: &RawRow) -> ImportResult<FieldValues> {
        let ctx = RowContext::new(&row.cells, self.helpers.as_ref());

        let mut values = Vec::with_capacity(self.expressions.len());
        for (field, expression) in &self.expressions {
            let value = expression
                .evaluate(&ctx)
                .map_err(|cause| ImportError::ExpressionEval {
                    field: *field,
                    cause,
                })?;
            values.push(value);
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or(Value::Null);
        Ok(FieldValues {
            line_number: row.line_number,
            timestamp: next(),
            description: next(),
            amount_original: next(),
            currency_original: next(),
            amount_in_account_currency: next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::expression::{EvalError, EvalResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mappings(amount: &str) -> FieldMappings {
        FieldMappings {
            timestamp: "'2024-03-01'".to_string(),
            description: "row[0]".to_string(),
            amount_original: amount.to_string(),
            currency_original: "'EUR'".to_string(),
            amount_in_account_currency: "double(row[1])".to_string(),
        }
    }

    fn raw(cells: &[&str]) -> RawRow {
        RawRow::new(2, cells.iter().map(|s| s.to_string()).collect())
    }

    /// 统计调用次数的函数集合
    struct CountingHelpers {
        calls: AtomicUsize,
    }

    impl Helpers for CountingHelpers {
        fn has(&self, name: &str) -> bool {
            HelperRegistry::new().has(name)
        }

        fn call(&self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HelperRegistry::new().call(name, args)
        }
    }

    #[test]
    fn test_evaluate_row() {
        let mapper = ExpressionFieldMapper::with_helpers(
            "test",
            &mappings("double(row[1])"),
            Arc::new(HelperRegistry::new()),
        )
        .unwrap();

        let values = mapper.evaluate_row(&raw(&["Coffee", "3,50"])).unwrap();
        assert_eq!(values.line_number, 2);
        assert_eq!(values.description, Value::from("Coffee"));
        assert_eq!(values.amount_original, Value::Double(3.5));
        assert_eq!(values.get(CanonicalField::CurrencyOriginal), &Value::from("EUR"));
    }

    #[test]
    fn test_first_failing_field_aborts_row() {
        let helpers = Arc::new(CountingHelpers {
            calls: AtomicUsize::new(0),
        });
        let mapper =
            ExpressionFieldMapper::with_helpers("test", &mappings("double(row[1])"), helpers.clone())
                .unwrap();

        let err = mapper.evaluate_row(&raw(&["Coffee", "abc"])).unwrap_err();
        match err {
            ImportError::ExpressionEval { field, cause } => {
                assert_eq!(field, CanonicalField::AmountOriginal);
                assert_eq!(cause, EvalError::InvalidNumber("abc".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // amount_in_account_currency 未被求值
        assert_eq!(helpers.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_range_column() {
        let mapper = ExpressionFieldMapper::with_helpers(
            "test",
            &mappings("double(row[1])"),
            Arc::new(HelperRegistry::new()),
        )
        .unwrap();

        let err = mapper.evaluate_row(&raw(&["only"])).unwrap_err();
        assert!(matches!(
            err,
            ImportError::ExpressionEval {
                cause: EvalError::IndexOutOfRange { index: 1, len: 1 },
                ..
            }
        ));
    }

    #[test]
    fn test_compile_error_is_spec_invalid() {
        let result = ExpressionFieldMapper::with_helpers(
            "broken",
            &mappings("double(row[1]"),
            Arc::new(HelperRegistry::new()),
        );

        match result {
            Err(ImportError::SpecInvalid {
                source_name,
                message,
            }) => {
                assert_eq!(source_name, "broken");
                assert!(message.contains("amount_original"));
            }
            _ => panic!("expected SpecInvalid"),
        }
    }
}

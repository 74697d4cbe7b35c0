// ==========================================
// FinView 导入引擎 - 行标准化器
// ==========================================
// 阶段: 标准化
// 职责: 表达式值 → 标准记录
// - timestamp: 按配置格式顺序解析（日期时间 → 纯日期）
// - 金额: 转为十进制
// - 币种: 封闭枚举精确匹配（区分大小写）
// ==========================================

use crate::config::ImportConfigReader;
use crate::config::StaticImportConfig;
use crate::domain::{CanonicalField, CanonicalRecord, Currency, NormalizationReport};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::expression::Value;
use crate::importer::field_mapper::FieldValues;
use crate::importer::importer_trait::RowNormalizer;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

// ==========================================
// DataNormalizer 实现
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNormalizer {
    datetime_formats: Vec<String>,
    date_formats: Vec<String>,
    report: NormalizationReport,
}

impl Default for DataNormalizer {
    fn default() -> Self {
        let cfg = StaticImportConfig::default();
        Self {
            datetime_formats: cfg.datetime_formats,
            date_formats: cfg.date_formats,
            report: cfg.normalization_report,
        }
    }
}

impl DataNormalizer {
    pub fn new(
        datetime_formats: Vec<String>,
        date_formats: Vec<String>,
        report: NormalizationReport,
    ) -> Self {
        Self {
            datetime_formats,
            date_formats,
            report,
        }
    }

    /// 从配置读取日期格式与报错策略
    pub fn from_config(config: &dyn ImportConfigReader) -> ImportResult<Self> {
        Ok(Self::new(
            config.get_datetime_formats()?,
            config.get_date_formats()?,
            config.get_normalization_report()?,
        ))
    }

    pub fn report(&self) -> NormalizationReport {
        self.report
    }

    /// 解析时间戳
    pub fn parse_timestamp(&self, value: &Value) -> ImportResult<NaiveDateTime> {
        let text = match value {
            Value::String(s) => s.trim(),
            other => {
                return Err(ImportError::DateParse {
                    value: other.to_string(),
                })
            }
        };

        self.datetime_formats
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .or_else(|| {
                // 纯日期默认零点
                self.date_formats
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
            .ok_or_else(|| ImportError::DateParse {
                value: text.to_string(),
            })
    }

    /// 解析金额
    pub fn parse_amount(&self, field: CanonicalField, value: &Value) -> ImportResult<Decimal> {
        let parse_error = || ImportError::AmountParse {
            field,
            value: value.to_string(),
        };

        match value {
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::Double(d) if d.is_finite() => Decimal::from_f64(*d)
                .map(|d| d.normalize())
                .ok_or_else(parse_error),
            Value::String(s) => {
                let trimmed = s.trim();
                // 仅一个逗号且无小数点时视为小数逗号
                let candidate = if trimmed.matches(',').count() == 1 && !trimmed.contains('.') {
                    trimmed.replace(',', ".")
                } else {
                    trimmed.to_string()
                };
                Decimal::from_str(&candidate).map_err(|_| parse_error())
            }
            _ => Err(parse_error()),
        }
    }

    /// 解析币种（精确匹配）
    pub fn parse_currency(&self, value: &Value) -> ImportResult<Currency> {
        match value {
            Value::String(s) => Currency::from_str(s).map_err(|_| ImportError::UnknownCurrency {
                value: s.clone(),
            }),
            other => Err(ImportError::UnknownCurrency {
                value: other.to_string(),
            }),
        }
    }

    /// 描述: 字符串原样保留，null 为空串，其余按显示形式转文本
    pub fn to_description(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl RowNormalizer for DataNormalizer {
    fn normalize(&self, values: &FieldValues) -> ImportResult<CanonicalRecord> {
        let timestamp = self.parse_timestamp(&values.timestamp);
        if self.report == NormalizationReport::FirstError {
            let timestamp = timestamp?;
            let amount_original =
                self.parse_amount(CanonicalField::AmountOriginal, &values.amount_original)?;
            let currency_original = self.parse_currency(&values.currency_original)?;
            let amount_in_account_currency = self.parse_amount(
                CanonicalField::AmountInAccountCurrency,
                &values.amount_in_account_currency,
            )?;
            return Ok(CanonicalRecord {
                timestamp,
                description: self.to_description(&values.description),
                amount_original,
                currency_original,
                amount_in_account_currency,
            });
        }

        // 全部字段报错模式: 每个字段都尝试，汇总错误
        let amount_original =
            self.parse_amount(CanonicalField::AmountOriginal, &values.amount_original);
        let currency_original = self.parse_currency(&values.currency_original);
        let amount_in_account_currency = self.parse_amount(
            CanonicalField::AmountInAccountCurrency,
            &values.amount_in_account_currency,
        );

        match (
            timestamp,
            amount_original,
            currency_original,
            amount_in_account_currency,
        ) {
            (Ok(timestamp), Ok(amount_original), Ok(currency_original), Ok(amount_in_account_currency)) => {
                Ok(CanonicalRecord {
                    timestamp,
                    description: self.to_description(&values.description),
                    amount_original,
                    currency_original,
                    amount_in_account_currency,
                })
            }
            (timestamp, amount_original, currency_original, amount_in_account_currency) => {
                let errors: Vec<ImportError> = [
                    timestamp.err(),
                    amount_original.err(),
                    currency_original.err(),
                    amount_in_account_currency.err(),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(ImportError::RowInvalid {
                    line: values.line_number,
                    errors,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(timestamp: Value, amount: Value, currency: Value) -> FieldValues {
        FieldValues {
            line_number: 4,
            timestamp,
            description: Value::from("Coffee"),
            amount_original: amount.clone(),
            currency_original: currency,
            amount_in_account_currency: amount,
        }
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_timestamp_formats() {
        let n = DataNormalizer::default();

        assert_eq!(
            n.parse_timestamp(&Value::from("2024-03-01 10:00:00")).unwrap(),
            dt(2024, 3, 1, 10, 0, 0)
        );
        assert_eq!(
            n.parse_timestamp(&Value::from("2024-03-01T10:00:00")).unwrap(),
            dt(2024, 3, 1, 10, 0, 0)
        );
        assert_eq!(
            n.parse_timestamp(&Value::from(" 2024-03-01 ")).unwrap(),
            dt(2024, 3, 1, 0, 0, 0)
        );
        assert!(matches!(
            n.parse_timestamp(&Value::from("03/01/2024")),
            Err(ImportError::DateParse { .. })
        ));
        assert!(matches!(
            n.parse_timestamp(&Value::Int(20240301)),
            Err(ImportError::DateParse { .. })
        ));
    }

    #[test]
    fn test_configured_date_format() {
        let n = DataNormalizer::new(
            vec![],
            vec!["%d.%m.%Y".to_string()],
            NormalizationReport::FirstError,
        );
        assert_eq!(
            n.parse_timestamp(&Value::from("01.03.2024")).unwrap(),
            dt(2024, 3, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_amounts() {
        let n = DataNormalizer::default();
        let f = CanonicalField::AmountOriginal;

        assert_eq!(
            n.parse_amount(f, &Value::Double(3.5)).unwrap(),
            Decimal::from_str("3.50").unwrap()
        );
        assert_eq!(n.parse_amount(f, &Value::Int(-12)).unwrap(), Decimal::from(-12));
        assert_eq!(
            n.parse_amount(f, &Value::from(" 1,25 ")).unwrap(),
            Decimal::from_str("1.25").unwrap()
        );
        assert_eq!(
            n.parse_amount(f, &Value::from("-0.10")).unwrap(),
            Decimal::from_str("-0.10").unwrap()
        );
        assert!(matches!(
            n.parse_amount(f, &Value::from("abc")),
            Err(ImportError::AmountParse { .. })
        ));
        assert!(matches!(
            n.parse_amount(f, &Value::Double(f64::NAN)),
            Err(ImportError::AmountParse { .. })
        ));
        assert!(matches!(
            n.parse_amount(f, &Value::Null),
            Err(ImportError::AmountParse { .. })
        ));
    }

    #[test]
    fn test_currency_exact_match() {
        let n = DataNormalizer::default();
        assert_eq!(n.parse_currency(&Value::from("CHF")).unwrap(), Currency::CHF);
        assert!(matches!(
            n.parse_currency(&Value::from("chf")),
            Err(ImportError::UnknownCurrency { .. })
        ));
        assert!(matches!(
            n.parse_currency(&Value::from("XYZ")),
            Err(ImportError::UnknownCurrency { .. })
        ));
    }

    #[test]
    fn test_description_stringification() {
        let n = DataNormalizer::default();
        assert_eq!(n.to_description(&Value::from("  keep  ")), "  keep  ");
        assert_eq!(n.to_description(&Value::Null), "");
        assert_eq!(n.to_description(&Value::Int(5)), "5");
        assert_eq!(
            n.to_description(&Value::List(vec![Value::from("a"), Value::from("b")])),
            "[a, b]"
        );
    }

    #[test]
    fn test_first_error_policy() {
        let n = DataNormalizer::default();
        let err = n
            .normalize(&values(
                Value::from("bad"),
                Value::from("abc"),
                Value::from("XYZ"),
            ))
            .unwrap_err();

        assert!(matches!(err, ImportError::DateParse { .. }));
    }

    #[test]
    fn test_all_errors_policy() {
        let n = DataNormalizer::new(
            vec!["%Y-%m-%d %H:%M:%S".to_string()],
            vec!["%Y-%m-%d".to_string()],
            NormalizationReport::AllErrors,
        );
        let err = n
            .normalize(&values(
                Value::from("2024-03-01"),
                Value::from("abc"),
                Value::from("XYZ"),
            ))
            .unwrap_err();

        match err {
            ImportError::RowInvalid { line, errors } => {
                assert_eq!(line, 4);
                // amount_original, currency, amount_in_account_currency
                assert_eq!(errors.len(), 3);
                assert!(matches!(errors[1], ImportError::UnknownCurrency { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_success() {
        let record = DataNormalizer::default()
            .normalize(&values(
                Value::from("2024-03-01"),
                Value::Double(3.5),
                Value::from("EUR"),
            ))
            .unwrap();

        assert_eq!(record.description, "Coffee");
        assert_eq!(record.currency_original, Currency::EUR);
        assert_eq!(record.amount_original, Decimal::from_str("3.5").unwrap());
        assert_eq!(record.timestamp, dt(2024, 3, 1, 0, 0, 0));
    }
}

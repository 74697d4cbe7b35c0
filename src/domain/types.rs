// ==========================================
// FinView 导入引擎 - 领域类型定义
// ==========================================
// 依据: 持久化层账户/交易币种枚举
// 依据: 映射规范固定的 5 个标准字段
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 币种 (Currency)
// ==========================================
// 红线: 封闭枚举,精确匹配(区分大小写),不做模糊匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CHF,
}

impl Currency {
    /// 全部币种（与数据库 CHECK 约束一致）
    pub const ALL: [Currency; 4] = [Currency::USD, Currency::EUR, Currency::GBP, Currency::CHF];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 未知币种代码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCurrencyCode(pub String);

impl fmt::Display for UnknownCurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "未知币种: {}", self.0)
    }
}

impl std::error::Error for UnknownCurrencyCode {}

impl FromStr for Currency {
    type Err = UnknownCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCurrencyCode(s.to_string()))
    }
}

// ==========================================
// 标准字段 (Canonical Field)
// ==========================================
// 每份映射规范必须且只能定义这 5 个字段
// 顺序固定: 求值、归一化、报错均按此顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Timestamp,
    Description,
    AmountOriginal,
    CurrencyOriginal,
    AmountInAccountCurrency,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 5] = [
        CanonicalField::Timestamp,
        CanonicalField::Description,
        CanonicalField::AmountOriginal,
        CanonicalField::CurrencyOriginal,
        CanonicalField::AmountInAccountCurrency,
    ];

    /// 映射规范中的键名
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::Timestamp => "timestamp",
            CanonicalField::Description => "description",
            CanonicalField::AmountOriginal => "amount_original",
            CanonicalField::CurrencyOriginal => "currency_original",
            CanonicalField::AmountInAccountCurrency => "amount_in_account_currency",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        CanonicalField::ALL.iter().copied().find(|f| f.key() == key)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ==========================================
// 行归一化报错策略 (Normalization Report)
// ==========================================
// FirstError: 只报告第一个失败字段（默认）
// AllErrors: 尝试全部字段并汇总所有失败
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalizationReport {
    #[default]
    FirstError,
    AllErrors,
}

impl fmt::Display for NormalizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationReport::FirstError => write!(f, "FIRST_ERROR"),
            NormalizationReport::AllErrors => write!(f, "ALL_ERRORS"),
        }
    }
}

impl FromStr for NormalizationReport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FIRST_ERROR" => Ok(NormalizationReport::FirstError),
            "ALL_ERRORS" => Ok(NormalizationReport::AllErrors),
            other => Err(format!("无效的报错策略: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_exact_match() {
        assert_eq!("USD".parse::<Currency>(), Ok(Currency::USD));
        assert_eq!("CHF".parse::<Currency>(), Ok(Currency::CHF));
    }

    #[test]
    fn test_currency_case_sensitive() {
        assert!("usd".parse::<Currency>().is_err());
        assert!(" EUR".parse::<Currency>().is_err());
        assert_eq!(
            "XYZ".parse::<Currency>(),
            Err(UnknownCurrencyCode("XYZ".to_string()))
        );
    }

    #[test]
    fn test_canonical_field_keys() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_key(field.key()), Some(field));
        }
        assert_eq!(CanonicalField::from_key("amount"), None);
    }
}

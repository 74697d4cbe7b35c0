// ==========================================
// FinView 导入引擎 - 映射规范领域模型
// ==========================================
// 职责: 已校验的映射规范（加载后不可变）
// 红线: 未通过结构校验的规范不会被构造出来
// ==========================================

use crate::domain::types::CanonicalField;
use serde::{Deserialize, Serialize};

// ==========================================
// MappingSpecification - 映射规范
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSpecification {
    pub version: String, // 规范版本（自由文本）
    pub name: String,    // 显示名称
    pub parser: ParserOptions,
    pub mappings: FieldMappings,
}

// ==========================================
// ParserOptions - 解析选项
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserOptions {
    pub delimiter: char,  // 单字符分隔符
    pub skip_rows: usize, // 无条件丢弃的前导行数
}

// ==========================================
// FieldMappings - 标准字段 → 表达式
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMappings {
    pub timestamp: String,
    pub description: String,
    pub amount_original: String,
    pub currency_original: String,
    pub amount_in_account_currency: String,
}

impl FieldMappings {
    /// 按字段取表达式
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Timestamp => &self.timestamp,
            CanonicalField::Description => &self.description,
            CanonicalField::AmountOriginal => &self.amount_original,
            CanonicalField::CurrencyOriginal => &self.currency_original,
            CanonicalField::AmountInAccountCurrency => &self.amount_in_account_currency,
        }
    }

    /// 按固定顺序遍历 (字段, 表达式)
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> + '_ {
        CanonicalField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

// ==========================================
// SpecificationEntry - 注册表条目
// ==========================================
// 用途: 下拉选择项 (显示标签, 相对路径)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationEntry {
    pub label: String,
    pub reference: String, // 相对规范目录的路径（'/' 分隔）；哨兵项为空串
}

impl SpecificationEntry {
    /// 哨兵项: 不使用映射（手工录入）
    pub fn manual_entry() -> Self {
        Self {
            label: "No mapping (manual entry)".to_string(),
            reference: String::new(),
        }
    }

    pub fn is_manual_entry(&self) -> bool {
        self.reference.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_mappings_iter_order() {
        let mappings = FieldMappings {
            timestamp: "row[0]".to_string(),
            description: "row[1]".to_string(),
            amount_original: "double(row[2])".to_string(),
            currency_original: "'EUR'".to_string(),
            amount_in_account_currency: "double(row[2])".to_string(),
        };

        let keys: Vec<&str> = mappings.iter().map(|(f, _)| f.key()).collect();
        assert_eq!(
            keys,
            vec![
                "timestamp",
                "description",
                "amount_original",
                "currency_original",
                "amount_in_account_currency"
            ]
        );
        assert_eq!(mappings.get(CanonicalField::Description), "row[1]");
    }

    #[test]
    fn test_manual_entry_sentinel() {
        let entry = SpecificationEntry::manual_entry();
        assert!(entry.is_manual_entry());
    }
}

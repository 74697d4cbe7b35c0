// ==========================================
// FinView 导入引擎 - 行与标准记录
// ==========================================
// RawRow: 一行文本按分隔符切分后的单元格序列（仅在单行求值期间存在）
// CanonicalRecord: 引擎输出单元，每个有效行产出一条
// ==========================================

use crate::domain::types::Currency;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// RawRow - 原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line_number: usize, // 物理行号（从 1 开始）
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(line_number: usize, cells: Vec<String>) -> Self {
        Self { line_number, cells }
    }

    /// 空行或全部单元格为空白
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

// ==========================================
// CanonicalRecord - 标准交易记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub timestamp: NaiveDateTime,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_original: Decimal,
    pub currency_original: Currency,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_in_account_currency: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_row_blank_detection() {
        assert!(RawRow::new(1, vec![]).is_blank());
        assert!(RawRow::new(1, vec!["".to_string()]).is_blank());
        assert!(RawRow::new(1, vec![" ".to_string(), "\t".to_string()]).is_blank());
        assert!(!RawRow::new(1, vec!["".to_string(), "x".to_string()]).is_blank());
    }
}

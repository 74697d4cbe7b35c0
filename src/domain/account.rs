// ==========================================
// FinView 导入引擎 - 账户与交易实体
// ==========================================
// 依据: accounts / transactions 表（外键关联）
// 说明: 导入引擎只产出 CanonicalRecord，由仓储层转为 Transaction
// ==========================================

use crate::domain::types::Currency;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Account - 账户
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,                 // 唯一
    pub currency: Currency,
    pub mapping_spec: Option<String>, // 映射规范相对路径
}

/// 账户列表视图（含余额）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: Account,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal, // SUM(amount_original)
}

// ==========================================
// Transaction - 交易
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub date: NaiveDateTime,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_original: Decimal,
    pub currency_original: Currency,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_in_account_currency: Decimal,
    pub import_batch_id: Option<String>, // 手工录入为 None
}

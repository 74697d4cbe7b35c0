// ==========================================
// FinView 导入引擎 - 账户仓储
// ==========================================
// 职责: 管理 accounts 表；建户时可在同一事务内写入期初余额交易
// 余额: 账户下全部交易 amount_original 之和（十进制，在 Rust 侧求和）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{Account, AccountBalance, CanonicalRecord, Currency};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::transaction_repo_impl::{
    currency_column, decimal_column, insert_transactions,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 期初余额交易的描述
pub const INITIAL_BALANCE_DESCRIPTION: &str = "Initial Balance";

pub struct AccountRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AccountRepository {
    /// # 参数
    /// - db_path: 数据库文件路径（表结构需已初始化）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_account(row: &Row) -> rusqlite::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            name: row.get(1)?,
            currency: currency_column(row, 2)?,
            mapping_spec: row.get(3)?,
        })
    }

    /// 创建账户
    ///
    /// # 参数
    /// - name: 账户名（唯一，非空）
    /// - currency: 账户币种
    /// - initial_balance: (金额, 日期)；提供时同一事务内写入 "Initial Balance" 交易
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): 账户名重复
    pub fn create(
        &self,
        name: &str,
        currency: Currency,
        initial_balance: Option<(Decimal, NaiveDateTime)>,
    ) -> RepositoryResult<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "name".to_string(),
                message: "账户名不能为空".to_string(),
            });
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO accounts (name, currency) VALUES (?1, ?2)",
            params![name, currency.as_str()],
        )?;
        let id = tx.last_insert_rowid();

        if let Some((amount, date)) = initial_balance {
            let record = CanonicalRecord {
                timestamp: date,
                description: INITIAL_BALANCE_DESCRIPTION.to_string(),
                amount_original: amount,
                currency_original: currency,
                amount_in_account_currency: amount,
            };
            insert_transactions(&tx, id, None, std::slice::from_ref(&record))?;
        }

        tx.commit()?;
        info!(account_id = id, name = name, currency = %currency, "账户已创建");

        Ok(Account {
            id,
            name: name.to_string(),
            currency,
            mapping_spec: None,
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Account>> {
        let conn = self.get_conn()?;
        let account = conn
            .query_row(
                "SELECT id, name, currency, mapping_spec FROM accounts WHERE id = ?1",
                params![id],
                Self::map_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Account>> {
        let conn = self.get_conn()?;
        let account = conn
            .query_row(
                "SELECT id, name, currency, mapping_spec FROM accounts WHERE name = ?1",
                params![name],
                Self::map_account,
            )
            .optional()?;
        Ok(account)
    }

    /// 查询账户（不存在时返回 NotFound）
    pub fn get(&self, id: i64) -> RepositoryResult<Account> {
        self.find_by_id(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Account".to_string(),
            id: id.to_string(),
        })
    }

    /// 列出全部账户及余额（按 id 升序）
    pub fn list_with_balance(&self) -> RepositoryResult<Vec<AccountBalance>> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT id, name, currency, mapping_spec FROM accounts ORDER BY id")?;
        let rows = stmt.query_map([], Self::map_account)?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }

        let mut balances: HashMap<i64, Decimal> = HashMap::new();
        let mut stmt = conn.prepare("SELECT account_id, amount_original FROM transactions")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, decimal_column(row, 1)?))
        })?;
        for row in rows {
            let (account_id, amount) = row?;
            *balances.entry(account_id).or_insert(Decimal::ZERO) += amount;
        }

        Ok(accounts
            .into_iter()
            .map(|account| {
                let balance = balances.get(&account.id).copied().unwrap_or(Decimal::ZERO);
                AccountBalance { account, balance }
            })
            .collect())
    }

    /// 设置账户的映射规范（相对路径；None 表示手工录入）
    pub fn set_mapping_spec(&self, id: i64, reference: Option<&str>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE accounts SET mapping_spec = ?1 WHERE id = ?2",
            params![reference, id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Account".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

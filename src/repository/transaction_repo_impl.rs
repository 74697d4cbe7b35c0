// ==========================================
// FinView 导入引擎 - 交易 Repository 实现
// ==========================================
// 职责: 实现交易数据访问（使用 rusqlite）
// 存储: 金额为十进制文本，日期为 "%Y-%m-%d %H:%M:%S" 文本
// ==========================================

use crate::db::{open_sqlite_connection, DATETIME_STORAGE_FORMAT};
use crate::domain::{CanonicalRecord, Currency, Transaction};
use crate::importer::error::ImportResult;
use crate::importer::importer_trait::BatchSink;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::transaction_repo::TransactionRepository;
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// 列值解析（供各仓储复用）
// ==========================================

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn currency_column(row: &Row, idx: usize) -> rusqlite::Result<Currency> {
    let raw: String = row.get(idx)?;
    Currency::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_STORAGE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_STORAGE_FORMAT).to_string()
}

/// 在已开启的事务/连接上插入交易
pub(crate) fn insert_transactions(
    conn: &Connection,
    account_id: i64,
    batch_id: Option<&str>,
    records: &[CanonicalRecord],
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO transactions (
            account_id, date, description, amount_original,
            currency_original, amount_in_account_currency, import_batch_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?;

    let mut count = 0;
    for record in records {
        stmt.execute(params![
            account_id,
            format_datetime(&record.timestamp),
            record.description,
            record.amount_original.to_string(),
            record.currency_original.as_str(),
            record.amount_in_account_currency.to_string(),
            batch_id,
        ])?;
        count += 1;
    }
    Ok(count)
}

// ==========================================
// TransactionRepositoryImpl
// ==========================================
pub struct TransactionRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionRepositoryImpl {
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

    fn map_transaction(row: &Row) -> rusqlite::Result<Transaction> {
        Ok(Transaction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            date: datetime_column(row, 2)?,
            description: row.get(3)?,
            amount_original: decimal_column(row, 4)?,
            currency_original: currency_column(row, 5)?,
            amount_in_account_currency: decimal_column(row, 6)?,
            import_batch_id: row.get(7)?,
        })
    }
}

impl TransactionRepository for TransactionRepositoryImpl {
    fn batch_insert(
        &self,
        account_id: i64,
        batch_id: Option<&str>,
        records: &[CanonicalRecord],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let count = insert_transactions(&tx, account_id, batch_id, records)?;

        tx.commit()?;
        debug!(account_id = account_id, count = count, "交易批量插入完成");
        Ok(count)
    }

    fn list_by_account(&self, account_id: i64) -> RepositoryResult<Vec<Transaction>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, account_id, date, description, amount_original,
                   currency_original, amount_in_account_currency, import_batch_id
            FROM transactions
            WHERE account_id = ?1
            ORDER BY date DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map(params![account_id], Self::map_transaction)?;
        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?);
        }
        Ok(transactions)
    }

    fn count_by_account(&self, account_id: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

// ==========================================
// AccountBatchSink - 将导入批次写入指定账户
// ==========================================
pub struct AccountBatchSink<'a> {
    repo: &'a dyn TransactionRepository,
    account_id: i64,
}

impl<'a> AccountBatchSink<'a> {
    pub fn new(repo: &'a dyn TransactionRepository, account_id: i64) -> Self {
        Self { repo, account_id }
    }
}

impl BatchSink for AccountBatchSink<'_> {
    fn commit_batch(&self, batch_id: &str, records: &[CanonicalRecord]) -> ImportResult<usize> {
        let count = self
            .repo
            .batch_insert(self.account_id, Some(batch_id), records)?;
        info!(
            account_id = self.account_id,
            batch_id = batch_id,
            count = count,
            "导入批次已落库"
        );
        Ok(count)
    }
}

// ==========================================
// FinView 导入引擎 - 交易 Repository Trait
// ==========================================
// 职责: 定义交易数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{CanonicalRecord, Transaction};
use crate::repository::error::RepositoryResult;

// ==========================================
// TransactionRepository Trait
// ==========================================
// 用途: 导入批次落库、交易查询
// 实现者: TransactionRepositoryImpl（使用 rusqlite）
pub trait TransactionRepository: Send + Sync {
    /// 批量插入交易（单事务）
    ///
    /// # 参数
    /// - account_id: 所属账户
    /// - batch_id: 导入批次号（手工录入为 None）
    /// - records: 标准记录
    ///
    /// # 返回
    /// - Ok(usize): 插入条数
    /// - Err: 数据库错误（整个事务回滚）
    fn batch_insert(
        &self,
        account_id: i64,
        batch_id: Option<&str>,
        records: &[CanonicalRecord],
    ) -> RepositoryResult<usize>;

    /// 按账户查询交易，日期倒序（同日期按 id 倒序）
    fn list_by_account(&self, account_id: i64) -> RepositoryResult<Vec<Transaction>>;

    /// 统计账户交易数
    fn count_by_account(&self, account_id: i64) -> RepositoryResult<usize>;
}

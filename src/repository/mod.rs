// ==========================================
// FinView 导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供账户/交易数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod account_repo;
pub mod error;
pub mod transaction_repo;
pub mod transaction_repo_impl;

// 重导出核心仓储
pub use account_repo::{AccountRepository, INITIAL_BALANCE_DESCRIPTION};
pub use error::{RepositoryError, RepositoryResult};
pub use transaction_repo::TransactionRepository;
pub use transaction_repo_impl::{AccountBatchSink, TransactionRepositoryImpl};

// ==========================================
// FinView 导入引擎 - 应用层
// ==========================================
// 职责: 组装共享状态,供命令行入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV, DEFAULT_DB_FILE};

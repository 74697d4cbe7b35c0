// ==========================================
// FinView 导入引擎 - API 层
// ==========================================
// 职责: 提供账户/导入业务接口,供命令行与上层应用调用
// ==========================================

pub mod account_api;
pub mod error;
pub mod import_api;

// 重导出核心类型
pub use account_api::AccountApi;
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportReport};

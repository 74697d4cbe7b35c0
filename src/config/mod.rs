// ==========================================
// FinView 导入引擎 - 配置层
// ==========================================
// 职责: 导入配置读取（规范目录、扩展名、日期格式、报错策略）
// 存储: config_kv 表；无数据库时使用内存配置
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod static_config;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;
pub use static_config::StaticImportConfig;

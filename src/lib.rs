// ==========================================
// FinView 导入引擎 - 核心库
// ==========================================
// 职责: 按声明式映射规范把银行/信用卡对账单导入为标准交易记录
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 映射规范、表达式、标准化、编排
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CanonicalField, Currency, NormalizationReport};

// 领域实体
pub use domain::{
    Account, AccountBalance, CanonicalRecord, ImportOutcome, ImportSummary,
    MappingSpecification, SpecificationEntry, Transaction,
};

// 导入层
pub use importer::{
    list_specifications, load_specification, ImportError, ImportOptions, ImportResult,
    SpecRegistry, StatementImporter, StatementImporterImpl,
};

// API
pub use api::{AccountApi, ApiError, ApiResult, ImportApi, ImportReport};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "FinView";

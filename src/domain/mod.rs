// ==========================================
// FinView 导入引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod account;
pub mod import;
pub mod mapping_spec;
pub mod record;
pub mod types;

// 重导出核心类型
pub use account::{Account, AccountBalance, Transaction};
pub use import::{ImportOutcome, ImportSummary};
pub use mapping_spec::{FieldMappings, MappingSpecification, ParserOptions, SpecificationEntry};
pub use record::{CanonicalRecord, RawRow};
pub use types::{CanonicalField, Currency, NormalizationReport, UnknownCurrencyCode};

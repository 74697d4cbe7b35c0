// ==========================================
// FinView 导入引擎 - 导入层
// ==========================================
// 职责: 映射规范加载/注册、表达式求值、行标准化、导入编排
// 流程: 注册表 → 规范加载校验 → 编排器 → (求值 → 标准化) × N → 整批提交
// ==========================================

// 模块声明
pub mod error;
pub mod expression;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod row_normalizer;
pub mod spec_loader;
pub mod spec_registry;
pub mod statement_importer_impl;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::{ExpressionFieldMapper, FieldValues};
pub use file_parser::{DelimitedTextParser, TokenizedFile};
pub use row_normalizer::DataNormalizer;
pub use spec_loader::{
    load_specification, load_specification_str, load_with_policy, LoadPolicy, SpecFormat,
};
pub use spec_registry::SpecRegistry;
pub use statement_importer_impl::{
    CancellationFlag, ImportOptions, MemorySink, StatementImporterImpl,
};

// 重导出 Trait 接口
pub use importer_trait::{BatchSink, FileParser, RowEvaluator, RowNormalizer, StatementImporter};

use crate::config::ImportConfigReader;
use crate::domain::SpecificationEntry;
use std::path::Path;

/// 列出目录下可用的映射规范（首项为手工录入哨兵）
pub fn list_specifications(
    directory: &Path,
    config: &dyn ImportConfigReader,
) -> ImportResult<Vec<SpecificationEntry>> {
    let registry = SpecRegistry::new(directory, config.get_spec_extensions()?);
    Ok(registry.list_available())
}

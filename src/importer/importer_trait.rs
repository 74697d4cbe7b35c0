// ==========================================
// FinView 导入引擎 - 导入管道 Trait
// ==========================================
// 职责: 定义导入各阶段接口（不包含实现）
// 流程: 分词 → 逐行(求值 → 标准化 → 累积) → 整批提交
// ==========================================

use crate::domain::{CanonicalRecord, ImportOutcome, MappingSpecification, ParserOptions, RawRow};
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::FieldValues;
use crate::importer::file_parser::TokenizedFile;
use crate::importer::statement_importer_impl::ImportOptions;
use std::path::Path;

// ==========================================
// StatementImporter Trait
// ==========================================
// 用途: 对账单导入主接口
// 实现者: StatementImporterImpl
pub trait StatementImporter: Send + Sync {
    /// 按映射规范导入文件
    ///
    /// # 参数
    /// - file_path: 对账单文件路径
    /// - spec: 已通过校验的映射规范
    /// - sink: 持久化协作方（整批一次提交）
    /// - options: dry-run / 取消标志
    ///
    /// # 返回
    /// - Ok(ImportOutcome::Imported): 已导入（或 dry-run 预览）
    /// - Ok(ImportOutcome::NoTransactions): 没有可导入的行（警告，非错误）
    /// - Err: 第一处行级错误（带行号），此时没有任何记录被提交
    fn import_file(
        &self,
        file_path: &Path,
        spec: &MappingSpecification,
        sink: &dyn BatchSink,
        options: &ImportOptions,
    ) -> ImportResult<ImportOutcome>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 分词阶段
// 实现者: DelimitedTextParser
pub trait FileParser: Send + Sync {
    /// 读取文件并按分隔符切分为原始行
    ///
    /// # 说明
    /// - 前 skip_rows 行无条件丢弃
    /// - 空行保留（由编排器统计并忽略）
    fn tokenize(&self, file_path: &Path, options: &ParserOptions) -> ImportResult<TokenizedFile>;
}

// ==========================================
// RowEvaluator Trait
// ==========================================
// 用途: 求值阶段（5 个字段表达式）
// 实现者: ExpressionFieldMapper
pub trait RowEvaluator: Send + Sync {
    /// 对一行求值全部字段；任一字段失败即中止该行
    fn evaluate_row(&self, row: &RawRow) -> ImportResult<FieldValues>;
}

// ==========================================
// RowNormalizer Trait
// ==========================================
// 用途: 标准化阶段（日期、金额、币种）
// 实现者: DataNormalizer
pub trait RowNormalizer: Send + Sync {
    /// 将求值结果转换为标准记录
    fn normalize(&self, values: &FieldValues) -> ImportResult<CanonicalRecord>;
}

// ==========================================
// BatchSink Trait
// ==========================================
// 用途: 持久化协作方，整批记录一次事务提交
// 实现者: AccountBatchSink（SQLite）, 测试中的内存实现
pub trait BatchSink: Send + Sync {
    /// 提交整批记录；失败时不得留下任何部分写入
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    fn commit_batch(&self, batch_id: &str, records: &[CanonicalRecord]) -> ImportResult<usize>;
}

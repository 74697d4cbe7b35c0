// ==========================================
// FinView 导入引擎 - 对账单导入编排器
// ==========================================
// 职责: 整合导入流程，从文件到持久化协作方
// 流程: 分词 → 逐行(求值 → 标准化 → 累积) → 整批提交
// 策略: 严格；第一处行级错误即终止，整批不提交
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{CanonicalRecord, ImportOutcome, ImportSummary, MappingSpecification};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::expression::{HelperRegistry, Helpers};
use crate::importer::field_mapper::ExpressionFieldMapper;
use crate::importer::file_parser::DelimitedTextParser;
use crate::importer::importer_trait::{
    BatchSink, FileParser, RowEvaluator, RowNormalizer, StatementImporter,
};
use crate::importer::row_normalizer::DataNormalizer;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 导入选项
// ==========================================

/// 协作式取消标志（逐行检查）
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// 只预览，不提交
    pub dry_run: bool,
    pub cancel: Option<CancellationFlag>,
}

impl ImportOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            cancel: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, |c| c.is_cancelled())
    }
}

// ==========================================
// StatementImporterImpl - 导入编排器实现
// ==========================================
pub struct StatementImporterImpl {
    file_parser: Box<dyn FileParser>,
    normalizer: Box<dyn RowNormalizer>,
    helpers: Arc<dyn Helpers>,
}

impl Default for StatementImporterImpl {
    fn default() -> Self {
        Self::new(
            Box::new(DelimitedTextParser::new()),
            Box::new(DataNormalizer::default()),
            Arc::new(HelperRegistry::new()),
        )
    }
}

impl StatementImporterImpl {
    /// 创建导入编排器
    ///
    /// # 参数
    /// - file_parser: 分词器
    /// - normalizer: 行标准化器
    /// - helpers: 表达式函数集合
    pub fn new(
        file_parser: Box<dyn FileParser>,
        normalizer: Box<dyn RowNormalizer>,
        helpers: Arc<dyn Helpers>,
    ) -> Self {
        Self {
            file_parser,
            normalizer,
            helpers,
        }
    }

    /// 按配置（日期格式、报错策略）创建，其余组件使用标准实现
    pub fn from_config(config: &dyn ImportConfigReader) -> ImportResult<Self> {
        Ok(Self::new(
            Box::new(DelimitedTextParser::new()),
            Box::new(DataNormalizer::from_config(config)?),
            Arc::new(HelperRegistry::new()),
        ))
    }
}

impl StatementImporter for StatementImporterImpl {
    #[instrument(skip(self, file_path, spec, sink, options), fields(batch_id))]
    fn import_file(
        &self,
        file_path: &Path,
        spec: &MappingSpecification,
        sink: &dyn BatchSink,
        options: &ImportOptions,
    ) -> ImportResult<ImportOutcome> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        info!(
            batch_id = %batch_id,
            file_path = %file_path.display(),
            spec = %spec.name,
            dry_run = options.dry_run,
            "开始导入对账单"
        );

        // 步骤 1: 分词
        debug!("步骤 1: 分词");
        let tokenized = self.file_parser.tokenize(file_path, &spec.parser)?;

        // 步骤 2: 编译字段表达式
        debug!("步骤 2: 编译字段表达式");
        let evaluator =
            ExpressionFieldMapper::with_helpers(&spec.name, &spec.mappings, self.helpers.clone())?;

        // 步骤 3: 逐行求值与标准化
        debug!(rows = tokenized.rows.len(), "步骤 3: 逐行求值与标准化");
        let mut records: Vec<CanonicalRecord> = Vec::with_capacity(tokenized.rows.len());
        let mut ignored_blank = 0;

        for row in &tokenized.rows {
            if options.is_cancelled() {
                warn!(line = row.line_number, "导入已取消");
                return Err(ImportError::Cancelled {
                    line: row.line_number,
                });
            }

            if row.is_blank() {
                ignored_blank += 1;
                continue;
            }

            let record = evaluator
                .evaluate_row(row)
                .and_then(|values| self.normalizer.normalize(&values))
                .map_err(|e| {
                    let e = e.at_line(row.line_number);
                    error!(line = row.line_number, error = %e, "行处理失败，整批回滚");
                    e
                })?;
            records.push(record);
        }

        let mut summary = ImportSummary {
            batch_id: batch_id.clone(),
            total_lines: tokenized.total_lines,
            skipped_header: tokenized.skipped_header,
            ignored_blank,
            imported: records.len(),
            committed: false,
            elapsed: start_time.elapsed(),
        };

        if records.is_empty() {
            warn!(
                batch_id = %batch_id,
                ignored_blank = ignored_blank,
                "未发现可导入的交易"
            );
            return Ok(ImportOutcome::NoTransactions { summary });
        }

        // 步骤 4: 整批提交
        if options.dry_run {
            debug!("步骤 4: dry-run，跳过提交");
        } else {
            debug!("步骤 4: 整批提交");
            let written = sink.commit_batch(&batch_id, &records)?;
            summary.committed = true;
            debug!(count = written, "批次提交完成");
        }
        summary.elapsed = start_time.elapsed();

        info!(
            batch_id = %batch_id,
            imported = summary.imported,
            ignored_blank = summary.ignored_blank,
            skipped_header = summary.skipped_header,
            committed = summary.committed,
            elapsed_ms = summary.elapsed.as_millis(),
            "对账单导入完成"
        );

        Ok(ImportOutcome::Imported { summary, records })
    }
}

// ==========================================
// MemorySink - 内存持久化（预览/测试）
// ==========================================
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<(String, Vec<CanonicalRecord>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已提交的批次（批次号, 记录）
    pub fn batches(&self) -> Vec<(String, Vec<CanonicalRecord>)> {
        self.batches
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    pub fn record_count(&self) -> usize {
        self.batches().iter().map(|(_, r)| r.len()).sum()
    }
}

impl BatchSink for MemorySink {
    fn commit_batch(&self, batch_id: &str, records: &[CanonicalRecord]) -> ImportResult<usize> {
        let mut batches = self
            .batches
            .lock()
            .map_err(|e| ImportError::Persistence(format!("锁获取失败: {}", e)))?;
        batches.push((batch_id.to_string(), records.to_vec()));
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::spec_loader::{load_specification_str, SpecFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SPEC: &str = r#"
version: "1"
name: Test
parser:
  delimiter: ";"
  skip_rows: 1
mappings:
  timestamp: "'2024-03-01'"
  description: "row[0]"
  amount_original: "double(row[1])"
  currency_original: "'EUR'"
  amount_in_account_currency: "double(row[1])"
"#;

    fn statement(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", content).unwrap();
        temp_file
    }

    fn spec() -> MappingSpecification {
        load_specification_str(SPEC, SpecFormat::Yaml).unwrap()
    }

    /// 总是失败的持久化协作方
    struct FailingSink;

    impl BatchSink for FailingSink {
        fn commit_batch(&self, _batch_id: &str, _records: &[CanonicalRecord]) -> ImportResult<usize> {
            Err(ImportError::Persistence("disk full".to_string()))
        }
    }

    #[test]
    fn test_cancelled_before_first_row() {
        let file = statement("header;x\nCoffee;3,50\n");
        let flag = CancellationFlag::new();
        flag.cancel();
        let options = ImportOptions {
            dry_run: false,
            cancel: Some(flag),
        };
        let sink = MemorySink::new();

        let err = StatementImporterImpl::default()
            .import_file(file.path(), &spec(), &sink, &options)
            .unwrap_err();

        assert!(matches!(err, ImportError::Cancelled { line: 2 }));
        assert_eq!(sink.record_count(), 0);
    }

    #[test]
    fn test_dry_run_does_not_commit() {
        let file = statement("header;x\nCoffee;3,50\nTea;2,00\n");
        let sink = MemorySink::new();

        let outcome = StatementImporterImpl::default()
            .import_file(file.path(), &spec(), &sink, &ImportOptions::dry_run())
            .unwrap();

        assert_eq!(outcome.counts(), (2, 0));
        assert!(!outcome.summary().committed);
        assert!(sink.batches().is_empty());
    }

    #[test]
    fn test_commit_failure_propagates() {
        let file = statement("header;x\nCoffee;3,50\n");

        let err = StatementImporterImpl::default()
            .import_file(file.path(), &spec(), &FailingSink, &ImportOptions::default())
            .unwrap_err();

        assert!(matches!(err, ImportError::Persistence(_)));
    }

    #[test]
    fn test_batch_id_shared_with_sink() {
        let file = statement("header;x\nCoffee;3,50\n");
        let sink = MemorySink::new();

        let outcome = StatementImporterImpl::default()
            .import_file(file.path(), &spec(), &sink, &ImportOptions::default())
            .unwrap();

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, outcome.summary().batch_id);
        assert!(outcome.summary().committed);
    }
}

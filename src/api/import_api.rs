// ==========================================
// FinView 导入引擎 - 导入API
// ==========================================
// 职责: 规范列表/校验、按账户绑定的规范导入对账单文件
// 流程: 账户 → 映射规范(严格加载) → 编排器 → AccountBatchSink 整批落库
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_and_init;
use crate::domain::{ImportOutcome, MappingSpecification, SpecificationEntry};
use crate::importer::{
    list_specifications, load_specification, ImportOptions, SpecRegistry, StatementImporter,
    StatementImporterImpl,
};
use crate::repository::{AccountBatchSink, AccountRepository, TransactionRepositoryImpl};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// 导入结果报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// 面向用户的结果说明
    pub message: String,
    /// 导入的交易条数
    pub imported: usize,
    /// 忽略的空行数
    pub ignored_blank: usize,
    /// 文件中没有任何交易时为 true
    pub warning: bool,
    /// 导入批次ID
    pub batch_id: String,
    /// 是否已落库（预览模式为 false）
    pub committed: bool,
    /// 导入耗时（毫秒）
    pub elapsed_ms: u64,
}

impl ImportReport {
    fn from_outcome(outcome: &ImportOutcome) -> Self {
        let summary = outcome.summary();
        let (message, warning) = match outcome {
            ImportOutcome::NoTransactions { .. } => ("文件中未发现交易".to_string(), true),
            ImportOutcome::Imported { .. } if summary.committed => (
                format!(
                    "已导入 {} 条交易（忽略空行 {} 行）",
                    summary.imported, summary.ignored_blank
                ),
                false,
            ),
            ImportOutcome::Imported { .. } => (
                format!(
                    "预览: 可导入 {} 条交易（忽略空行 {} 行），未落库",
                    summary.imported, summary.ignored_blank
                ),
                false,
            ),
        };

        Self {
            message,
            imported: summary.imported,
            ignored_blank: summary.ignored_blank,
            warning,
            batch_id: summary.batch_id.clone(),
            committed: summary.committed,
            elapsed_ms: summary.elapsed.as_millis() as u64,
        }
    }
}

/// 导入API
pub struct ImportApi {
    account_repo: AccountRepository,
    transaction_repo: TransactionRepositoryImpl,
    config: Arc<dyn ImportConfigReader>,
}

impl ImportApi {
    /// 打开数据库（必要时初始化表结构），配置从 config_kv 读取
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = Arc::new(Mutex::new(open_and_init(db_path)?));
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(Self::with_config(conn, Arc::new(config)))
    }

    pub fn with_config(conn: Arc<Mutex<Connection>>, config: Arc<dyn ImportConfigReader>) -> Self {
        Self {
            account_repo: AccountRepository::from_connection(conn.clone()),
            transaction_repo: TransactionRepositoryImpl::from_connection(conn),
            config,
        }
    }

    /// 列出配置目录下的可用规范（首项为手工录入哨兵）
    pub fn list_specifications(&self) -> ApiResult<Vec<SpecificationEntry>> {
        let dir = self.config.get_spec_dir()?;
        self.list_specifications_in(&dir)
    }

    /// 列出指定目录下的可用规范
    pub fn list_specifications_in(&self, directory: &Path) -> ApiResult<Vec<SpecificationEntry>> {
        Ok(list_specifications(directory, self.config.as_ref())?)
    }

    /// 加载并校验单个规范文件
    pub fn load_specification(&self, path: &Path) -> ApiResult<MappingSpecification> {
        Ok(load_specification(path)?)
    }

    /// 按账户绑定的映射规范导入文件（整批落库）
    ///
    /// # 参数
    /// - account_id: 目标账户
    /// - file_path: 对账单文件
    ///
    /// # 返回
    /// - Ok(ImportReport): 导入结果；文件无交易时 warning=true
    /// - Err(InvalidInput): 账户未绑定映射规范
    /// - Err(ImportError): 任一行失败（带行号），不落库
    pub fn import_for_account(&self, account_id: i64, file_path: &Path) -> ApiResult<ImportReport> {
        self.import_for_account_with_options(account_id, file_path, &ImportOptions::default())
    }

    /// 同 import_for_account，可指定预览/取消
    #[instrument(skip(self, options), fields(file = %file_path.display()))]
    pub fn import_for_account_with_options(
        &self,
        account_id: i64,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ApiResult<ImportReport> {
        let account = self.account_repo.get(account_id)?;
        let reference = match account.mapping_spec.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => {
                return Err(ApiError::InvalidInput(format!(
                    "账户 '{}' 未绑定映射规范",
                    account.name
                )))
            }
        };

        let registry = SpecRegistry::from_config(self.config.as_ref())?;
        let spec = registry.load(&reference)?;
        let importer = StatementImporterImpl::from_config(self.config.as_ref())?;
        let sink = AccountBatchSink::new(&self.transaction_repo, account.id);

        let outcome = importer
            .import_file(file_path, &spec, &sink, options)
            .map_err(|e| {
                warn!(account_id = account.id, error = %e, "导入失败，未落库");
                ApiError::from(e)
            })?;

        let report = ImportReport::from_outcome(&outcome);
        info!(
            account_id = account.id,
            spec = %spec.name,
            imported = report.imported,
            committed = report.committed,
            "账户导入完成"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AccountApi;
    use crate::config::StaticImportConfig;
    use crate::db::init_schema;
    use crate::domain::Currency;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    const SPEC: &str = r#"
version: "1"
name: Test Bank
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

    fn setup(spec_dir: &Path) -> (AccountApi, ImportApi) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let config: Arc<dyn ImportConfigReader> =
            Arc::new(StaticImportConfig::new().with_spec_dir(spec_dir));
        (
            AccountApi::with_config(conn.clone(), config.clone()),
            ImportApi::with_config(conn, config),
        )
    }

    fn create_account(api: &AccountApi) -> i64 {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        api.create_account("Main", Currency::EUR, Decimal::ZERO, date)
            .unwrap()
            .id
    }

    #[test]
    fn test_import_requires_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let (accounts, imports) = setup(dir.path());
        let id = create_account(&accounts);

        let file = dir.path().join("statement.csv");
        std::fs::write(&file, "h\nCoffee;3,50\n").unwrap();

        assert!(matches!(
            imports.import_for_account(id, &file),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_import_commits_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bank.yaml"), SPEC).unwrap();
        let (accounts, imports) = setup(dir.path());
        let id = create_account(&accounts);
        accounts.assign_mapping(id, "bank.yaml").unwrap();

        let file = dir.path().join("statement.csv");
        std::fs::write(&file, "Text;Amount\nCoffee;3,50\n\nRent;-1200\n").unwrap();

        let report = imports.import_for_account(id, &file).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.ignored_blank, 1);
        assert!(report.committed);
        assert!(!report.warning);

        // 期初余额 + 2 条导入
        let transactions = accounts.list_transactions(id).unwrap();
        assert_eq!(transactions.len(), 3);
        let balance = accounts.list_accounts().unwrap()[0].balance;
        assert_eq!(balance, Decimal::new(-11965, 1));
    }

    #[test]
    fn test_header_only_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bank.yaml"), SPEC).unwrap();
        let (accounts, imports) = setup(dir.path());
        let id = create_account(&accounts);
        accounts.assign_mapping(id, "bank.yaml").unwrap();

        let file = dir.path().join("statement.csv");
        std::fs::write(&file, "Text;Amount\n").unwrap();

        let report = imports.import_for_account(id, &file).unwrap();
        assert!(report.warning);
        assert_eq!(report.imported, 0);
        assert!(!report.committed);
    }

    #[test]
    fn test_failed_row_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bank.yaml"), SPEC).unwrap();
        let (accounts, imports) = setup(dir.path());
        let id = create_account(&accounts);
        accounts.assign_mapping(id, "bank.yaml").unwrap();

        let file = dir.path().join("statement.csv");
        std::fs::write(&file, "Text;Amount\nCoffee;3,50\nTea;abc\n").unwrap();

        let err = imports.import_for_account(id, &file).unwrap_err();
        assert!(err.to_string().contains("第 3 行"));
        assert_eq!(accounts.list_transactions(id).unwrap().len(), 1);
    }
}

// ==========================================
// FinView 导入引擎 - 账户API
// ==========================================
// 职责: 建户（含期初余额交易）、账户/交易查询、绑定映射规范
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{open_and_init, DATETIME_STORAGE_FORMAT};
use crate::domain::{Account, AccountBalance, Currency, Transaction};
use crate::importer::SpecRegistry;
use crate::repository::{AccountRepository, TransactionRepository, TransactionRepositoryImpl};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// 账户API
pub struct AccountApi {
    account_repo: AccountRepository,
    transaction_repo: TransactionRepositoryImpl,
    config: Arc<dyn ImportConfigReader>,
}

impl AccountApi {
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

    /// 创建账户并写入期初余额交易
    ///
    /// # 参数
    /// - name: 账户名（唯一，非空）
    /// - currency: 账户币种
    /// - initial_amount: 期初余额（为 0 时同样写入交易）
    /// - date: 期初余额日期
    ///
    /// # 返回
    /// - Err(InvalidInput): 账户名为空
    /// - Err(BusinessRuleViolation): 账户名重复
    #[instrument(skip(self))]
    pub fn create_account(
        &self,
        name: &str,
        currency: Currency,
        initial_amount: Decimal,
        date: NaiveDateTime,
    ) -> ApiResult<Account> {
        let account = self
            .account_repo
            .create(name, currency, Some((initial_amount, date)))?;
        info!(account_id = account.id, "建户完成");
        Ok(account)
    }

    /// 从用户输入创建账户
    ///
    /// # 参数
    /// - currency: 币种代码（USD/EUR/GBP/CHF）
    /// - amount: 期初余额文本；None 或空串视为 0
    /// - date: "%Y-%m-%d %H:%M:%S" 或 "%Y-%m-%d"；None 为当前时间
    pub fn create_account_from_input(
        &self,
        name: &str,
        currency: &str,
        amount: Option<&str>,
        date: Option<&str>,
    ) -> ApiResult<Account> {
        if name.trim().is_empty() || currency.trim().is_empty() {
            return Err(ApiError::InvalidInput("账户名和币种为必填项".to_string()));
        }
        let currency = Currency::from_str(currency.trim())
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        let amount = parse_amount_input(amount)?;
        let date = parse_date_input(date)?;

        self.create_account(name, currency, amount, date)
    }

    /// 列出全部账户及余额
    pub fn list_accounts(&self) -> ApiResult<Vec<AccountBalance>> {
        Ok(self.account_repo.list_with_balance()?)
    }

    /// 账户交易（日期倒序）
    pub fn list_transactions(&self, account_id: i64) -> ApiResult<Vec<Transaction>> {
        self.account_repo.get(account_id)?;
        Ok(self.transaction_repo.list_by_account(account_id)?)
    }

    /// 为账户绑定映射规范
    ///
    /// # 参数
    /// - relative_path: 相对规范目录的路径；空串表示解除绑定（手工录入）
    ///
    /// # 返回
    /// - Err(SpecInvalid): 规范不存在或校验失败（绑定前严格加载一次）
    #[instrument(skip(self))]
    pub fn assign_mapping(&self, account_id: i64, relative_path: &str) -> ApiResult<Account> {
        let reference = relative_path.trim();
        if reference.is_empty() {
            self.account_repo.set_mapping_spec(account_id, None)?;
            info!(account_id = account_id, "已解除映射规范");
        } else {
            let registry = SpecRegistry::from_config(self.config.as_ref())?;
            let spec = registry.load(reference)?;
            self.account_repo.set_mapping_spec(account_id, Some(reference))?;
            info!(account_id = account_id, spec = %spec.name, "已绑定映射规范");
        }
        Ok(self.account_repo.get(account_id)?)
    }
}

fn parse_amount_input(amount: Option<&str>) -> ApiResult<Decimal> {
    match amount.map(str::trim) {
        None | Some("") => Ok(Decimal::ZERO),
        Some(text) => Decimal::from_str(text)
            .map_err(|_| ApiError::InvalidInput(format!("金额格式错误: '{}'", text))),
    }
}

fn parse_date_input(date: Option<&str>) -> ApiResult<NaiveDateTime> {
    match date.map(str::trim) {
        None | Some("") => Ok(chrono::Local::now().naive_local()),
        Some(text) => NaiveDateTime::parse_from_str(text, DATETIME_STORAGE_FORMAT)
            .or_else(|_| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|_| ApiError::InvalidInput(format!("日期格式错误: '{}'", text))),
    }
}

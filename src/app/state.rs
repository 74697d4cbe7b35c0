// ==========================================
// FinView 导入引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 约束: 所有API共享同一个数据库连接
// ==========================================

use crate::api::{AccountApi, ApiError, ApiResult, ImportApi};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_and_init;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "finview.db";

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "FINVIEW_DB_PATH";

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 账户API
    pub account_api: Arc<AccountApi>,

    /// 对账单导入API
    pub import_api: Arc<ImportApi>,

    /// 配置管理器（config_kv 覆写）
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 打开数据库（必要时建表）并初始化全部API
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = Arc::new(Mutex::new(open_and_init(&db_path)?));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| ApiError::ConfigError(e.to_string()))?,
        );
        let config: Arc<dyn ImportConfigReader> = config_manager.clone();

        let account_api = Arc::new(AccountApi::with_config(conn.clone(), config.clone()));
        let import_api = Arc::new(ImportApi::with_config(conn, config));

        tracing::info!("AppState初始化成功");
        Ok(Self {
            db_path,
            account_api,
            import_api,
            config_manager,
        })
    }
}

/// 默认数据库路径
///
/// # 默认值
/// 1. 环境变量 FINVIEW_DB_PATH（非空时）
/// 2. 用户数据目录下的 finview/finview.db
/// 3. 当前目录下的 finview.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(".").join(DEFAULT_DB_FILE);
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("finview");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DEFAULT_DB_FILE);
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_shares_connection() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let state = AppState::new(db_path).unwrap();

        let account = state
            .account_api
            .create_account_from_input("Main", "GBP", Some("5"), Some("2024-01-01"))
            .unwrap();
        let accounts = state.account_api.list_accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].account.id, account.id);

        // 未绑定规范的账户无法导入
        let err = state
            .import_api
            .import_for_account(account.id, temp_file.path())
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}

// ==========================================
// FinView 导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value, global scope)
// 列表类配置以 JSON 数组存储
// ==========================================

use crate::config::import_config_trait::{defaults, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::types::NormalizationReport;
use crate::importer::error::{ImportError, ImportResult};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| ImportError::ConfigReadError {
            key: key.to_string(),
            message: format!("锁获取失败: {}", e),
        })?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ImportError::ConfigReadError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// 写入配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 写入列表配置（JSON 数组）
    pub fn set_config_list(&self, key: &str, values: &[&str]) -> Result<(), Box<dyn Error>> {
        let encoded = serde_json::to_string(values)?;
        self.set_config_value(key, &encoded)
    }

    /// 获取所有 global 配置的快照（JSON 对象）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ImportResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取 JSON 数组配置；缺失时返回默认值，格式错误返回 ConfigReadError
    fn get_config_list(&self, key: &str, default: &[&str]) -> ImportResult<Vec<String>> {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(defaults::strings(default)),
        };

        let values: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| ImportError::ConfigReadError {
                key: key.to_string(),
                message: format!("期望 JSON 字符串数组: {}", e),
            })?;

        if values.is_empty() {
            warn!(key = key, "配置列表为空，使用默认值");
            return Ok(defaults::strings(default));
        }
        Ok(values)
    }
}

// ==========================================
// ImportConfigReader 实现
// ==========================================
impl ImportConfigReader for ConfigManager {
    fn get_spec_dir(&self) -> ImportResult<PathBuf> {
        let value = self.get_config_or_default(config_keys::SPEC_DIR, defaults::SPEC_DIR)?;
        Ok(PathBuf::from(value))
    }

    fn get_spec_extensions(&self) -> ImportResult<Vec<String>> {
        let values = self.get_config_list(config_keys::SPEC_EXTENSIONS, &defaults::SPEC_EXTENSIONS)?;
        Ok(values
            .into_iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .collect())
    }

    fn get_datetime_formats(&self) -> ImportResult<Vec<String>> {
        self.get_config_list(config_keys::DATETIME_FORMATS, &defaults::DATETIME_FORMATS)
    }

    fn get_date_formats(&self) -> ImportResult<Vec<String>> {
        self.get_config_list(config_keys::DATE_FORMATS, &defaults::DATE_FORMATS)
    }

    fn get_normalization_report(&self) -> ImportResult<NormalizationReport> {
        let value = self.get_config_or_default(config_keys::NORMALIZATION_REPORT, "FIRST_ERROR")?;
        value
            .to_uppercase()
            .parse::<NormalizationReport>()
            .map_err(|e| ImportError::ConfigReadError {
                key: config_keys::NORMALIZATION_REPORT.to_string(),
                message: e,
            })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 规范注册表
    pub const SPEC_DIR: &str = "import.spec_dir";
    pub const SPEC_EXTENSIONS: &str = "import.spec_extensions";

    // 行标准化
    pub const DATETIME_FORMATS: &str = "import.datetime_formats";
    pub const DATE_FORMATS: &str = "import.date_formats";
    pub const NORMALIZATION_REPORT: &str = "import.normalization_report";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let conn = open_sqlite_connection(&db_path).unwrap();
        crate::db::init_schema(&conn).unwrap();
        drop(conn);
        let manager = ConfigManager::new(&db_path).unwrap();
        (temp_file, manager)
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let (_tmp, cfg) = manager();

        assert_eq!(cfg.get_spec_dir().unwrap(), PathBuf::from("mappings"));
        assert_eq!(cfg.get_spec_extensions().unwrap(), vec!["yaml", "yml", "json"]);
        assert_eq!(cfg.get_date_formats().unwrap(), vec!["%Y-%m-%d"]);
        assert_eq!(
            cfg.get_normalization_report().unwrap(),
            NormalizationReport::FirstError
        );
    }

    #[test]
    fn test_overrides_are_read() {
        let (_tmp, cfg) = manager();
        cfg.set_config_value(config_keys::SPEC_DIR, "/srv/specs").unwrap();
        cfg.set_config_list(config_keys::SPEC_EXTENSIONS, &[".YAML"]).unwrap();
        cfg.set_config_value(config_keys::NORMALIZATION_REPORT, "all_errors")
            .unwrap();

        assert_eq!(cfg.get_spec_dir().unwrap(), PathBuf::from("/srv/specs"));
        assert_eq!(cfg.get_spec_extensions().unwrap(), vec!["yaml"]);
        assert_eq!(
            cfg.get_normalization_report().unwrap(),
            NormalizationReport::AllErrors
        );
    }

    #[test]
    fn test_malformed_list_is_config_error() {
        let (_tmp, cfg) = manager();
        cfg.set_config_value(config_keys::DATE_FORMATS, "%d.%m.%Y").unwrap();

        assert!(matches!(
            cfg.get_date_formats(),
            Err(ImportError::ConfigReadError { .. })
        ));
    }

    #[test]
    fn test_snapshot_lists_overrides() {
        let (_tmp, cfg) = manager();
        cfg.set_config_value(config_keys::SPEC_DIR, "specs").unwrap();

        let snapshot = cfg.get_config_snapshot().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(parsed["import.spec_dir"], "specs");
    }
}

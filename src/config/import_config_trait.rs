// ==========================================
// FinView 导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::NormalizationReport;
use crate::importer::error::ImportResult;
use std::path::PathBuf;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 规范注册表与行标准化器读取配置
// 实现者: ConfigManager（config_kv 表）, StaticImportConfig（内存）
pub trait ImportConfigReader: Send + Sync {
    /// 获取映射规范目录
    ///
    /// # 默认值
    /// - mappings
    fn get_spec_dir(&self) -> ImportResult<PathBuf>;

    /// 获取可识别的规范文件扩展名（不含 '.'，小写）
    ///
    /// # 默认值
    /// - ["yaml", "yml", "json"]
    fn get_spec_extensions(&self) -> ImportResult<Vec<String>>;

    /// 获取日期时间格式（按顺序尝试）
    ///
    /// # 默认值
    /// - ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
    fn get_datetime_formats(&self) -> ImportResult<Vec<String>>;

    /// 获取纯日期格式（日期时间格式均失败后尝试，时间取 00:00:00）
    ///
    /// # 默认值
    /// - ["%Y-%m-%d"]
    fn get_date_formats(&self) -> ImportResult<Vec<String>>;

    /// 获取行级错误报告策略
    ///
    /// # 默认值
    /// - FIRST_ERROR
    fn get_normalization_report(&self) -> ImportResult<NormalizationReport>;
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const SPEC_DIR: &str = "mappings";
    pub const SPEC_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];
    pub const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    pub const DATE_FORMATS: [&str; 1] = ["%Y-%m-%d"];

    pub fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
}

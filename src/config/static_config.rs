// ==========================================
// FinView 导入引擎 - 内存配置
// ==========================================
// 职责: 不依赖数据库的 ImportConfigReader 实现
// 用途: 测试、命令行未建库时
// ==========================================

use crate::config::import_config_trait::{defaults, ImportConfigReader};
use crate::domain::types::NormalizationReport;
use crate::importer::error::ImportResult;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticImportConfig {
    pub spec_dir: PathBuf,
    pub spec_extensions: Vec<String>,
    pub datetime_formats: Vec<String>,
    pub date_formats: Vec<String>,
    pub normalization_report: NormalizationReport,
}

impl Default for StaticImportConfig {
    fn default() -> Self {
        Self {
            spec_dir: PathBuf::from(defaults::SPEC_DIR),
            spec_extensions: defaults::strings(&defaults::SPEC_EXTENSIONS),
            datetime_formats: defaults::strings(&defaults::DATETIME_FORMATS),
            date_formats: defaults::strings(&defaults::DATE_FORMATS),
            normalization_report: NormalizationReport::default(),
        }
    }
}

impl StaticImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spec_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.spec_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_spec_extensions(mut self, extensions: &[&str]) -> Self {
        self.spec_extensions = defaults::strings(extensions);
        self
    }

    pub fn with_datetime_formats(mut self, formats: &[&str]) -> Self {
        self.datetime_formats = defaults::strings(formats);
        self
    }

    pub fn with_date_formats(mut self, formats: &[&str]) -> Self {
        self.date_formats = defaults::strings(formats);
        self
    }

    pub fn with_normalization_report(mut self, report: NormalizationReport) -> Self {
        self.normalization_report = report;
        self
    }
}

impl ImportConfigReader for StaticImportConfig {
    fn get_spec_dir(&self) -> ImportResult<PathBuf> {
        Ok(self.spec_dir.clone())
    }

    fn get_spec_extensions(&self) -> ImportResult<Vec<String>> {
        Ok(self.spec_extensions.clone())
    }

    fn get_datetime_formats(&self) -> ImportResult<Vec<String>> {
        Ok(self.datetime_formats.clone())
    }

    fn get_date_formats(&self) -> ImportResult<Vec<String>> {
        Ok(self.date_formats.clone())
    }

    fn get_normalization_report(&self) -> ImportResult<NormalizationReport> {
        Ok(self.normalization_report)
    }
}

// ==========================================
// FinView 导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 传播策略:
// - 注册表扫描: 单文件错误被吞掉（宽松）
// - 文件导入: 第一行失败即终止整批并回滚（严格）
// ==========================================

use crate::domain::types::CanonicalField;
use crate::importer::expression::EvalError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    // ===== 映射规范错误 =====
    #[error("映射规范无效 ({source_name}): {message}")]
    SpecInvalid { source_name: String, message: String },

    // ===== 行级错误 =====
    #[error("字段 '{field}' 求值失败: {cause}")]
    ExpressionEval {
        field: CanonicalField,
        #[source]
        cause: EvalError,
    },

    #[error("日期格式错误: 无法解析 '{value}'")]
    DateParse { value: String },

    #[error("金额格式错误 (字段 {field}): 无法解析 '{value}'")]
    AmountParse { field: CanonicalField, value: String },

    #[error("未知币种: '{value}'")]
    UnknownCurrency { value: String },

    /// 行级错误 + 物理行号
    #[error("第 {line} 行导入失败: {source}")]
    RowFailed {
        line: usize,
        #[source]
        source: Box<ImportError>,
    },

    /// 全部字段报错模式下的汇总
    #[error("第 {line} 行存在 {} 处错误: {}", .errors.len(), join_messages(.errors))]
    RowInvalid { line: usize, errors: Vec<ImportError> },

    #[error("导入已取消 (处理到第 {line} 行)")]
    Cancelled { line: usize },

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 持久化错误 =====
    #[error("批次提交失败: {0}")]
    Persistence(String),
}

fn join_messages(errors: &[ImportError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ImportError {
    /// 包装为带行号的行级错误
    pub fn at_line(self, line: usize) -> Self {
        match self {
            // 已带行号的错误不重复包装
            ImportError::RowFailed { .. } | ImportError::RowInvalid { .. } => self,
            other => ImportError::RowFailed {
                line,
                source: Box::new(other),
            },
        }
    }

    /// 最内层错误（去掉行号包装）
    pub fn root_cause(&self) -> &ImportError {
        match self {
            ImportError::RowFailed { source, .. } => source.root_cause(),
            ImportError::RowInvalid { errors, .. } => {
                errors.first().map(|e| e.root_cause()).unwrap_or(self)
            }
            other => other,
        }
    }

    /// 出错的物理行号（若有）
    pub fn line(&self) -> Option<usize> {
        match self {
            ImportError::RowFailed { line, .. }
            | ImportError::RowInvalid { line, .. }
            | ImportError::Cancelled { line } => Some(*line),
            _ => None,
        }
    }

    pub fn spec_invalid(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        ImportError::SpecInvalid {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_wraps_once() {
        let err = ImportError::UnknownCurrency {
            value: "XYZ".to_string(),
        }
        .at_line(3)
        .at_line(9);

        assert_eq!(err.line(), Some(3));
        assert!(matches!(err.root_cause(), ImportError::UnknownCurrency { .. }));
        assert_eq!(err.to_string(), "第 3 行导入失败: 未知币种: 'XYZ'");
    }

    #[test]
    fn test_row_invalid_message_lists_all() {
        let err = ImportError::RowInvalid {
            line: 2,
            errors: vec![
                ImportError::DateParse {
                    value: "x".to_string(),
                },
                ImportError::UnknownCurrency {
                    value: "y".to_string(),
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("第 2 行存在 2 处错误"));
        assert!(msg.contains("'x'"));
        assert!(msg.contains("'y'"));
        assert!(matches!(err.root_cause(), ImportError::DateParse { .. }));
    }
}

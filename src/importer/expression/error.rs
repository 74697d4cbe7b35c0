// ==========================================
// FinView 导入引擎 - 表达式错误类型
// ==========================================

use thiserror::Error;

/// 表达式编译/求值错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    // ===== 编译期 =====
    #[error("语法错误 (位置 {position}): {message}")]
    Syntax { position: usize, message: String },

    #[error("未知标识符: {0}")]
    UnknownIdentifier(String),

    #[error("未知函数: {0}")]
    UnknownFunction(String),

    // ===== 运行期 =====
    #[error("函数 {function} 参数个数错误: 期望 {expected}, 实际 {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("下标越界: 索引 {index}, 长度 {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("类型不匹配: {0}")]
    TypeMismatch(String),

    #[error("除数为零")]
    DivisionByZero,

    #[error("整数溢出")]
    Overflow,

    #[error("无法解析为数字: '{0}'")]
    InvalidNumber(String),

    #[error("函数 {function} 调用失败: {message}")]
    Helper { function: String, message: String },
}

impl EvalError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        EvalError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn mismatch(message: impl Into<String>) -> Self {
        EvalError::TypeMismatch(message.into())
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

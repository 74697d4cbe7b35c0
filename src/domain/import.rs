// ==========================================
// FinView 导入引擎 - 导入结果模型
// ==========================================

use crate::domain::record::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ==========================================
// ImportSummary - 导入汇总统计
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batch_id: String,
    pub total_lines: usize,    // 文件物理行数
    pub skipped_header: usize, // skip_rows 丢弃的行数
    pub ignored_blank: usize,  // 空行/全空白行
    pub imported: usize,       // 产出的标准记录数
    pub committed: bool,       // 是否已提交到持久化层（dry-run 为 false）
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

// ==========================================
// ImportOutcome - 导入结果
// ==========================================
// 零条有效记录不是错误，而是警告
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported {
        summary: ImportSummary,
        records: Vec<CanonicalRecord>,
    },
    NoTransactions {
        summary: ImportSummary,
    },
}

impl ImportOutcome {
    pub fn summary(&self) -> &ImportSummary {
        match self {
            ImportOutcome::Imported { summary, .. } => summary,
            ImportOutcome::NoTransactions { summary } => summary,
        }
    }

    /// (导入条数, 忽略的空行数)
    pub fn counts(&self) -> (usize, usize) {
        let summary = self.summary();
        (summary.imported, summary.ignored_blank)
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        match self {
            ImportOutcome::Imported { records, .. } => records,
            ImportOutcome::NoTransactions { .. } => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ImportOutcome::NoTransactions { .. })
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

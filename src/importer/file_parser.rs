// ==========================================
// FinView 导入引擎 - 分隔文本解析器
// ==========================================
// 阶段: 分词
// 输入: UTF-8 文本（可带 BOM），单字符分隔符
// 输出: 带物理行号的原始行
// ==========================================

use crate::domain::{ParserOptions, RawRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use csv::ReaderBuilder;
use std::path::Path;
use tracing::debug;

/// 分词结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedFile {
    pub total_lines: usize,    // 文件物理行数
    pub skipped_header: usize, // 实际丢弃的前导行数
    pub rows: Vec<RawRow>,     // skip_rows 之后的所有行（含空行）
}

// ==========================================
// DelimitedTextParser 实现
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct DelimitedTextParser;

impl DelimitedTextParser {
    pub fn new() -> Self {
        Self
    }

    /// 按文本内容分词（不访问文件系统）
    pub fn tokenize_str(&self, content: &str, options: &ParserOptions) -> ImportResult<TokenizedFile> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut total_lines = 0;
        let mut rows = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            total_lines += 1;
            if idx < options.skip_rows {
                continue;
            }
            let cells = split_line(line, options.delimiter)?;
            rows.push(RawRow::new(idx + 1, cells));
        }

        Ok(TokenizedFile {
            total_lines,
            skipped_header: total_lines.min(options.skip_rows),
            rows,
        })
    }
}

impl FileParser for DelimitedTextParser {
    fn tokenize(&self, file_path: &Path, options: &ParserOptions) -> ImportResult<TokenizedFile> {
        // 检查文件存在
        if !file_path.is_file() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let bytes = std::fs::read(file_path)?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ImportError::FileReadError(format!(
                "{} 不是有效的 UTF-8 文本: {}",
                file_path.display(),
                e
            ))
        })?;

        let tokenized = self.tokenize_str(&content, options)?;
        debug!(
            file = %file_path.display(),
            total_lines = tokenized.total_lines,
            skipped_header = tokenized.skipped_header,
            "分词完成"
        );
        Ok(tokenized)
    }
}

/// 切分单行
///
/// ASCII 分隔符走 csv 解析（支持双引号包裹的字段），
/// 非 ASCII 分隔符或分隔符本身为双引号时按字面切分。
fn split_line(line: &str, delimiter: char) -> ImportResult<Vec<String>> {
    if line.is_empty() {
        return Ok(Vec::new());
    }

    if !delimiter.is_ascii() || delimiter == '"' {
        return Ok(line.split(delimiter).map(|s| s.to_string()).collect());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // 允许行长度不一致
        .delimiter(delimiter as u8)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|s| s.to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn options(delimiter: char, skip_rows: usize) -> ParserOptions {
        ParserOptions {
            delimiter,
            skip_rows,
        }
    }

    #[test]
    fn test_tokenize_semicolon_with_header_skip() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "header;ignored").unwrap();
        writeln!(temp_file, "Coffee;3,50").unwrap();

        let parsed = DelimitedTextParser::new()
            .tokenize(temp_file.path(), &options(';', 1))
            .unwrap();

        assert_eq!(parsed.total_lines, 2);
        assert_eq!(parsed.skipped_header, 1);
        assert_eq!(
            parsed.rows,
            vec![RawRow::new(
                2,
                vec!["Coffee".to_string(), "3,50".to_string()]
            )]
        );
    }

    #[test]
    fn test_skip_rows_is_unconditional() {
        // 被跳过的行即使是空行也计入 skip_rows
        let parsed = DelimitedTextParser::new()
            .tokenize_str("\n\nA;1\n", &options(';', 2))
            .unwrap();

        assert_eq!(parsed.skipped_header, 2);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].line_number, 3);
    }

    #[test]
    fn test_skip_rows_beyond_file_length() {
        let parsed = DelimitedTextParser::new()
            .tokenize_str("a\nb\n", &options(',', 10))
            .unwrap();

        assert_eq!(parsed.total_lines, 2);
        assert_eq!(parsed.skipped_header, 2);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_blank_lines_are_kept_as_blank_rows() {
        let parsed = DelimitedTextParser::new()
            .tokenize_str("a,b\n\n , \nc,d", &options(',', 0))
            .unwrap();

        let blanks: Vec<bool> = parsed.rows.iter().map(|r| r.is_blank()).collect();
        assert_eq!(blanks, vec![false, true, true, false]);
    }

    #[test]
    fn test_quoted_field_keeps_delimiter() {
        let parsed = DelimitedTextParser::new()
            .tokenize_str("\"Shop; Main St\";12,00", &options(';', 0))
            .unwrap();

        assert_eq!(parsed.rows[0].cells, vec!["Shop; Main St", "12,00"]);
    }

    #[test]
    fn test_bom_and_crlf() {
        let parsed = DelimitedTextParser::new()
            .tokenize_str("\u{feff}a|b\r\nc|d\r\n", &options('|', 0))
            .unwrap();

        assert_eq!(parsed.rows[0].cells, vec!["a", "b"]);
        assert_eq!(parsed.rows[1].cells, vec!["c", "d"]);
    }

    #[test]
    fn test_non_ascii_delimiter() {
        let parsed = DelimitedTextParser::new()
            .tokenize_str("a§b§c", &options('§', 0))
            .unwrap();

        assert_eq!(parsed.rows[0].cells, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_file() {
        let result = DelimitedTextParser::new()
            .tokenize(Path::new("/nonexistent/statement.csv"), &options(';', 0));

        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&[0x66, 0x6f, 0xff, 0x0a]).unwrap();

        let result = DelimitedTextParser::new().tokenize(temp_file.path(), &options(';', 0));

        assert!(matches!(result, Err(ImportError::FileReadError(_))));
    }
}

// ==========================================
// FinView 导入引擎 - 映射规范加载与校验
// ==========================================
// 输入: YAML / JSON 文本
// 输出: 已校验的 MappingSpecification（加载后不可变）
// 规则:
// - 顶层 version/name 为数字时转为文本
// - 任何层级出现未知键即拒绝
// - delimiter 必须恰为一个字符，skip_rows 不得为负
// - 5 个字段表达式在加载时编译，语法/标识符/函数名错误均为 SpecInvalid
// ==========================================

use crate::domain::{CanonicalField, FieldMappings, MappingSpecification, ParserOptions};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::expression::{Expression, HelperRegistry};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;
use tracing::{debug, instrument};

/// 规范文本格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Yaml,
    Json,
}

impl SpecFormat {
    /// 按扩展名判断；非 json 一律按 YAML 处理
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => SpecFormat::Json,
            _ => SpecFormat::Yaml,
        }
    }
}

/// 加载失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// 记录 debug 日志并跳过（注册表扫描）
    Lenient,
    /// 直接返回错误（导入）
    Strict,
}

// ==========================================
// 原始结构（仅用于反序列化）
// ==========================================
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    version: String,
    name: String,
    parser: RawParser,
    mappings: RawMappings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawParser {
    delimiter: String,
    skip_rows: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMappings {
    timestamp: String,
    description: String,
    amount_original: String,
    currency_original: String,
    amount_in_account_currency: String,
}

/// 从文件加载映射规范
///
/// # 返回
/// - Err(SpecInvalid): 文件不存在、不可读、格式错误或校验失败
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_specification(path: &Path) -> ImportResult<MappingSpecification> {
    let source_name = path.display().to_string();

    if !path.is_file() {
        return Err(ImportError::spec_invalid(&source_name, "规范文件不存在"));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| ImportError::spec_invalid(&source_name, format!("读取失败: {}", e)))?;

    let spec = parse_specification(&source_name, &text, SpecFormat::from_path(path))?;
    debug!(name = %spec.name, version = %spec.version, "映射规范加载成功");
    Ok(spec)
}

/// 从文本加载映射规范
pub fn load_specification_str(text: &str, format: SpecFormat) -> ImportResult<MappingSpecification> {
    parse_specification("<inline>", text, format)
}

/// 按策略加载
///
/// # 返回
/// - Ok(Some): 加载成功
/// - Ok(None): 宽松策略下加载失败（已记录 debug 日志）
/// - Err: 严格策略下加载失败
pub fn load_with_policy(
    path: &Path,
    policy: LoadPolicy,
) -> ImportResult<Option<MappingSpecification>> {
    match load_specification(path) {
        Ok(spec) => Ok(Some(spec)),
        Err(e) if policy == LoadPolicy::Lenient => {
            debug!(path = %path.display(), error = %e, "跳过无效的映射规范");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn parse_specification(
    source_name: &str,
    text: &str,
    format: SpecFormat,
) -> ImportResult<MappingSpecification> {
    let invalid = |message: String| ImportError::spec_invalid(source_name, message);

    let mut document: JsonValue = match format {
        SpecFormat::Yaml => serde_yaml::from_str(text)
            .map_err(|e| invalid(format!("YAML 解析失败: {}", e)))?,
        SpecFormat::Json => serde_json::from_str(text)
            .map_err(|e| invalid(format!("JSON 解析失败: {}", e)))?,
    };

    coerce_scalars(&mut document).map_err(invalid)?;

    let raw: RawSpec =
        serde_json::from_value(document).map_err(|e| invalid(format!("结构错误: {}", e)))?;

    validate(source_name, raw)
}

/// 顶层 version/name 的数字转文本；skip_rows 接受纯数字文本
fn coerce_scalars(document: &mut JsonValue) -> Result<(), String> {
    let top = document
        .as_object_mut()
        .ok_or_else(|| "顶层必须是键值映射".to_string())?;

    for key in ["version", "name"] {
        if let Some(value) = top.get_mut(key) {
            if let JsonValue::Number(n) = value {
                *value = JsonValue::String(n.to_string());
            }
        }
    }

    if let Some(JsonValue::Object(parser)) = top.get_mut("parser") {
        if let Some(skip) = parser.get_mut("skip_rows") {
            let parsed = skip.as_str().and_then(|s| s.trim().parse::<i64>().ok());
            if let Some(n) = parsed {
                *skip = JsonValue::from(n);
            }
        }
    }

    Ok(())
}

fn validate(source_name: &str, raw: RawSpec) -> ImportResult<MappingSpecification> {
    let invalid = |message: String| ImportError::spec_invalid(source_name, message);

    // 分隔符: 恰好一个字符，且不能是换行
    let mut chars = raw.parser.delimiter.chars();
    let delimiter = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return Err(invalid(format!(
                "parser.delimiter 必须是单个字符, 实际 {:?}",
                raw.parser.delimiter
            )))
        }
    };
    if delimiter == '\n' || delimiter == '\r' {
        return Err(invalid("parser.delimiter 不能是换行符".to_string()));
    }

    let skip_rows = usize::try_from(raw.parser.skip_rows).map_err(|_| {
        invalid(format!(
            "parser.skip_rows 不能为负数, 实际 {}",
            raw.parser.skip_rows
        ))
    })?;

    let mappings = FieldMappings {
        timestamp: raw.mappings.timestamp,
        description: raw.mappings.description,
        amount_original: raw.mappings.amount_original,
        currency_original: raw.mappings.currency_original,
        amount_in_account_currency: raw.mappings.amount_in_account_currency,
    };

    // 表达式在加载时编译，不留到逐行求值时报错
    let helpers = HelperRegistry::new();
    for (field, source) in mappings.iter() {
        check_expression(field, source, &helpers).map_err(&invalid)?;
    }

    Ok(MappingSpecification {
        version: raw.version,
        name: raw.name,
        parser: ParserOptions {
            delimiter,
            skip_rows,
        },
        mappings,
    })
}

fn check_expression(
    field: CanonicalField,
    source: &str,
    helpers: &HelperRegistry,
) -> Result<(), String> {
    if source.trim().is_empty() {
        return Err(format!("mappings.{} 不能为空", field.key()));
    }
    Expression::compile(source, helpers)
        .map(|_| ())
        .map_err(|e| format!("mappings.{} 表达式无效: {}", field.key(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: 1.0
name: Sample Bank
parser:
  delimiter: ";"
  skip_rows: 1
mappings:
  timestamp: "'2024-01-01'"
  description: "row[0]"
  amount_original: "double(row[1])"
  currency_original: "'EUR'"
  amount_in_account_currency: "double(row[1])"
"#;

    fn message(err: ImportError) -> String {
        match err {
            ImportError::SpecInvalid { message, .. } => message,
            other => panic!("expected SpecInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_load_valid_yaml() {
        let spec = load_specification_str(VALID, SpecFormat::Yaml).unwrap();

        assert_eq!(spec.version, "1.0");
        assert_eq!(spec.name, "Sample Bank");
        assert_eq!(spec.parser.delimiter, ';');
        assert_eq!(spec.parser.skip_rows, 1);
        assert_eq!(spec.mappings.amount_original, "double(row[1])");
    }

    #[test]
    fn test_load_is_idempotent() {
        let a = load_specification_str(VALID, SpecFormat::Yaml).unwrap();
        let b = load_specification_str(VALID, SpecFormat::Yaml).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_numeric_name_coerced() {
        let text = VALID.replace("name: Sample Bank", "name: 2024");
        let spec = load_specification_str(&text, SpecFormat::Yaml).unwrap();
        assert_eq!(spec.name, "2024");
    }

    #[test]
    fn test_missing_mapping_rejected() {
        let text = VALID.replace("  currency_original: \"'EUR'\"\n", "");
        let msg = message(load_specification_str(&text, SpecFormat::Yaml).unwrap_err());
        assert!(msg.contains("currency_original"), "{}", msg);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let top = format!("{}extra: 1\n", VALID);
        assert!(load_specification_str(&top, SpecFormat::Yaml).is_err());

        let nested = VALID.replace("  skip_rows: 1", "  skip_rows: 1\n  quote: '\"'");
        assert!(load_specification_str(&nested, SpecFormat::Yaml).is_err());

        let mapping = VALID.replace(
            "  description: \"row[0]\"",
            "  description: \"row[0]\"\n  category: \"row[2]\"",
        );
        assert!(load_specification_str(&mapping, SpecFormat::Yaml).is_err());
    }

    #[test]
    fn test_delimiter_must_be_single_char() {
        let text = VALID.replace("delimiter: \";\"", "delimiter: \";;\"");
        let msg = message(load_specification_str(&text, SpecFormat::Yaml).unwrap_err());
        assert!(msg.contains("delimiter"));

        let text = VALID.replace("delimiter: \";\"", "delimiter: \"\"");
        assert!(load_specification_str(&text, SpecFormat::Yaml).is_err());
    }

    #[test]
    fn test_negative_skip_rows_rejected() {
        let text = VALID.replace("skip_rows: 1", "skip_rows: -1");
        let msg = message(load_specification_str(&text, SpecFormat::Yaml).unwrap_err());
        assert!(msg.contains("skip_rows"));
    }

    #[test]
    fn test_non_string_mapping_rejected() {
        let text = VALID.replace("description: \"row[0]\"", "description: 5");
        assert!(load_specification_str(&text, SpecFormat::Yaml).is_err());
    }

    #[test]
    fn test_bad_expression_rejected_at_load() {
        let text = VALID.replace("double(row[1])\"\n  currency", "double(row[1]\"\n  currency");
        let msg = message(load_specification_str(&text, SpecFormat::Yaml).unwrap_err());
        assert!(msg.contains("amount_original"), "{}", msg);

        let text = VALID.replace("row[0]", "exec(row[0])");
        let msg = message(load_specification_str(&text, SpecFormat::Yaml).unwrap_err());
        assert!(msg.contains("exec"), "{}", msg);
    }

    #[test]
    fn test_json_format() {
        let json = r#"{
            "version": "2",
            "name": "Json Bank",
            "parser": {"delimiter": ",", "skip_rows": 0},
            "mappings": {
                "timestamp": "row[0]",
                "description": "row[1]",
                "amount_original": "double(row[2])",
                "currency_original": "row[3]",
                "amount_in_account_currency": "double(row[2])"
            }
        }"#;
        let spec = load_specification_str(json, SpecFormat::Json).unwrap();
        assert_eq!(spec.parser.delimiter, ',');
    }

    #[test]
    fn test_top_level_must_be_mapping() {
        assert!(load_specification_str("- a\n- b\n", SpecFormat::Yaml).is_err());
        assert!(load_specification_str("", SpecFormat::Yaml).is_err());
    }

    #[test]
    fn test_missing_file_policies() {
        let path = Path::new("/nonexistent/spec.yaml");
        assert!(matches!(
            load_specification(path),
            Err(ImportError::SpecInvalid { .. })
        ));
        assert_eq!(load_with_policy(path, LoadPolicy::Lenient).unwrap(), None);
        assert!(load_with_policy(path, LoadPolicy::Strict).is_err());
    }
}

// ==========================================
// FinView 导入引擎 - 映射规范注册表
// ==========================================
// 职责: 递归扫描规范目录，列出可用规范
// 策略: 宽松；单个文件加载失败只记录 debug 日志并跳过
// 输出: 首项固定为“手工录入”哨兵，其余按相对路径排序
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{MappingSpecification, SpecificationEntry};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::spec_loader::{load_specification, load_with_policy, LoadPolicy};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub struct SpecRegistry {
    spec_dir: PathBuf,
    extensions: Vec<String>,
}

impl SpecRegistry {
    /// # 参数
    /// - spec_dir: 规范根目录
    /// - extensions: 可识别扩展名（不含 '.'，大小写不敏感）
    pub fn new(spec_dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            spec_dir: spec_dir.into(),
            extensions,
        }
    }

    pub fn from_config(config: &dyn ImportConfigReader) -> ImportResult<Self> {
        Ok(Self::new(config.get_spec_dir()?, config.get_spec_extensions()?))
    }

    pub fn spec_dir(&self) -> &Path {
        &self.spec_dir
    }

    /// 列出可用规范
    ///
    /// # 返回
    /// - 首项为哨兵 ("No mapping (manual entry)", "")
    /// - 其后为 ("{name} ({相对路径})", 相对路径)，按相对路径排序
    pub fn list_available(&self) -> Vec<SpecificationEntry> {
        let mut entries = vec![SpecificationEntry::manual_entry()];

        if !self.spec_dir.is_dir() {
            warn!(dir = %self.spec_dir.display(), "规范目录不存在");
            return entries;
        }

        let mut candidates: Vec<(String, PathBuf)> = WalkDir::new(&self.spec_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.is_recognized(p))
            .filter_map(|p| relative_reference(&self.spec_dir, &p).map(|rel| (rel, p)))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        let scanned = candidates.len();
        for (reference, path) in candidates {
            // 宽松策略下只会得到 Ok
            if let Ok(Some(spec)) = load_with_policy(&path, LoadPolicy::Lenient) {
                entries.push(SpecificationEntry {
                    label: format!("{} ({})", spec.name, reference),
                    reference,
                });
            }
        }

        info!(
            dir = %self.spec_dir.display(),
            scanned = scanned,
            valid = entries.len() - 1,
            "规范目录扫描完成"
        );
        entries
    }

    /// 相对路径 → 绝对路径；拒绝空引用与逃逸出规范目录的路径
    pub fn resolve(&self, reference: &str) -> ImportResult<PathBuf> {
        let rel = Path::new(reference);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.trim().is_empty() || escapes {
            return Err(ImportError::spec_invalid(reference, "无效的规范引用"));
        }
        Ok(self.spec_dir.join(rel))
    }

    /// 严格加载（导入时使用）
    pub fn load(&self, reference: &str) -> ImportResult<MappingSpecification> {
        let path = self.resolve(reference)?;
        load_specification(&path)
    }

    fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// 生成 '/' 分隔的相对路径
fn relative_reference(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

//! Source-tree enumeration and fast header reading for Kotlin/Java files.
//!
//! `scan_source_files` provides the denominator for every percentage-based
//! tolerance; `read_header` extracts the package, imports, and top-level
//! declarations without full parsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{GateError, Result};

/// Source sets considered when sizing a module.
pub const SOURCE_SETS: &[&str] = &["main", "debug", "release", "test", "androidTest"];

/// Header scanning stops after this many lines; files are read fully only
/// by audits that need the whole text.
const HEADER_SCAN_LINES: usize = 400;

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^package\s+([A-Za-z_][\w.]*)\s*;?\s*$").unwrap());

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^import\s+(?:static\s+)?([A-Za-z_][\w.]*(?:\.\*)?)\s*(?:;|\s+as\s+\w+\s*)?$")
        .unwrap()
});

// Top-level only: declarations must start at column zero. Java modifiers and
// Kotlin visibility/shape modifiers are tolerated before the keyword.
static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:public|private|protected|internal|abstract|final|open|sealed|data|inner|annotation|value|static|strictfp)\s+)*(?:enum\s+class|class|interface|object|enum)\s+([A-Za-z_]\w*)",
    )
    .unwrap()
});

/// Count `.kt`/`.java` files under the conventional source sets. Returns at
/// least 1 so tolerance math never divides by zero.
pub fn scan_source_files(module_dir: &Path) -> usize {
    let mut count = 0;
    for set in SOURCE_SETS {
        let root = module_dir.join("src").join(set);
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && is_source_file(entry.path()) {
                count += 1;
            }
        }
    }
    count.max(1)
}

/// List `.kt`/`.java` files under a directory, sorted for deterministic
/// finding order. Missing directories yield an empty list.
pub fn list_source_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

pub fn is_source_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("kt" | "java")
    )
}

/// Path relative to the module dir in forward-slash form; paths outside the
/// module are returned as supplied.
pub fn module_relative(module_dir: &Path, path: &Path) -> String {
    match path.strip_prefix(module_dir) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

/// An `import` line with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub fqcn: String,
    pub line: usize,
}

/// A top-level `class`/`interface`/`object`/`enum` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub line: usize,
}

/// The parsed header of one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceHeader {
    pub package: Option<String>,
    pub package_line: Option<usize>,
    pub imports: Vec<Import>,
    pub declarations: Vec<Declaration>,
}

/// Line-based header extraction, bounded by [`HEADER_SCAN_LINES`].
pub fn read_header(path: &Path) -> Result<SourceHeader> {
    let content = fs::read_to_string(path).map_err(|e| GateError::io(path, e))?;
    Ok(parse_header(&content))
}

/// Header extraction over already-loaded content.
pub fn parse_header(content: &str) -> SourceHeader {
    let mut header = SourceHeader::default();
    for (idx, line) in content.lines().take(HEADER_SCAN_LINES).enumerate() {
        let number = idx + 1;
        if header.package.is_none() {
            if let Some(caps) = PACKAGE_RE.captures(line) {
                header.package = Some(caps[1].to_string());
                header.package_line = Some(number);
                continue;
            }
        }
        if let Some(caps) = IMPORT_RE.captures(line) {
            header.imports.push(Import {
                fqcn: caps[1].to_string(),
                line: number,
            });
            continue;
        }
        if let Some(caps) = DECLARATION_RE.captures(line) {
            header.declarations.push(Declaration {
                name: caps[1].to_string(),
                line: number,
            });
        }
    }
    header
}

//! Solution and project file discovery.
//!
//! Recursively walks directories to collect `.sln` and `.vcxproj` files,
//! pruning entries that match an exclude pattern. Also owns the path model
//! shared by the rest of the crate: absolute, lexically normalised paths,
//! compared case-insensitively.

use crate::cancel::CancelToken;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const SOLUTION_EXTENSION: &str = "sln";
pub const PROJECT_EXTENSION: &str = "vcxproj";

/// How discovery filters the tree.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Patterns matched against each entry's path relative to `base_dir`.
    pub exclude: Vec<Regex>,
    /// Skip entries whose name starts with `.` (`.git`, `.vs`, ...).
    pub default_excludes: bool,
    pub base_dir: PathBuf,
}

/// Files found by a scan, in discovery order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveredFiles {
    pub solutions: Vec<PathBuf>,
    pub projects: Vec<PathBuf>,
}

impl DiscoveredFiles {
    pub fn len(&self) -> usize {
        self.solutions.len() + self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compiles exclude patterns, naming the offending pattern on failure.
pub fn compile_excludes(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("Invalid exclude pattern '{}'", p)))
        .collect()
}

/// Collects solution and project files under `roots`.
///
/// Each file is yielded once even when roots overlap. Unreadable entries are
/// logged and skipped.
pub fn collect_files(
    roots: &[PathBuf],
    options: &ScanOptions,
    cancel: &CancelToken,
) -> Result<DiscoveredFiles> {
    let mut files = DiscoveredFiles::default();
    let mut seen = HashSet::new();

    for root in roots {
        let root = absolute(root)?;
        if !root.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }

        for entry in WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_excluded(e.path(), options))
        {
            cancel.check()?;
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !seen.insert(path_key(entry.path())) {
                continue;
            }

            let path = normalize(entry.path());
            if has_extension(&path, SOLUTION_EXTENSION) {
                debug!(path = %path.display(), "found solution");
                files.solutions.push(path);
            } else if has_extension(&path, PROJECT_EXTENSION) {
                debug!(path = %path.display(), "found project");
                files.projects.push(path);
            }
        }
    }

    Ok(files)
}

fn is_excluded(path: &Path, options: &ScanOptions) -> bool {
    if options.default_excludes
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'))
    {
        return true;
    }
    if options.exclude.is_empty() {
        return false;
    }
    let relative = display_path(path, &options.base_dir);
    options.exclude.iter().any(|re| re.is_match(&relative))
}

/// Makes `path` absolute against the current directory and normalises it.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Ok(normalize(&path))
}

/// Folds `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(result.components().next_back(), Some(Component::Normal(_))) {
                    result.pop();
                } else if !result.has_root() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Resolves a path written inside a solution or project file against `dir`.
///
/// Both `\` and `/` are accepted as separators.
pub fn resolve(dir: &Path, written: &str) -> PathBuf {
    normalize(&dir.join(native_separators(written.trim())))
}

fn native_separators(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '\\' {
        path.to_string()
    } else {
        path.replace('\\', "/")
    }
}

/// Case-insensitive identity of a file path.
pub fn path_key(path: &Path) -> String {
    normalize(path).to_string_lossy().to_lowercase()
}

/// `path` relative to `base`, `/`-separated; the full path if outside `base`.
pub fn display_path(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let text = relative.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '\\' {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    }
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

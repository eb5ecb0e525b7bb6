//! Applies the fixes attached to defects.
//!
//! Fixes are grouped by file. Each file is read once, every edit is checked
//! against what the file holds now, and the accepted edits are written back in
//! a single pass. A failing fix is recorded on its defect and the rest carry on.

use crate::defect::{Defect, DefectCatalog};
use crate::rewriter::{EditCheck, TextEdit, apply_edits};
use crate::scanner::path_key;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FixError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} changed since it was inspected", .0.display())]
    Stale(PathBuf),
    #[error("edit overlaps another fix in {}", .0.display())]
    Overlap(PathBuf),
}

/// Counts from one fix pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixOutcome {
    pub attempted: usize,
    pub fixed: usize,
    pub failed: usize,
    pub files_written: usize,
}

/// Applies every pending fix.
pub fn apply_all(defects: &mut DefectCatalog) -> FixOutcome {
    apply_confirmed(defects, |_, _| true)
}

/// Like [`apply_all`], asking `confirm` once per file before touching it.
///
/// Fixes in a declined file are not attempted and stay `Found`. Defects that
/// are already `Fixed` or `FailedToFix` are never attempted again.
pub fn apply_confirmed(
    defects: &mut DefectCatalog,
    mut confirm: impl FnMut(&Path, &[&Defect]) -> bool,
) -> FixOutcome {
    let groups = group_by_file(defects);
    let pending: usize = groups.iter().map(|(_, indices)| indices.len()).sum();
    info!(fixes = pending, files = groups.len(), "applying fixes");

    let mut outcome = FixOutcome::default();
    for (file, indices) in groups {
        let accepted = {
            let all = defects.as_slice();
            let group: Vec<&Defect> = indices.iter().map(|&index| &all[index]).collect();
            confirm(&file, &group)
        };
        if !accepted {
            debug!(file = %file.display(), "fixes declined");
            continue;
        }
        outcome.attempted += indices.len();
        apply_file(&file, &indices, defects.as_mut_slice(), &mut outcome);
    }

    info!(
        fixed = outcome.fixed,
        failed = outcome.failed,
        files = outcome.files_written,
        "fixes applied"
    );
    outcome
}

/// Indices of fixable defects, grouped by target file in first-seen order.
fn group_by_file(defects: &DefectCatalog) -> Vec<(PathBuf, Vec<usize>)> {
    let mut groups: Vec<(PathBuf, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (index, defect) in defects.iter().enumerate() {
        let Some(fix) = defect.fix().filter(|_| defect.is_fixable()) else {
            continue;
        };
        let position = *positions.entry(path_key(fix.file())).or_insert_with(|| {
            groups.push((fix.file().to_path_buf(), Vec::new()));
            groups.len() - 1
        });
        groups[position].1.push(index);
    }
    groups
}

fn apply_file(file: &Path, indices: &[usize], defects: &mut [Defect], outcome: &mut FixOutcome) {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(source) => {
            let error = FixError::Read {
                path: file.to_path_buf(),
                source,
            };
            for &index in indices {
                fail(&mut defects[index], &error, outcome);
            }
            return;
        }
    };

    let mut staged: Vec<(usize, TextEdit)> = Vec::new();
    for &index in indices {
        let Some(edit) = defects[index].fix().map(|fix| fix.edit().clone()) else {
            continue;
        };
        match edit.check(&content) {
            EditCheck::Stale => fail(&mut defects[index], &FixError::Stale(file.to_path_buf()), outcome),
            EditCheck::AlreadyApplied => {
                defects[index].mark_fixed();
                outcome.fixed += 1;
            }
            EditCheck::Applicable if staged.iter().any(|(_, other)| other.overlaps(&edit)) => {
                fail(&mut defects[index], &FixError::Overlap(file.to_path_buf()), outcome)
            }
            EditCheck::Applicable => staged.push((index, edit)),
        }
    }
    if staged.is_empty() {
        return;
    }

    let edits: Vec<TextEdit> = staged.iter().map(|(_, edit)| edit.clone()).collect();
    let updated = apply_edits(&content, &edits);
    match std::fs::write(file, updated) {
        Ok(()) => {
            debug!(file = %file.display(), edits = staged.len(), "file updated");
            outcome.files_written += 1;
            for (index, _) in staged {
                defects[index].mark_fixed();
                outcome.fixed += 1;
            }
        }
        Err(source) => {
            let error = FixError::Write {
                path: file.to_path_buf(),
                source,
            };
            for (index, _) in staged {
                fail(&mut defects[index], &error, outcome);
            }
        }
    }
}

fn fail(defect: &mut Defect, error: &FixError, outcome: &mut FixOutcome) {
    warn!(code = defect.code(), file = defect.filename(), %error, "fix failed");
    defect.mark_failed(error.to_string());
    outcome.failed += 1;
}

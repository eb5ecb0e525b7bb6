//! Visual Studio solution (`.sln`) reader.
//!
//! Only the project table is read: each `Project(...) = ...` line up to its
//! `EndProject`. Global sections (configurations, nesting) are ignored.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

const HEADER: &str = "Microsoft Visual Studio Solution File, Format Version";

const SOLUTION_FOLDER_TYPE: &str = "2150E333-8FDC-42A3-9474-1A3956D46DE8";
const WEB_PROJECT_TYPE: &str = "E24C65DC-7377-472B-9ABA-BC803B73C61A";

static PROJECT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^Project\("(?P<type>[^"]*)"\)\s*=\s*"(?P<name>[^"]*)"\s*,\s*"(?P<path>[^"]*)"\s*,\s*"(?P<guid>[^"]*)"\s*$"#,
    )
    .expect("project line pattern is valid")
});

/// How the solution classifies a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProjectType {
    SolutionFolder,
    WebProject,
    /// A project file MSBuild can load directly.
    MsBuild,
    Unknown,
}

/// One entry of a solution's project table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolutionMember {
    pub name: String,
    /// Path as written in the solution, relative to the solution directory.
    pub path: String,
    /// Project GUID text as written; parsed by the graph builder.
    pub guid: String,
    pub project_type: ProjectType,
    pub line: usize,
}

/// Reads a solution file into its project table.
pub trait SolutionReader {
    fn read(&self, path: &Path) -> Result<Vec<SolutionMember>>;
}

/// Reads `.sln` files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlnReader;

impl SolutionReader for SlnReader {
    fn read(&self, path: &Path) -> Result<Vec<SolutionMember>> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_solution(&source)
    }
}

/// Parses solution text.
///
/// Fails when the format header is missing, a project line is malformed, or
/// a project block is not closed by `EndProject`.
pub fn parse_solution(source: &str) -> Result<Vec<SolutionMember>> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = source
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()));

    match lines.by_ref().find(|(_, line)| !line.is_empty()) {
        Some((_, line)) if line.starts_with(HEADER) => {}
        _ => anyhow::bail!("No file format header found"),
    }

    let mut members = Vec::new();
    let mut open_block: Option<usize> = None;

    for (line_no, line) in lines {
        if line.starts_with("Project(") {
            if let Some(start) = open_block {
                anyhow::bail!("Project at line {} is not terminated by EndProject", start);
            }
            let caps = PROJECT_LINE
                .captures(line)
                .with_context(|| format!("Malformed project entry at line {}", line_no))?;
            let path = caps["path"].to_string();
            members.push(SolutionMember {
                name: caps["name"].to_string(),
                project_type: classify(&caps["type"], &path),
                path,
                guid: caps["guid"].to_string(),
                line: line_no,
            });
            open_block = Some(line_no);
        } else if line == "EndProject" {
            if open_block.take().is_none() {
                anyhow::bail!("Unexpected EndProject at line {}", line_no);
            }
        }
    }

    if let Some(start) = open_block {
        anyhow::bail!("Project at line {} is not terminated by EndProject", start);
    }

    Ok(members)
}

fn classify(type_guid: &str, path: &str) -> ProjectType {
    let type_guid = type_guid.trim_matches(|c| c == '{' || c == '}');
    if type_guid.eq_ignore_ascii_case(SOLUTION_FOLDER_TYPE) {
        ProjectType::SolutionFolder
    } else if type_guid.eq_ignore_ascii_case(WEB_PROJECT_TYPE) {
        ProjectType::WebProject
    } else if path.to_ascii_lowercase().ends_with("proj") {
        ProjectType::MsBuild
    } else {
        ProjectType::Unknown
    }
}

//! Rendering of inspection results.
//!
//! Console output is coloured per severity; JSON carries the summary and the
//! defect list; CSV export writes one table per file into a directory.

use crate::defect::{Defect, DefectState, Severity};
use crate::fix::FixOutcome;
use crate::graph::LinkKind;
use crate::runner::{InspectionReport, Summary};
use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes one line per defect followed by the summary.
pub fn write_console(out: &mut impl Write, report: &InspectionReport, verbose: bool) -> std::io::Result<()> {
    for defect in report.defects.iter() {
        writeln!(out, "{}", render_defect(defect))?;
        if verbose && !defect.fix_error().is_empty() {
            writeln!(out, "    {} {}", "fix failed:".red(), defect.fix_error().dimmed())?;
        }
    }
    if !report.defects.is_empty() {
        writeln!(out)?;
    }
    write_summary(out, &report.summary)?;
    if let Some(outcome) = &report.fix {
        write_fix_outcome(out, outcome)?;
    }
    Ok(())
}

fn render_defect(defect: &Defect) -> String {
    let mut line = format!(
        "{}{}: {}",
        defect.location(),
        paint(defect.severity(), defect.tag()),
        defect.description()
    );
    match defect.state() {
        DefectState::Found => {}
        DefectState::Fixed => line.push_str(&format!(" {}", "[fixed]".green())),
        DefectState::FailedToFix => line.push_str(&format!(" {}", "[fix failed]".red())),
    }
    line
}

fn paint(severity: Severity, text: String) -> ColoredString {
    match severity {
        Severity::Warning => text.yellow().bold(),
        Severity::Error => text.red().bold(),
        Severity::Internal => text.magenta().bold(),
    }
}

fn write_summary(out: &mut impl Write, summary: &Summary) -> std::io::Result<()> {
    writeln!(
        out,
        "{} {} files scanned, {}/{} solutions and {}/{} projects opened",
        "Summary:".bold(),
        summary.files_scanned,
        summary.valid_solutions,
        summary.solutions,
        summary.valid_projects,
        summary.projects
    )?;
    if summary.errors + summary.warnings + summary.internal_errors == 0 {
        return writeln!(out, "{} No defects found", "ok:".green().bold());
    }
    writeln!(
        out,
        "         {} errors, {} warnings, {} internal errors",
        summary.errors, summary.warnings, summary.internal_errors
    )
}

fn write_fix_outcome(out: &mut impl Write, outcome: &FixOutcome) -> std::io::Result<()> {
    if outcome.attempted == 0 {
        return writeln!(out, "{} No fixes to apply", "info:".blue().bold());
    }
    writeln!(
        out,
        "{} {} of {} fixes applied across {} files, {} failed",
        "Fixes:".bold(),
        outcome.fixed,
        outcome.attempted,
        outcome.files_written,
        outcome.failed
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix: Option<&'a FixOutcome>,
    defects: &'a [Defect],
}

/// Pretty-printed JSON of the summary, fix outcome and defects.
pub fn to_json(report: &InspectionReport) -> Result<String> {
    let json = JsonReport {
        summary: &report.summary,
        fix: report.fix.as_ref(),
        defects: report.defects.as_slice(),
    };
    serde_json::to_string_pretty(&json).context("Failed to serialize report")
}

/// Writes the defect and graph tables as CSV files into `dir`.
///
/// Returns the paths written.
pub fn write_csv(dir: &Path, report: &InspectionReport) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let graph = &report.graph;
    let mut tables: Vec<(&str, Vec<&str>, Vec<Vec<String>>)> = Vec::new();

    tables.push((
        "Defect.csv",
        vec!["Code", "Filename", "Line", "Severity", "Description", "State", "FixError"],
        report
            .defects
            .iter()
            .map(|d| {
                vec![
                    d.code().to_string(),
                    d.filename().to_string(),
                    d.line().to_string(),
                    format!("{:?}", d.severity()),
                    d.description().to_string(),
                    format!("{:?}", d.state()),
                    d.fix_error().to_string(),
                ]
            })
            .collect(),
    ));

    tables.push((
        "Solution.csv",
        vec!["Filename"],
        graph
            .solutions()
            .filter(|(_, entity, _)| entity.is_valid())
            .map(|(_, entity, _)| vec![entity.display_path.clone()])
            .collect(),
    ));

    tables.push((
        "Project.csv",
        vec!["Filename", "Id"],
        graph
            .native_projects()
            .map(|(_, entity, project, _)| {
                vec![
                    entity.display_path.clone(),
                    project.id.map(|id| id.to_string()).unwrap_or_default(),
                ]
            })
            .collect(),
    ));

    tables.push((
        "ProjectRef.csv",
        vec!["Source", "SourceType", "Target", "Line"],
        graph
            .links()
            .filter(|link| link.kind() == LinkKind::Reference)
            .map(|link| {
                let source = graph.entity(link.from);
                vec![
                    source.display_path.clone(),
                    source.type_name().to_string(),
                    graph.entity(link.to).display_path.clone(),
                    link.line().to_string(),
                ]
            })
            .collect(),
    ));

    tables.push((
        "Property.csv",
        vec!["Project", "Name", "Label", "Line", "Condition", "Value"],
        graph
            .native_projects()
            .flat_map(|(_, entity, _, tree)| {
                tree.properties.iter().map(move |property| {
                    vec![
                        entity.display_path.clone(),
                        property.name.clone(),
                        property.group_label.clone().unwrap_or_default(),
                        property.line.to_string(),
                        property.group_condition.clone().unwrap_or_default(),
                        property.value.clone(),
                    ]
                })
            })
            .collect(),
    ));

    tables.push((
        "Import.csv",
        vec!["Project", "Imports", "Label", "Line"],
        graph
            .links()
            .filter_map(|link| link.as_import().map(|import| (link, import)))
            .map(|(link, import)| {
                vec![
                    graph.entity(link.from).display_path.clone(),
                    graph.entity(link.to).display_path.clone(),
                    import.label.clone(),
                    import.line.to_string(),
                ]
            })
            .collect(),
    ));

    let mut written = Vec::new();
    for (name, headers, rows) in tables {
        let path = dir.join(name);
        write_table(&path, &headers, &rows)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn write_table(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::defect::DefectKind;
    use crate::runner::{Inspector, InspectorOptions};
    use crate::testutil::{Tree, sln, vcxproj};

    const X: &str = "{11111111-1111-1111-1111-111111111111}";
    const Y: &str = "{22222222-2222-2222-2222-222222222222}";

    fn inspect(tree: &Tree) -> InspectionReport {
        Inspector::new(InspectorOptions {
            roots: vec![tree.root().to_path_buf()],
            follow_imports: true,
            ..InspectorOptions::default()
        })
        .run(&CancelToken::new())
        .unwrap()
    }

    fn sample() -> Tree {
        let tree = Tree::new();
        let app = vcxproj(Some(X), &[("..\\Lib\\Lib.vcxproj", Some(X))]);
        let app = format!(
            "{}  <Import Project=\"..\\common.props\" Label=\"Shared\" />\n</Project>\n",
            app.strip_suffix("</Project>\n").unwrap()
        );
        tree.write("App/App.vcxproj", &app);
        tree.write("Lib/Lib.vcxproj", &vcxproj(Some(Y), &[]));
        tree.write("common.props", "<Project />\n");
        tree.write("All.sln", &sln(&[("App", "App\\App.vcxproj", X)]));
        tree
    }

    fn plain(report: &InspectionReport, verbose: bool) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        write_console(&mut out, report, verbose).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn console_lists_defects_then_summary() {
        let tree = sample();
        insta::assert_snapshot!(plain(&inspect(&tree), false), @r"
        App/App.vcxproj(8): error B2: GUID {11111111-1111-1111-1111-111111111111} in the reference doesn't match GUID {22222222-2222-2222-2222-222222222222} of project Lib/Lib.vcxproj
        Lib/Lib.vcxproj: warning B11: Project has no project references
        All.sln: error B10: Project Lib/Lib.vcxproj is referenced by App/App.vcxproj but is not part of the solution

        Summary: 3 files scanned, 1/1 solutions and 2/2 projects opened
                 2 errors, 1 warnings, 0 internal errors
        ");
    }

    #[test]
    fn console_line_is_the_plain_defect_text() {
        colored::control::set_override(false);
        let tree = sample();
        let mut defects: Vec<Defect> = inspect(&tree).defects.iter().cloned().collect();
        defects.push(Defect::new(DefectKind::AnalyzerNotFound, "", 0, "Unknown analyzer 'x'"));

        for defect in &defects {
            assert_eq!(render_defect(defect), defect.to_string());
        }
        assert_eq!(render_defect(&defects[3]), "internal error A1: Unknown analyzer 'x'");
    }

    #[test]
    fn clean_console_report() {
        let tree = Tree::new();
        tree.write("All.sln", &sln(&[]));
        insta::assert_snapshot!(plain(&inspect(&tree), false), @r"
        Summary: 1 files scanned, 1/1 solutions and 0/0 projects opened
        ok: No defects found
        ");
    }

    #[test]
    fn json_carries_summary_and_defects() {
        let tree = sample();
        let json: serde_json::Value = serde_json::from_str(&to_json(&inspect(&tree)).unwrap()).unwrap();

        assert_eq!(json["summary"]["errors"], 2);
        assert!(json.get("fix").is_none());
        let first = &json["defects"][0];
        assert_eq!(first["code"], "B2");
        assert_eq!(first["severity"], "error");
        assert_eq!(first["state"], "Found");
        assert_eq!(first["line"], 8);
        assert!(first.get("fix").is_none());
    }

    #[test]
    fn csv_tables_describe_graph() {
        let tree = sample();
        let report = inspect(&tree);
        let out = tree.path("reports");
        let written = write_csv(&out, &report).unwrap();
        assert_eq!(written.len(), 6);

        let read = |name: &str| std::fs::read_to_string(out.join(name)).unwrap();
        assert_eq!(
            read("Project.csv"),
            format!("Filename,Id\nApp/App.vcxproj,{}\nLib/Lib.vcxproj,{}\n", X, Y)
        );
        assert_eq!(
            read("ProjectRef.csv"),
            "Source,SourceType,Target,Line\nAll.sln,Solution,App/App.vcxproj,3\nApp/App.vcxproj,Project,Lib/Lib.vcxproj,8\n"
        );
        assert_eq!(read("Import.csv"), "Project,Imports,Label,Line\nApp/App.vcxproj,common.props,Shared,11\n");
        assert_eq!(read("Solution.csv"), "Filename\nAll.sln\n");
        assert!(read("Defect.csv").starts_with("Code,Filename,Line,Severity,Description,State,FixError\nB2,App/App.vcxproj,8,Error,"));
        assert!(read("Property.csv").contains("App/App.vcxproj,ProjectGuid,Globals,4,,"));
    }
}

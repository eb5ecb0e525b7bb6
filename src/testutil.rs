//! Scratch source trees for unit tests.

use crate::builder::GraphBuilder;
use crate::cancel::CancelToken;
use crate::defect::DefectCatalog;
use crate::graph::ReferenceGraph;
use crate::scanner::{DiscoveredFiles, ScanOptions, absolute, collect_files};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Visual C++ project type GUID, as written in solution files.
const CPP_PROJECT_TYPE: &str = "{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}";

pub struct Tree {
    dir: TempDir,
    root: PathBuf,
}

impl Tree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = absolute(dir.path()).unwrap();
        Self { dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative` inside the tree.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn files(&self) -> DiscoveredFiles {
        let options = ScanOptions {
            exclude: Vec::new(),
            default_excludes: true,
            base_dir: self.root.clone(),
        };
        collect_files(&[self.dir.path().to_path_buf()], &options, &CancelToken::new()).unwrap()
    }

    pub fn build(&self) -> (ReferenceGraph, DefectCatalog) {
        self.build_with(|builder| builder)
    }

    pub fn build_with(
        &self,
        configure: impl FnOnce(GraphBuilder) -> GraphBuilder,
    ) -> (ReferenceGraph, DefectCatalog) {
        let mut defects = DefectCatalog::new();
        let builder = configure(GraphBuilder::new(&self.root));
        let graph = builder
            .build(&self.files(), &mut defects, &CancelToken::new())
            .unwrap();
        (graph, defects)
    }
}

/// Solution text listing C++ projects as `(name, path, guid)`.
///
/// The header takes two lines; member `n` (from 0) starts at line `3 + 2n`.
pub fn sln(members: &[(&str, &str, &str)]) -> String {
    let mut text = String::from(
        "Microsoft Visual Studio Solution File, Format Version 12.00\n# Visual Studio Version 17\n",
    );
    for (name, path, guid) in members {
        writeln!(
            text,
            "Project(\"{}\") = \"{}\", \"{}\", \"{}\"\nEndProject",
            CPP_PROJECT_TYPE, name, path, guid
        )
        .unwrap();
    }
    text.push_str("Global\nEndGlobal\n");
    text
}

/// Project text with an optional `ProjectGuid` (line 4) and `ProjectReference`
/// items as `(include, recorded guid)`. An empty recorded guid writes `<Project />`.
pub fn vcxproj(guid: Option<&str>, references: &[(&str, Option<&str>)]) -> String {
    let mut text = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <Project DefaultTargets=\"Build\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">\n  \
         <PropertyGroup Label=\"Globals\">\n",
    );
    if let Some(guid) = guid {
        writeln!(text, "    <ProjectGuid>{}</ProjectGuid>", guid).unwrap();
    }
    text.push_str("  </PropertyGroup>\n  <ItemGroup>\n");
    for (include, recorded) in references {
        match recorded {
            Some("") => writeln!(
                text,
                "    <ProjectReference Include=\"{}\">\n      <Project />\n    </ProjectReference>",
                include
            ),
            Some(id) => writeln!(
                text,
                "    <ProjectReference Include=\"{}\">\n      <Project>{}</Project>\n    </ProjectReference>",
                include, id
            ),
            None => writeln!(text, "    <ProjectReference Include=\"{}\" />", include),
        }
        .unwrap();
    }
    text.push_str("  </ItemGroup>\n</Project>\n");
    text
}

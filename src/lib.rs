//! vcxproj-inspect library for checking Visual C++ solutions and projects.
//!
//! This library provides programmatic access to the inspection. The core
//! workflow has four phases:
//!
//! 1. **Scanning**: Collect `.sln` and `.vcxproj` files under the given roots
//! 2. **Building**: Parse them into a reference graph of solutions, projects
//!    and the references between them
//! 3. **Analysis**: Run independent analyzers over the graph, collecting defects
//! 4. **Fixing**: Optionally apply the fixes attached to defects
//!
//! # Example
//!
//! ```no_run
//! use vcxproj_inspect::{CancelToken, Inspector, InspectorOptions};
//! use std::path::PathBuf;
//!
//! let options = InspectorOptions {
//!     roots: vec![PathBuf::from("./src")],
//!     follow_imports: true,
//!     ..InspectorOptions::default()
//! };
//! let report = Inspector::new(options).run(&CancelToken::new()).unwrap();
//!
//! for defect in report.defects.iter() {
//!     println!("{}", defect);
//! }
//! println!("{} errors", report.summary.errors);
//! ```

pub mod analyzer;
pub mod builder;
pub mod cancel;
pub mod defect;
pub mod fix;
pub mod graph;
pub mod guid;
pub mod project;
pub mod report;
pub mod rewriter;
pub mod runner;
pub mod scanner;
pub mod solution;

#[cfg(test)]
mod testutil;

// Re-export commonly used types at crate root
pub use cancel::{CancelToken, Cancelled};
pub use defect::{Defect, DefectCatalog, DefectKind, DefectState, Severity};
pub use graph::ReferenceGraph;
pub use runner::{InspectionReport, Inspector, InspectorOptions, Summary};

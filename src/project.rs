//! MSBuild project reader.
//!
//! Parses project XML with roxmltree into an owned tree of properties, items
//! and imports. Values are literal: conditions are recorded but never
//! evaluated, and `$(...)` references are not expanded. Every item and
//! metadata element keeps its byte span and raw text so a fix can later edit
//! exactly that element and nothing else.

use crate::rewriter::line_span;
use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

/// A slice of the original file: byte span plus the text it held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceText {
    pub span: Range<usize>,
    pub raw: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectTree {
    pub properties: Vec<Property>,
    pub items: Vec<Item>,
    pub imports: Vec<Import>,
}

impl ProjectTree {
    /// First property named `name` (MSBuild names are case-insensitive).
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn items_of_type<'a>(&'a self, item_type: &'a str) -> impl Iterator<Item = &'a Item> {
        self.items
            .iter()
            .filter(move |item| item.item_type.eq_ignore_ascii_case(item_type))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub line: usize,
    pub condition: Option<String>,
    pub group_label: Option<String>,
    pub group_condition: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub item_type: String,
    pub include: String,
    pub line: usize,
    pub metadata: Vec<Metadata>,
    /// The element, widened to its whole line when it stands alone.
    pub source: SourceText,
}

impl Item {
    pub fn metadata(&self, name: &str) -> Option<&Metadata> {
        self.metadata
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
    pub line: usize,
    pub element: SourceText,
    /// The text content, when the element holds nothing but text.
    pub text: Option<SourceText>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Import {
    pub project: String,
    pub label: Option<String>,
    pub condition: Option<String>,
    pub line: usize,
}

/// Reads a project file into a [`ProjectTree`].
pub trait ProjectReader {
    fn read(&self, path: &Path) -> Result<ProjectTree>;
}

/// Reads MSBuild XML files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsBuildReader;

impl ProjectReader for MsBuildReader {
    fn read(&self, path: &Path) -> Result<ProjectTree> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_project(&source)
    }
}

/// Parses project XML. The root element must be `<Project>`.
pub fn parse_project(source: &str) -> Result<ProjectTree> {
    let offset = if source.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    };
    let doc = Document::parse(&source[offset..]).context("Invalid project XML")?;

    let root = doc.root_element();
    if root.tag_name().name() != "Project" {
        anyhow::bail!(
            "Root element is <{}>, expected <Project>",
            root.tag_name().name()
        );
    }

    let extractor = Extractor {
        doc: &doc,
        source,
        offset,
    };
    let mut tree = ProjectTree::default();
    extractor.visit(root, &mut tree);
    Ok(tree)
}

struct Extractor<'a, 'input> {
    doc: &'a Document<'input>,
    source: &'a str,
    offset: usize,
}

impl<'a, 'input> Extractor<'a, 'input> {
    fn visit(&self, node: Node<'a, 'input>, tree: &mut ProjectTree) {
        for child in node.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "PropertyGroup" => self.properties(child, tree),
                "ItemGroup" => self.items(child, tree),
                "ImportGroup" => {
                    for import in child
                        .children()
                        .filter(|n| n.is_element() && n.tag_name().name() == "Import")
                    {
                        self.import(import, child.attribute("Label"), tree);
                    }
                }
                "Import" => self.import(child, None, tree),
                "Choose" | "When" | "Otherwise" => self.visit(child, tree),
                _ => {}
            }
        }
    }

    fn properties(&self, group: Node<'a, 'input>, tree: &mut ProjectTree) {
        for property in group.children().filter(Node::is_element) {
            tree.properties.push(Property {
                name: property.tag_name().name().to_string(),
                value: property.text().unwrap_or("").trim().to_string(),
                line: self.line(property),
                condition: property.attribute("Condition").map(str::to_string),
                group_label: group.attribute("Label").map(str::to_string),
                group_condition: group.attribute("Condition").map(str::to_string),
            });
        }
    }

    fn items(&self, group: Node<'a, 'input>, tree: &mut ProjectTree) {
        for item in group.children().filter(Node::is_element) {
            // Remove/Update items name no new files.
            let Some(include) = item.attribute("Include") else {
                continue;
            };
            let element = self.source_text(item.range());
            let widened = line_span(self.source, element.span.clone());
            tree.items.push(Item {
                item_type: item.tag_name().name().to_string(),
                include: include.to_string(),
                line: self.line(item),
                metadata: item
                    .children()
                    .filter(Node::is_element)
                    .map(|m| self.metadata(m))
                    .collect(),
                source: SourceText {
                    raw: self.source[widened.clone()].to_string(),
                    span: widened,
                },
            });
        }
    }

    fn metadata(&self, node: Node<'a, 'input>) -> Metadata {
        let mut children = node.children();
        let text = match (children.next(), children.next()) {
            (Some(only), None) if only.is_text() => Some(self.source_text(only.range())),
            _ => None,
        };
        Metadata {
            name: node.tag_name().name().to_string(),
            value: node.text().unwrap_or("").trim().to_string(),
            line: self.line(node),
            element: self.source_text(node.range()),
            text,
        }
    }

    fn import(&self, node: Node<'a, 'input>, group_label: Option<&str>, tree: &mut ProjectTree) {
        let Some(project) = node.attribute("Project") else {
            return;
        };
        tree.imports.push(Import {
            project: project.to_string(),
            label: node.attribute("Label").or(group_label).map(str::to_string),
            condition: node.attribute("Condition").map(str::to_string),
            line: self.line(node),
        });
    }

    fn line(&self, node: Node<'a, 'input>) -> usize {
        self.doc.text_pos_at(node.range().start).row as usize
    }

    fn source_text(&self, range: Range<usize>) -> SourceText {
        let span = range.start + self.offset..range.end + self.offset;
        SourceText {
            raw: self.source[span.clone()].to_string(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/project")
            .join(name)
    }

    fn app() -> (String, ProjectTree) {
        let path = fixture("App.vcxproj");
        let source = std::fs::read_to_string(&path).unwrap();
        (source, MsBuildReader.read(&path).unwrap())
    }

    #[test]
    fn reads_project_guid_with_line() {
        let (_, tree) = app();
        let guid = tree.property("ProjectGuid").unwrap();
        assert_eq!(guid.value, "{A0000000-0000-0000-0000-00000000000A}");
        assert_eq!(guid.line, 13);
        assert_eq!(guid.group_label.as_deref(), Some("Globals"));
    }

    #[test]
    fn records_group_conditions_on_properties() {
        let (_, tree) = app();
        let config = tree.property("ConfigurationType").unwrap();
        assert_eq!(config.value, "Application");
        assert_eq!(
            config.group_condition.as_deref(),
            Some("'$(Configuration)|$(Platform)'=='Debug|x64'")
        );
        assert_eq!(config.group_label.as_deref(), Some("Configuration"));
    }

    #[test]
    fn reads_items_in_document_order() {
        let (_, tree) = app();
        let items: Vec<_> = tree
            .items
            .iter()
            .map(|i| (i.item_type.as_str(), i.include.as_str()))
            .collect();
        assert_eq!(
            items,
            vec![
                ("ProjectConfiguration", "Debug|x64"),
                ("ClCompile", "main.cpp"),
                ("ClInclude", "app.h"),
                ("ProjectReference", "..\\Core\\Core.vcxproj"),
                ("ProjectReference", "..\\Util\\Util.vcxproj"),
            ]
        );
    }

    #[test]
    fn metadata_spans_point_into_source() {
        let (source, tree) = app();
        let reference = tree.items_of_type("ProjectReference").next().unwrap();
        let project = reference.metadata("Project").unwrap();
        assert_eq!(project.value, "{c0000000-0000-0000-0000-00000000000c}");
        assert_eq!(project.line, 27);

        let text = project.text.as_ref().unwrap();
        assert_eq!(&source[text.span.clone()], "{c0000000-0000-0000-0000-00000000000c}");
        assert_eq!(text.raw, project.value);
        assert!(project.element.raw.starts_with("<Project>"));
        assert_eq!(&source[reference.source.span.clone()], reference.source.raw);
    }

    #[test]
    fn standalone_item_source_covers_its_line() {
        let (_, tree) = app();
        let main = tree.items_of_type("ClCompile").next().unwrap();
        assert_eq!(main.source.raw, "    <ClCompile Include=\"main.cpp\" />\n");
    }

    #[test]
    fn self_closing_reference_has_no_metadata() {
        let (_, tree) = app();
        let util = tree.items_of_type("ProjectReference").nth(1).unwrap();
        assert!(util.metadata.is_empty());
        assert_eq!(util.line, 30);
    }

    #[test]
    fn reads_imports_with_group_labels() {
        let (_, tree) = app();
        let imports: Vec<_> = tree
            .imports
            .iter()
            .map(|i| (i.project.as_str(), i.label.as_deref(), i.line))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("$(VCTargetsPath)\\Microsoft.Cpp.Default.props", None, 15),
                ("..\\Shared\\common.props", Some("PropertySheets"), 17),
            ]
        );
    }

    #[test]
    fn descends_into_choose_blocks() {
        let source = r#"<Project>
  <Choose>
    <When Condition="'$(X)'=='1'">
      <PropertyGroup><ProjectGuid>{11111111-1111-1111-1111-111111111111}</ProjectGuid></PropertyGroup>
    </When>
  </Choose>
</Project>"#;
        let tree = parse_project(source).unwrap();
        assert_eq!(tree.property("projectguid").unwrap().line, 4);
    }

    #[test]
    fn byte_order_mark_keeps_spans_aligned() {
        let source = "\u{feff}<Project><ItemGroup><ProjectReference Include=\"a.vcxproj\"><Project>{X}</Project></ProjectReference></ItemGroup></Project>";
        let tree = parse_project(source).unwrap();
        let text = tree.items[0].metadata[0].text.clone().unwrap();
        assert_eq!(&source[text.span], "{X}");
    }

    #[test]
    fn empty_metadata_element_has_no_text() {
        let source = "<Project><ItemGroup><ProjectReference Include=\"a.vcxproj\"><Project /></ProjectReference></ItemGroup></Project>";
        let tree = parse_project(source).unwrap();
        let project = &tree.items[0].metadata[0];
        assert!(project.text.is_none());
        assert_eq!(project.value, "");
        assert_eq!(project.element.raw, "<Project />");
    }

    #[test]
    fn invalid_xml_fails() {
        let err = parse_project("<Project><PropertyGroup></Project>").unwrap_err();
        assert!(err.to_string().contains("Invalid project XML"));
    }

    #[test]
    fn wrong_root_fails() {
        let err = parse_project("<Solution />").unwrap_err();
        assert!(err.to_string().contains("expected <Project>"));
    }
}

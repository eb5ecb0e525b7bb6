//! Project identifier parsing.
//!
//! Malformed identifier text is reported as a [`DefectKind::GuidStringInvalid`]
//! defect and then treated exactly like a missing identifier.

use crate::defect::{Defect, DefectCatalog, DefectKind};
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// A project GUID, rendered the way MSBuild writes it: braced, upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(Uuid);

impl Guid {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses braced, hyphenated, simple or URN forms; surrounding whitespace is ignored.
    pub fn try_parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text.trim()).ok().map(Self)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = Uuid::encode_buffer();
        f.write_str(self.0.braced().encode_upper(&mut buffer))
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parses `text` recorded at `filename:line`.
///
/// Returns `None` for invalid text after recording a defect, so callers never
/// need to tell "absent" and "malformed" apart.
pub fn parse(text: &str, filename: &str, line: usize, defects: &mut DefectCatalog) -> Option<Guid> {
    let guid = Guid::try_parse(text);
    if guid.is_none() {
        defects.add(Defect::new(
            DefectKind::GuidStringInvalid,
            filename,
            line,
            format!("String '{}' is not a valid GUID", text),
        ));
    }
    guid
}

/// Formats an optional identifier for defect text.
pub fn describe(id: Option<Guid>) -> String {
    id.map_or_else(|| "none".to_string(), |guid| guid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_guids_round_trip_case_insensitively() {
        let inputs = [
            "{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}",
            "{2150e333-8fdc-42a3-9474-1a3956d46de8}",
            "{11111111-1111-1111-1111-111111111111}",
            "{DeadBeef-0000-4000-8000-00000000CafE}",
        ];
        for input in inputs {
            let mut defects = DefectCatalog::new();
            let guid = parse(input, "a.vcxproj", 3, &mut defects).unwrap();
            assert!(guid.to_string().eq_ignore_ascii_case(input), "{input}");
            assert!(defects.is_empty());
        }
    }

    #[test]
    fn unbraced_forms_parse_to_the_same_id() {
        let braced = Guid::try_parse("{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}");
        assert_eq!(Guid::try_parse("8bc9ceb8-8b4a-11d0-8d11-00a0c91bc942"), braced);
        assert_eq!(Guid::try_parse("8BC9CEB88B4A11D08D1100A0C91BC942"), braced);
        assert_eq!(Guid::try_parse("  {8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}\n"), braced);
    }

    #[test]
    fn invalid_text_yields_none_and_one_defect() {
        let inputs = ["", "not-a-guid", "{1234}", "{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC94Z}"];
        for input in inputs {
            let mut defects = DefectCatalog::new();
            assert_eq!(parse(input, "App.sln", 7, &mut defects), None);
            assert_eq!(defects.len(), 1, "{input:?}");
            let defect = &defects.as_slice()[0];
            assert_eq!(defect.kind(), DefectKind::GuidStringInvalid);
            assert_eq!(defect.filename(), "App.sln");
            assert_eq!(defect.line(), 7);
            assert!(defect.description().contains(input));
        }
    }

    #[test]
    fn describe_absent_identifier() {
        assert_eq!(describe(None), "none");
        let guid = Guid::try_parse("{22222222-2222-2222-2222-222222222222}");
        assert_eq!(describe(guid), "{22222222-2222-2222-2222-222222222222}");
    }
}

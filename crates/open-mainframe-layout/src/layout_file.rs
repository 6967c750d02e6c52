//! JSON layout files: a list of contexts, each with its normalized records.
//!
//! ```json
//! {
//!   "contexts": [
//!     {
//!       "name": "PAYREC",
//!       "records": [
//!         { "label": "ID", "command": "DS", "operand": "CL8" },
//!         { "label": "AMOUNT", "command": "DS", "operand": "F" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::builder::{LayoutSession, NormalizedRecord};

/// Layout file errors.
#[derive(Debug, Error, Diagnostic)]
pub enum LayoutFileError {
    #[error("cannot read layout file {}", path.display())]
    #[diagnostic(code(layout::file::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid layout file: {0}")]
    #[diagnostic(
        code(layout::file::parse),
        help("expected a top-level \"contexts\" array whose entries have \"name\" and \"records\"")
    )]
    Parse(#[from] serde_json::Error),
    #[error("context {0:?} appears more than once")]
    #[diagnostic(code(layout::file::duplicate_context))]
    DuplicateContext(String),
}

/// One context and its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSource {
    pub name: String,
    #[serde(default)]
    pub records: Vec<NormalizedRecord>,
}

/// A parsed layout file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub contexts: Vec<ContextSource>,
}

impl LayoutFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LayoutFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LayoutFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, LayoutFileError> {
        let file: Self = serde_json::from_str(content)?;
        let mut seen = std::collections::HashSet::new();
        for context in &file.contexts {
            if !seen.insert(context.name.trim().to_uppercase()) {
                return Err(LayoutFileError::DuplicateContext(context.name.clone()));
            }
        }
        Ok(file)
    }

    /// Look up a context by name.
    pub fn context(&self, name: &str) -> Option<&ContextSource> {
        self.contexts
            .iter()
            .find(|c| c.name.trim().eq_ignore_ascii_case(name.trim()))
    }

    /// Resolve every context in file order.
    pub fn resolve_all(&self, session: &mut LayoutSession) {
        for context in &self.contexts {
            info!(context = %context.name, records = context.records.len(), "resolving context");
            session.resolve(&context.name, &context.records);
        }
    }

    /// Resolve the contexts up to and including `name`, so that
    /// cross-context references in earlier contexts are available.
    /// Returns false if no context has that name.
    pub fn resolve_through(&self, name: &str, session: &mut LayoutSession) -> bool {
        for context in &self.contexts {
            session.resolve(&context.name, &context.records);
            if context.name.trim().eq_ignore_ascii_case(name.trim()) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::Directive;

    const SAMPLE: &str = r#"{
        "contexts": [
            {
                "name": "HDR",
                "records": [
                    { "label": "ID", "command": "DS", "operand": "CL12" },
                    { "command": "ORG", "operand": "" }
                ]
            },
            {
                "name": "BODY",
                "records": [
                    { "label": "COPY", "command": "ds", "operand": "CL(L'HDR.ID)" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let file = LayoutFile::from_json_str(SAMPLE).unwrap();
        assert_eq!(file.contexts.len(), 2);
        let hdr = file.context("hdr").unwrap();
        assert_eq!(hdr.records[0].label.as_deref(), Some("ID"));
        assert_eq!(hdr.records[1].label, None);
        assert_eq!(hdr.records[1].command, Directive::Org);
        assert_eq!(file.context("BODY").unwrap().records[0].command, Directive::Ds);
    }

    #[test]
    fn test_missing_operand_defaults_to_empty() {
        let file = LayoutFile::from_json_str(
            r#"{"contexts":[{"name":"A","records":[{"label":"S","command":"DSECT"}]}]}"#,
        )
        .unwrap();
        assert_eq!(file.contexts[0].records[0].operand, "");
    }

    #[test]
    fn test_unknown_directive_rejected() {
        let err = LayoutFile::from_json_str(
            r#"{"contexts":[{"name":"A","records":[{"command":"USING","operand":"*,12"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutFileError::Parse(_)));
    }

    #[test]
    fn test_duplicate_context_rejected() {
        let err = LayoutFile::from_json_str(r#"{"contexts":[{"name":"A"},{"name":"a"}]}"#)
            .unwrap_err();
        assert!(matches!(err, LayoutFileError::DuplicateContext(name) if name == "a"));
    }

    #[test]
    fn test_resolve_all() {
        let file = LayoutFile::from_json_str(SAMPLE).unwrap();
        let mut session = LayoutSession::new();
        file.resolve_all(&mut session);
        let body = session.layout("BODY").unwrap();
        assert_eq!(body.lookup("COPY").unwrap().length, 12);
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_resolve_through() {
        let file = LayoutFile::from_json_str(SAMPLE).unwrap();
        let mut session = LayoutSession::new();
        assert!(file.resolve_through("HDR", &mut session));
        assert!(session.layout("BODY").is_none());
        assert!(!file.resolve_through("NONE", &mut LayoutSession::new()));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(LayoutFile::from_file(&path).unwrap().contexts.len(), 2);
        assert!(matches!(
            LayoutFile::from_file(dir.path().join("missing.json")),
            Err(LayoutFileError::Io { .. })
        ));
    }
}

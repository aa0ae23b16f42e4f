//! Structural SBOM validation for SPDX and CycloneDX JSON documents.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::batch::for_each_sbom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SbomKind {
    Spdx,
    CycloneDx,
}

impl fmt::Display for SbomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SbomKind::Spdx => write!(f, "SPDX"),
            SbomKind::CycloneDx => write!(f, "CycloneDX"),
        }
    }
}

/// Validate an SBOM file and report which format it is.
pub fn validate_sbom(path: &Path) -> Result<SbomKind> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("error reading file: {}", path.display()))?;
    let doc: Value = serde_json::from_str(&text).context("error parsing SBOM: not valid JSON")?;
    validate_document(&doc)
}

/// Validate an already-parsed document.
pub fn validate_document(doc: &Value) -> Result<SbomKind> {
    if !doc.is_object() {
        bail!("SBOM is not a JSON object");
    }

    if doc.get("spdxVersion").is_some() {
        validate_spdx(doc)?;
        Ok(SbomKind::Spdx)
    } else if doc.get("bomFormat").is_some() {
        validate_cyclonedx(doc)?;
        Ok(SbomKind::CycloneDx)
    } else {
        bail!("unrecognised SBOM format: neither 'spdxVersion' nor 'bomFormat' present")
    }
}

fn required_str<'a>(obj: &'a Value, field: &str, context: &str) -> Result<&'a str> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => bail!("{}: '{}' is empty", context, field),
        Some(_) => bail!("{}: '{}' must be a string", context, field),
        None => bail!("{}: missing '{}'", context, field),
    }
}

fn optional_array<'a>(doc: &'a Value, field: &str) -> Result<&'a [Value]> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => bail!("'{}' must be an array", field),
    }
}

fn validate_spdx(doc: &Value) -> Result<()> {
    let version = required_str(doc, "spdxVersion", "SPDX document")?;
    if !version.starts_with("SPDX-") {
        bail!("SPDX document: spdxVersion '{}' does not start with 'SPDX-'", version);
    }
    for field in ["SPDXID", "name", "dataLicense", "documentNamespace"] {
        required_str(doc, field, "SPDX document")?;
    }

    let creation = doc
        .get("creationInfo")
        .filter(|v| v.is_object())
        .context("SPDX document: missing 'creationInfo'")?;
    let created = required_str(creation, "created", "SPDX creationInfo")?;
    chrono::DateTime::parse_from_rfc3339(created).with_context(|| {
        format!(
            "SPDX creationInfo: 'created' is not an RFC 3339 timestamp: {}",
            created
        )
    })?;

    for (i, package) in optional_array(doc, "packages")?.iter().enumerate() {
        let context = format!("SPDX package {}", i);
        required_str(package, "SPDXID", &context)?;
        required_str(package, "name", &context)?;
    }

    Ok(())
}

fn validate_cyclonedx(doc: &Value) -> Result<()> {
    let format = required_str(doc, "bomFormat", "CycloneDX document")?;
    if format != "CycloneDX" {
        bail!("CycloneDX document: bomFormat is '{}', expected 'CycloneDX'", format);
    }
    required_str(doc, "specVersion", "CycloneDX document")?;

    for (i, component) in optional_array(doc, "components")?.iter().enumerate() {
        let context = format!("CycloneDX component {}", i);
        required_str(component, "type", &context)?;
        required_str(component, "name", &context)?;
    }

    Ok(())
}

/// CLI entry point for `bomfactory validate-sbom`.
pub fn run_validate(file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    let outcome = for_each_sbom(file.as_deref(), dir.as_deref(), |path| {
        let kind = validate_sbom(path)?;
        println!("{}: valid {} SBOM", path.display(), kind);
        Ok(())
    })?;

    outcome.into_result("SBOM validation")?;
    println!("All SBOM files validated successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spdx() -> Value {
        json!({
            "spdxVersion": "SPDX-2.3",
            "SPDXID": "SPDXRef-DOCUMENT",
            "name": "github.com/ossf/scorecard",
            "dataLicense": "CC0-1.0",
            "documentNamespace": "https://example.com/scorecard",
            "creationInfo": {"created": "2024-07-05T14:33:35Z", "creators": ["Tool: syft"]},
            "packages": [{"SPDXID": "SPDXRef-1", "name": "go:github.com/a/b"}]
        })
    }

    fn cyclonedx() -> Value {
        json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "components": [{"type": "library", "name": "left-pad"}]
        })
    }

    #[test]
    fn test_valid_documents() {
        assert_eq!(validate_document(&spdx()).unwrap(), SbomKind::Spdx);
        assert_eq!(validate_document(&cyclonedx()).unwrap(), SbomKind::CycloneDx);
    }

    #[test]
    fn test_spdx_requires_prefix() {
        let mut doc = spdx();
        doc["spdxVersion"] = json!("2.3");
        let err = validate_document(&doc).unwrap_err().to_string();
        assert!(err.contains("does not start with 'SPDX-'"));
    }

    #[test]
    fn test_spdx_requires_rfc3339_created() {
        let mut doc = spdx();
        doc["creationInfo"]["created"] = json!("July 5th");
        assert!(format!("{:#}", validate_document(&doc).unwrap_err()).contains("RFC 3339"));

        doc["creationInfo"] = json!(null);
        assert!(validate_document(&doc).unwrap_err().to_string().contains("creationInfo"));
    }

    #[test]
    fn test_spdx_names_first_missing_field() {
        let mut doc = spdx();
        doc.as_object_mut().unwrap().remove("dataLicense");
        assert_eq!(
            validate_document(&doc).unwrap_err().to_string(),
            "SPDX document: missing 'dataLicense'"
        );
    }

    #[test]
    fn test_spdx_package_needs_name() {
        let mut doc = spdx();
        doc["packages"] = json!([{"SPDXID": "SPDXRef-1"}]);
        assert_eq!(
            validate_document(&doc).unwrap_err().to_string(),
            "SPDX package 0: missing 'name'"
        );
    }

    #[test]
    fn test_cyclonedx_rules() {
        let mut doc = cyclonedx();
        doc["bomFormat"] = json!("SPDX");
        assert!(validate_document(&doc).is_err());

        let mut doc = cyclonedx();
        doc["components"] = json!([{"name": "x"}]);
        assert_eq!(
            validate_document(&doc).unwrap_err().to_string(),
            "CycloneDX component 0: missing 'type'"
        );

        let mut doc = cyclonedx();
        doc["components"] = json!({"name": "x"});
        assert!(validate_document(&doc).is_err());
    }

    #[test]
    fn test_unrecognised_and_non_json() {
        assert!(validate_document(&json!({"hello": "world"})).is_err());
        assert!(validate_document(&json!([1, 2])).is_err());

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("x.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(validate_sbom(&path).is_err());
    }
}

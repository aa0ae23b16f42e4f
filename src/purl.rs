//! Package-URL enrichment for SPDX documents.
//!
//! SPDX packages produced from criticality-score repositories carry names
//! like `go:github.com/spf13/cobra` or `npm:left-pad`. For every package with
//! a recognised ecosystem prefix a `purl` external reference is appended so
//! downstream tools can resolve it. The document is handled as a generic
//! JSON value, so fields this module does not know about survive the rewrite.

use anyhow::{bail, Context, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::batch::for_each_sbom;

const REFERENCE_CATEGORY: &str = "PACKAGE-MANAGER";
const REFERENCE_TYPE: &str = "purl";

/// Everything outside the RFC 3986 unreserved set.
const PURL_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Map an SPDX name prefix to a purl type and optional namespace.
fn purl_type(ecosystem: &str) -> Option<(&'static str, Option<&'static str>)> {
    let mapped = match ecosystem {
        "go" => ("golang", None),
        "actions" => ("generic", Some("github")),
        "bitbucket" => ("bitbucket", None),
        "deb" => ("deb", None),
        "docker" => ("docker", None),
        "gem" => ("gem", None),
        "github" => ("github", None),
        "maven" => ("maven", None),
        "npm" => ("npm", None),
        "nuget" => ("nuget", None),
        "pypi" => ("pypi", None),
        "rpm" => ("rpm", None),
        "alpm" => ("alpm", None),
        "apk" => ("apk", None),
        "bitnami" => ("bitnami", None),
        "cargo" => ("cargo", None),
        "cocoapods" => ("cocoapods", None),
        "composer" => ("composer", None),
        "conan" => ("conan", None),
        "conda" => ("conda", None),
        "cran" => ("cran", None),
        "generic" => ("generic", None),
        "hackage" => ("hackage", None),
        "hex" => ("hex", None),
        "huggingface" => ("huggingface", None),
        "mlflow" => ("mlflow", None),
        "oci" => ("oci", None),
        "pub" => ("pub", None),
        "qpkg" => ("qpkg", None),
        "swid" => ("swid", None),
        "swift" => ("swift", None),
        _ => return None,
    };
    Some(mapped)
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, PURL_SEGMENT).to_string()
}

/// Build the purl for an SPDX package name and version.
///
/// Returns `None` for names without an ecosystem prefix or with an
/// unrecognised one.
pub fn purl_for(name: &str, version: &str) -> Option<String> {
    let (ecosystem, package) = name.split_once(':')?;
    let (ty, namespace) = purl_type(ecosystem)?;
    if package.is_empty() {
        return None;
    }

    let mut purl = format!("pkg:{}/", ty);
    if let Some(ns) = namespace {
        purl.push_str(&encode(ns));
        purl.push('/');
    }
    purl.push_str(&encode(package));
    if !version.is_empty() {
        purl.push('@');
        purl.push_str(&encode(version));
    }
    Some(purl)
}

/// Append purl references to every recognised package in an SPDX document.
///
/// Returns how many references were added. A package that already carries
/// the same locator is left alone, so repeated runs are no-ops.
pub fn add_purls_to_document(doc: &mut Value) -> Result<usize> {
    let Some(root) = doc.as_object_mut() else {
        bail!("SPDX document is not a JSON object");
    };

    let packages = match root.get_mut("packages") {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Array(packages)) => packages,
        Some(_) => bail!("'packages' is not an array"),
    };

    let mut added = 0;
    for package in packages.iter_mut().filter_map(Value::as_object_mut) {
        let name = package.get("name").and_then(Value::as_str).unwrap_or("");
        let version = package
            .get("versionInfo")
            .and_then(Value::as_str)
            .unwrap_or("");
        let Some(locator) = purl_for(name, version) else {
            continue;
        };

        if add_reference(package, &locator)? {
            added += 1;
        }
    }

    Ok(added)
}

fn add_reference(package: &mut Map<String, Value>, locator: &str) -> Result<bool> {
    let refs = package
        .entry("externalRefs")
        .or_insert_with(|| Value::Array(Vec::new()));
    if refs.is_null() {
        *refs = Value::Array(Vec::new());
    }
    let Value::Array(refs) = refs else {
        bail!("'externalRefs' is not an array");
    };

    let present = refs.iter().any(|r| {
        r.get("referenceType").and_then(Value::as_str) == Some(REFERENCE_TYPE)
            && r.get("referenceLocator").and_then(Value::as_str) == Some(locator)
    });
    if present {
        return Ok(false);
    }

    refs.push(json!({
        "referenceCategory": REFERENCE_CATEGORY,
        "referenceType": REFERENCE_TYPE,
        "referenceLocator": locator,
    }));
    Ok(true)
}

/// Rewrite an SPDX JSON file in place with purl references added.
pub fn add_purls(path: &Path) -> Result<usize> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("error reading file: {}", path.display()))?;
    let mut doc: Value = serde_json::from_str(&text)
        .with_context(|| format!("error parsing JSON: {}", path.display()))?;

    let added = add_purls_to_document(&mut doc)?;

    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    std::fs::write(path, out).with_context(|| format!("error writing file: {}", path.display()))?;

    debug!(path = %path.display(), added, "purls added");
    Ok(added)
}

/// CLI entry point for `bomfactory convert-to-purl`.
pub fn run_convert(file: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    let outcome = for_each_sbom(file.as_deref(), dir.as_deref(), |path| {
        let added = add_purls(path)?;
        println!("{}: added {} package URLs", path.display(), added);
        Ok(())
    })?;

    let processed = outcome.into_result("PURL conversion")?;
    println!("Converted {} SBOM files", processed.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purl_for_known_ecosystems() {
        assert_eq!(
            purl_for("go:github.com/spf13/cobra", "v1.8.0").as_deref(),
            Some("pkg:golang/github.com%2Fspf13%2Fcobra@v1.8.0")
        );
        assert_eq!(
            purl_for("npm:left-pad", "1.3.0").as_deref(),
            Some("pkg:npm/left-pad@1.3.0")
        );
        assert_eq!(
            purl_for("actions:actions/checkout", "v4").as_deref(),
            Some("pkg:generic/github/actions%2Fcheckout@v4")
        );
    }

    #[test]
    fn test_purl_omits_empty_version() {
        assert_eq!(purl_for("cargo:serde", "").as_deref(), Some("pkg:cargo/serde"));
    }

    #[test]
    fn test_purl_skips_unknown_and_unprefixed() {
        assert_eq!(purl_for("left-pad", "1.0"), None);
        assert_eq!(purl_for("bower:jquery", "1.0"), None);
        assert_eq!(purl_for("npm:", "1.0"), None);
    }

    #[test]
    fn test_encode_keeps_unreserved_only() {
        assert_eq!(encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(encode("@scope/pkg"), "%40scope%2Fpkg");
        assert_eq!(encode("1.0+build"), "1.0%2Bbuild");
        assert_eq!(encode("caf\u{e9} x"), "caf%C3%A9%20x");
    }

    fn sample() -> Value {
        json!({
            "spdxVersion": "SPDX-2.3",
            "SPDXID": "SPDXRef-DOCUMENT",
            "comment": "kept as is",
            "packages": [
                {"SPDXID": "SPDXRef-1", "name": "go:github.com/a/b", "versionInfo": "v1.0.0"},
                {"SPDXID": "SPDXRef-2", "name": "plain", "versionInfo": "1"},
                {"SPDXID": "SPDXRef-3", "name": "pypi:requests", "versionInfo": "2.31.0",
                 "externalRefs": [{"referenceCategory": "SECURITY", "referenceType": "cpe23Type",
                                   "referenceLocator": "cpe:2.3:a:python:requests"}]}
            ]
        })
    }

    #[test]
    fn test_document_rewrite_preserves_unknown_fields() {
        let mut doc = sample();
        assert_eq!(add_purls_to_document(&mut doc).unwrap(), 2);

        assert_eq!(doc["comment"], "kept as is");
        assert_eq!(
            doc["packages"][0]["externalRefs"][0]["referenceLocator"],
            "pkg:golang/github.com%2Fa%2Fb@v1.0.0"
        );
        assert!(doc["packages"][1].get("externalRefs").is_none());

        let refs = doc["packages"][2]["externalRefs"].as_array().unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0]["referenceType"], "cpe23Type");
        assert_eq!(refs[1]["referenceCategory"], "PACKAGE-MANAGER");
        assert_eq!(refs[1]["referenceLocator"], "pkg:pypi/requests@2.31.0");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut doc = sample();
        add_purls_to_document(&mut doc).unwrap();
        let once = doc.clone();
        assert_eq!(add_purls_to_document(&mut doc).unwrap(), 0);
        assert_eq!(doc, once);
    }

    #[test]
    fn test_add_purls_rewrites_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.spdx.json");
        std::fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

        assert_eq!(add_purls(&path).unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"packages\""));
        assert!(text.contains("pkg:golang/github.com%2Fa%2Fb@v1.0.0"));
    }

    #[test]
    fn test_add_purls_rejects_invalid_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = add_purls(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("error parsing JSON"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}

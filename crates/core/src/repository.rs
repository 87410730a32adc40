//! Repository name and reference validation.

use std::path::Component;

/// Validate a repository name.
///
/// Names are path-shaped (`lib/alpine`) and become directory components
/// under the manifest root, so every segment must be a normal path
/// component. Anything that could resolve outside the configured root is
/// rejected.
pub fn validate_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::Error::InvalidName("name is empty".to_string()));
    }
    if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
        return Err(crate::Error::InvalidName(format!(
            "path traversal not allowed: {name}"
        )));
    }
    for component in std::path::Path::new(name).components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(crate::Error::InvalidName(format!(
                    "contains unsafe path component: {name}"
                )));
            }
        }
    }
    Ok(())
}

/// Validate a manifest reference (tag or qualified digest).
///
/// References name a single file inside the repository directory, so they
/// must be exactly one normal path segment. A `sha256:` prefix is allowed;
/// the colon is not a path separator on Unix.
pub fn validate_reference(reference: &str) -> crate::Result<()> {
    if reference.is_empty() {
        return Err(crate::Error::InvalidReference(
            "reference is empty".to_string(),
        ));
    }
    if reference.contains('/') || reference.contains('\\') || reference.contains("..") {
        return Err(crate::Error::InvalidReference(format!(
            "invalid reference: {reference}"
        )));
    }
    if reference == "." {
        return Err(crate::Error::InvalidReference(format!(
            "invalid reference: {reference}"
        )));
    }
    Ok(())
}

//! Resource name validation for namespaces and documents.
//!
//! Namespaces must be DNS-1123 labels:
//! - 1 to 63 characters
//! - lowercase ASCII letters, digits and `-` only
//! - must start and end with a letter or digit
//!
//! Document names must be DNS-1123 subdomains: one or more labels joined by
//! `.`, at most 253 characters in total.

use crate::error::TypeError;

const MAX_LABEL_LEN: usize = 63;
const MAX_SUBDOMAIN_LEN: usize = 253;

/// Validate a namespace name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use crkv_types::names::validate_namespace;
///
/// assert!(validate_namespace("kv-store").is_ok());
/// assert!(validate_namespace("").is_err());
/// assert!(validate_namespace("Upper").is_err());
/// assert!(validate_namespace("-leading").is_err());
/// ```
pub fn validate_namespace(name: &str) -> Result<(), TypeError> {
    validate_label(name, name)
}

/// Validate a document name, returning `Ok(())` if valid.
pub fn validate_document_name(name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }
    if name.len() > MAX_SUBDOMAIN_LEN {
        return Err(invalid(
            name,
            format!("must be at most {MAX_SUBDOMAIN_LEN} characters"),
        ));
    }
    for label in name.split('.') {
        validate_label(name, label)?;
    }
    Ok(())
}

fn validate_label(full: &str, label: &str) -> Result<(), TypeError> {
    if label.is_empty() {
        return Err(invalid(full, "name segments must not be empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(invalid(
            full,
            format!("segment {label:?} exceeds {MAX_LABEL_LEN} characters"),
        ));
    }
    if let Some(ch) = label
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(full, format!("contains forbidden character: {ch:?}")));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(invalid(full, "must start and end with a letter or digit"));
    }
    Ok(())
}

fn invalid(name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

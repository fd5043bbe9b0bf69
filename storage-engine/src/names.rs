// SPDX-License-Identifier: GPL-3.0-only

use crate::error::{EngineError, Result};

pub const MAX_NAME_LEN: usize = 255;

/// Check a pool or filesystem name against the naming rules.
///
/// `what` only feeds the error message ("pool", "filesystem").
pub fn validate_name(what: &'static str, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.len() > MAX_NAME_LEN {
        Some("name is longer than 255 bytes")
    } else if name == "." || name == ".." {
        Some("name is reserved")
    } else if name.contains('/') {
        Some("name contains '/'")
    } else if name.chars().any(char::is_control) {
        Some("name contains control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(EngineError::InvalidName {
            what,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        for name in ["deadpool", "vol", "thunk", "new name", "ümlaut-1.2"] {
            assert!(validate_name("pool", name).is_ok(), "{name}");
        }
        assert!(validate_name("pool", &"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn rejects_malformed_names() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        for name in ["", ".", "..", "a/b", "tab\tname", "nul\0", long.as_str()] {
            let error = validate_name("filesystem", name).unwrap_err();
            assert!(matches!(error, EngineError::InvalidName { what: "filesystem", .. }));
        }
    }
}

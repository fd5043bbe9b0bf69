// SPDX-License-Identifier: GPL-3.0-only

/// Major version reported by every service speaking this protocol generation.
pub const PROTOCOL_MAJOR: u64 = 0;

/// Major component of a `major.minor.patch` version string.
pub fn major_component(version: &str) -> Option<u64> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    parts.next()?;
    parts.next()?;
    Some(major)
}

//! Target export format version.

/// Major version of the exported skeleton format this crate evaluates.
pub const EXPORT_MAJOR: u32 = 3;

/// Newest minor version of the exported skeleton format this crate evaluates.
pub const EXPORT_MINOR: u32 = 8;

/// Parses the leading `major.minor` of an export version string such as `3.8.99`.
pub fn parse_export_version(value: &str) -> Option<(u32, u32)> {
    let mut parts = value.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(raw) => {
            let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()?
        }
        None => 0,
    };
    Some((major, minor))
}

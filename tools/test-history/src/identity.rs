//! Stable test identity composition.

use crate::types::TestIdentity;

/// Separator between identity segments (file, describe path, test title).
pub const SEPARATOR: &str = " > ";

/// Compose an identity from a suite file, a describe path and a test title.
///
/// The file is reduced to its lowercased base name so that the same spec
/// checked out under different directories or casing maps to one key.
/// Empty segments are left out.
pub fn compose(file: &str, describe_path: &[&str], title: &str) -> TestIdentity {
  let base = file_base_name(file);
  let segments = std::iter::once(base.as_str())
    .chain(describe_path.iter().copied())
    .chain(std::iter::once(title))
    .map(str::trim)
    .filter(|s| !s.is_empty());

  let mut key = String::new();
  for seg in segments {
    if !key.is_empty() {
      key.push_str(SEPARATOR);
    }
    key.push_str(seg);
  }
  TestIdentity(key)
}

/// Last path segment of `file` (either separator), lowercased.
pub fn file_base_name(file: &str) -> String {
  file
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or(file)
    .trim()
    .to_ascii_lowercase()
}

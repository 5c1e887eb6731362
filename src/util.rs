use std::iter::repeat;
use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

const STORAGE_NAME_LENGTH: usize = 32;

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// Random name for a stored upload. The original extension is kept so served
/// files keep their content type.
pub fn random_storage_name(original: impl AsRef<Path>) -> String {
    let stem: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STORAGE_NAME_LENGTH)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();

    match original
        .as_ref()
        .extension()
        .and_then(|it| it.to_str())
        .filter(|it| !it.is_empty() && it.chars().all(char::is_alphanumeric))
    {
        Some(ext) => format!("{}.{}", stem, ext.to_lowercase()),
        None => stem,
    }
}

/// Person names are compared trimmed and lower-cased.
#[inline]
pub fn normalize_name(name: impl AsRef<str>) -> String {
    name.as_ref().trim().to_lowercase()
}

/// Case-insensitive file extension check.
pub fn has_extension(file_name: impl AsRef<Path>, expected: &str) -> bool {
    file_name
        .as_ref()
        .extension()
        .and_then(|it| it.to_str())
        .map(|it| it.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

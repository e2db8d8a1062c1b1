use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::path::Path;

const TOKEN_LEN: usize = 6;

/// Reduces an uploaded name to its base name over `[A-Za-z0-9._-]`,
/// replacing anything else with `_`.
pub fn sanitize(original: &str) -> String {
    // Uploads from Windows clients may carry backslash-separated paths
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Splits `name` into stem and extension (with its dot). A leading dot
/// does not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if name.len() > ext.len() + 1 => {
            let stem_len = name.len() - ext.len() - 1;
            (&name[..stem_len], &name[stem_len..])
        }
        _ => (name, ""),
    }
}

/// Builds a storage filename: `<stem>-<unix millis>-<token><ext>`.
pub fn unique_filename(original: &str) -> String {
    let sanitized = sanitize(original);
    let (stem, extension) = split_extension(&sanitized);
    let stem = if stem.is_empty() { "upload" } else { stem };
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{stem}-{}-{token}{extension}", Utc::now().timestamp_millis())
}

//! Task ID generation
//!
//! All IDs use the format: `{12-char-hex}-{type}-{slug}`
//! Example: `7d3f0a91c2e4-task-what-is-machine-learning`
//!
//! The hex part is taken from the random tail of a v7 UUID; the leading
//! timestamp bits would repeat for IDs created close together.

/// Longest slug kept in an ID; queries can be arbitrarily long
const MAX_SLUG_LEN: usize = 48;

/// Generate an ID from a type tag and a free-form title
pub fn generate_id(domain_type: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let simple = uuid.simple().to_string();
    let hex_prefix = &simple[simple.len() - 12..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", hex_prefix, domain_type)
    } else {
        format!("{}-{}-{}", hex_prefix, domain_type, slug)
    }
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }
    slug[..MAX_SLUG_LEN].trim_end_matches('-').to_string()
}

//! Species reference pages and their preview images.

use std::sync::LazyLock;

use regex::Regex;

// Attribute order varies between sites, so both orders are matched.
static OG_IMAGE_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(
            r#"(?is)<meta\s[^>]*?property\s*=\s*["']og:image["'][^>]*?content\s*=\s*["']([^"']+)["']"#,
        )
        .expect("Invalid og:image regex"),
        Regex::new(
            r#"(?is)<meta\s[^>]*?content\s*=\s*["']([^"']+)["'][^>]*?property\s*=\s*["']og:image["']"#,
        )
        .expect("Invalid og:image regex"),
    ]
});

/// Reference page for a species: `base` followed by the name with spaces
/// turned into underscores.
pub fn reference_url(base: &str, species: &str) -> String {
    let slug: String = species
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{}{}", base, slug)
}

/// The first `og:image` advertised by an HTML page.
pub fn extract_og_image(html: &str) -> Option<String> {
    OG_IMAGE_PATTERNS
        .iter()
        .filter_map(|re| re.captures(html))
        .filter_map(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .find(|url| !url.is_empty())
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

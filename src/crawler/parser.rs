//! HTML parser for catalog listing and detail pages
//!
//! This module handles parsing catalog HTML to extract:
//! - Entry ids from listing pages, in page order
//! - Entry metadata from detail pages (title, image, synopsis, sidebar info)

use crate::config::CatalogConfig;
use crate::state::CatalogEntry;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Synopses longer than this many characters are truncated
pub const SYNOPSIS_MAX_CHARS: usize = 400;

/// Sidebar value the catalog shows for unknown dates
const NOT_AVAILABLE: &str = "Not available";

/// Extracts entry ids from a listing page
///
/// An entry link is any `<a href>` whose resolved path starts with
/// `path_prefix` followed by a numeric id. Ids are returned in page order
/// (newest first on a "just added" listing), each id once.
///
/// # Example
///
/// ```
/// use catalog_herald::crawler::extract_entry_ids;
/// use url::Url;
///
/// let html = r#"<a href="/anime/105/Foo">Foo</a><a href="/anime/104">Bar</a>"#;
/// let base = Url::parse("https://catalog.example/list").unwrap();
/// assert_eq!(extract_entry_ids(html, &base, "/anime/"), vec!["105", "104"]);
/// ```
pub fn extract_entry_ids(html: &str, base_url: &Url, path_prefix: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut sighted = HashSet::new();
    let mut ids = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(id) = entry_id_from_href(href, base_url, path_prefix) else {
            continue;
        };
        if sighted.insert(id.clone()) {
            ids.push(id);
        }
    }

    ids
}

/// Resolves an href and extracts the numeric id that follows the prefix
fn entry_id_from_href(href: &str, base_url: &Url, path_prefix: &str) -> Option<String> {
    let resolved = base_url.join(href.trim()).ok()?;
    let rest = resolved.path().strip_prefix(path_prefix)?;
    let digits: String = rest
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Parses an entry detail page into a [`CatalogEntry`]
///
/// # Normalization
///
/// - Title: `title-selector` if configured, otherwise `<title>` without the
///   trailing ` - Site Name` suffix
/// - Image: `data-src` or `src` of the first image match; placeholder images
///   are dropped
/// - Synopsis: blank lines removed, truncated to 400 characters plus `...`
/// - Status: slug forms such as `currently_airing` become `Currently Airing`
/// - Air date: `Not available` is dropped
/// - Restricted: any genre listed in `restricted-genres` (case-insensitive)
///
/// # Returns
///
/// * `Ok(CatalogEntry)` - Parsed entry
/// * `Err(String)` - The page has no usable title
pub fn parse_entry_detail(
    id: &str,
    html: &str,
    catalog: &CatalogConfig,
) -> Result<CatalogEntry, String> {
    let document = Html::parse_document(html);

    let title = extract_title(&document, catalog.title_selector.as_deref())
        .ok_or_else(|| format!("no title found for entry {}", id))?;

    let image_url = select_first(&document, &catalog.image_selector)
        .and_then(|img| {
            img.value()
                .attr("data-src")
                .or_else(|| img.value().attr("src"))
                .map(|s| s.trim().to_string())
        })
        .filter(|src| !src.is_empty())
        .filter(|src| match &catalog.placeholder_image_prefix {
            Some(prefix) => !src.starts_with(prefix.as_str()),
            None => true,
        });

    let synopsis = select_first(&document, &catalog.synopsis_selector)
        .and_then(|el| normalize_synopsis(&el.text().collect::<String>()));

    let info = SidebarInfo::extract(&document, &catalog.info_label_selector);

    let is_restricted = info.genres.iter().any(|genre| {
        catalog
            .restricted_genres
            .iter()
            .any(|restricted| restricted.eq_ignore_ascii_case(genre))
    });

    Ok(CatalogEntry {
        id: id.to_string(),
        title,
        status: info
            .status
            .map(|s| unslugify(&s))
            .unwrap_or_else(|| "Unknown".to_string()),
        air_date: info.aired.filter(|aired| aired != NOT_AVAILABLE),
        synopsis,
        image_url,
        is_restricted,
    })
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the entry title
fn extract_title(document: &Html, title_selector: Option<&str>) -> Option<String> {
    let title = match title_selector {
        Some(selector) => element_text(select_first(document, selector)?),
        None => {
            let page_title = element_text(select_first(document, "title")?);
            match page_title.rsplit_once(" - ") {
                Some((name, _site)) => name.trim().to_string(),
                None => page_title,
            }
        }
    };

    Some(title).filter(|t| !t.is_empty())
}

/// Removes carriage returns, indentation and blank lines, then truncates
pub fn normalize_synopsis(raw: &str) -> Option<String> {
    let cleaned = raw
        .replace('\r', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    if cleaned.is_empty() {
        return None;
    }

    if cleaned.chars().count() > SYNOPSIS_MAX_CHARS {
        let truncated: String = cleaned.chars().take(SYNOPSIS_MAX_CHARS).collect();
        return Some(format!("{}...", truncated.trim_end()));
    }

    Some(cleaned)
}

/// Turns `currently_airing` into `Currently Airing`; other text is kept
pub fn unslugify(value: &str) -> String {
    if !value.contains('_') || value.contains(' ') {
        return value.to_string();
    }

    value
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Labeled values from the detail page sidebar
#[derive(Debug, Default)]
struct SidebarInfo {
    status: Option<String>,
    aired: Option<String>,
    genres: Vec<String>,
}

impl SidebarInfo {
    /// Reads `Status:`, `Aired:` and `Genres:` rows
    ///
    /// Each label is a child of the row element; the value is the row text
    /// with the label removed.
    fn extract(document: &Html, label_selector: &str) -> Self {
        let mut info = Self::default();
        let Ok(selector) = Selector::parse(label_selector) else {
            return info;
        };

        for label in document.select(&selector) {
            let label_text = element_text(label);
            let Some(row) = label.parent().and_then(ElementRef::wrap) else {
                continue;
            };

            let row_text = element_text(row);
            let value = row_text
                .strip_prefix(label_text.as_str())
                .unwrap_or(&row_text)
                .trim()
                .to_string();
            if value.is_empty() {
                continue;
            }

            match label_text.as_str() {
                "Status:" => info.status = Some(value),
                "Aired:" => info.aired = Some(value),
                "Genres:" | "Genre:" => {
                    info.genres = value
                        .split(',')
                        .map(|g| g.trim().to_string())
                        .filter(|g| !g.is_empty())
                        .collect();
                }
                _ => {}
            }
        }

        info
    }
}

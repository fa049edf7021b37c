//! Anchor extraction from the download page

use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::config;
use crate::utils::filename_from_url;

use super::models::ImageSource;

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Whether an href points at an image file, ignoring query and fragment
fn is_image_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.to_lowercase()
        .ends_with(config::images::IMAGE_EXTENSION)
}

fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<String>().trim().to_string()
}

/// Pick a display label for an image anchor
///
/// Anchor text wins unless it is empty or just the file name. Then the
/// first line of the enclosing element, then the file name itself.
fn label_for(anchor: &ElementRef<'_>, full_url: &str) -> String {
    let filename = filename_from_url(full_url).unwrap_or_else(|| full_url.to_string());
    let text = collapse_text(anchor.text());

    let repeats_filename = text.contains(&filename) || is_image_href(&text);
    if !text.is_empty() && !repeats_filename {
        return text;
    }

    let parent_text = anchor
        .parent()
        .and_then(ElementRef::wrap)
        .map(|parent| collapse_text(parent.text()))
        .unwrap_or_default();

    if !parent_text.is_empty() && parent_text.len() > text.len() {
        if let Some(first_line) = parent_text.lines().map(str::trim).find(|l| !l.is_empty()) {
            return first_line.to_string();
        }
    }

    filename
}

/// Extract every image link in `html`, resolved against `base_url`
///
/// Anchors with hrefs that cannot be resolved are skipped. Order follows the
/// document.
pub fn extract_image_links(html: &str, base_url: &Url) -> Vec<ImageSource> {
    let document = Html::parse_document(html);

    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if !is_image_href(href) {
                return None;
            }
            let full_url = base_url.join(href).ok()?.to_string();
            let label = label_for(&anchor, &full_url);
            Some(ImageSource::new(label, full_url))
        })
        .collect()
}

//! Image discovery module
//!
//! Fetches the download page and turns its `.iso` links into
//! [`ImageSource`] entries.

mod links;
mod models;

pub use links::extract_image_links;
pub use models::ImageSource;

use std::time::Duration;

use reqwest::Url;

use crate::download::Transfer;
use crate::error::{FlashError, Result};
use crate::{log_info, log_warn};

const MODULE: &str = "images";

/// Label of the placeholder returned when the page cannot be loaded
pub const LOAD_ERROR_LABEL: &str = "Error loading ISOs - Check your internet connection or URL";

/// Turn extracted links into the list shown to the user
///
/// An empty result becomes a single placeholder naming the page host.
pub fn image_list_from_html(html: &str, page_url: &Url) -> Vec<ImageSource> {
    let links = extract_image_links(html, page_url);
    if links.is_empty() {
        let host = page_url.host_str().unwrap_or("the download page");
        log_warn!(MODULE, "No ISOs found on {}", page_url);
        return vec![ImageSource::sentinel(format!("No ISOs found on {}", host))];
    }
    log_info!(MODULE, "Found {} ISO images on {}", links.len(), page_url);
    links
}

/// Fetch the download page and extract the image list
pub async fn fetch_image_list(
    transfer: &Transfer,
    page_url: &str,
    timeout: Duration,
) -> Result<Vec<ImageSource>> {
    let url = Url::parse(page_url)
        .map_err(|e| FlashError::transfer(format!("Invalid page URL '{}': {}", page_url, e)))?;
    log_info!(MODULE, "Fetching ISO links from {}", url);

    let html = transfer.fetch_text(url.as_str(), timeout).await?;
    Ok(image_list_from_html(&html, &url))
}

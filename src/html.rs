//! Selector-based HTML extraction helpers.
//!
//! The SSO handshake round-trips opaque tokens through hidden form inputs,
//! and the watcher reads labeled seat counts out of a results fragment. Both
//! only ever need "find matches of a CSS selector, read an attribute or the
//! text". Absent selectors yield the empty string, never an error; when a
//! selector matches more than once the last extracted value wins, matching
//! the portal's duplicated-form markup.

use scraper::{ElementRef, Html, Selector};

/// Extract an attribute value from the last element matching `selector`.
pub fn attr_of(html: &str, selector: &str, attr: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };
    let document = Html::parse_document(html);
    let mut value = String::new();
    for element in document.select(&selector) {
        if let Some(found) = element.value().attr(attr) {
            value = found.to_string();
        }
    }
    value
}

/// Extract the trimmed text of the last element matching `selector`.
pub fn text_of(html: &str, selector: &str) -> String {
    let Ok(selector) = Selector::parse(selector) else {
        return String::new();
    };
    let document = Html::parse_document(html);
    let mut value = String::new();
    for element in document.select(&selector) {
        value = element.text().collect::<String>().trim().to_string();
    }
    value
}

/// For each element matching `selector`, yield its trimmed text together
/// with the trimmed text of its next sibling element. Used for label/value
/// pairs in the enrollment-info fragment.
pub fn labeled_siblings(html: &str, selector: &str) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .map(|element| {
            let label = element.text().collect::<String>().trim().to_string();
            let value = element
                .next_siblings()
                .find_map(ElementRef::wrap)
                .map(|sibling| sibling.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            (label, value)
        })
        .collect()
}

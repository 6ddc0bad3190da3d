use scraper::{Html, Selector};

/// Text content of the first `tag` element in `html`, whitespace collapsed.
/// Returns an empty string when the tag is absent.
pub fn tag_text(html: &str, tag: &str) -> String {
    let Ok(selector) = Selector::parse(tag) else {
        return String::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&selector)
        .next()
        .map(|node| node.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Title and body text of a stored page.
pub fn title_and_body(html: &str) -> (String, String) {
    (tag_text(html, "title"), tag_text(html, "body"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_matching_tag() {
        let html = "<html><head><title> Cats </title></head><body><p>cats <b>are</b></p>\n<p>great</p><script></script></body></html>";
        assert_eq!(tag_text(html, "title"), "Cats");
        assert_eq!(tag_text(html, "body"), "cats are great");
    }

    #[test]
    fn missing_tag_is_empty() {
        assert_eq!(tag_text("", "title"), "");
    }
}

use scraper::{Html, Selector};

/// Trimmed text of the first `selector` element whose text contains `keyword`.
pub fn find_fact(doc: &Html, selector: &Selector, keyword: &str) -> Option<String> {
    doc.select(selector).find_map(|el| {
        let text = el.text().collect::<String>();
        text.contains(keyword).then(|| text.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(html: &str) -> Option<String> {
        let dd = Selector::parse("dd").unwrap();
        find_fact(&Html::parse_document(html), &dd, "employees")
    }

    #[test]
    fn first_matching_entry() {
        let html = r#"<dl>
            <dt>Industry</dt><dd>Software</dd>
            <dt>Company size</dt><dd>
                1,001-5,000 employees
            </dd>
            <dt>Other</dt><dd>12 employees on LinkedIn</dd>
        </dl>"#;
        assert_eq!(fact(html).as_deref(), Some("1,001-5,000 employees"));
    }

    #[test]
    fn no_match_is_none() {
        assert_eq!(fact("<dl><dd>Software</dd><dd>Founded 2009</dd></dl>"), None);
        assert_eq!(fact("<p>300 employees</p>"), None);
    }

    #[test]
    fn same_page_same_answer() {
        let html = "<dl><dd>51-200 employees</dd></dl>";
        assert_eq!(fact(html), fact(html));
    }
}

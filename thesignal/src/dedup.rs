use std::collections::HashSet;

use crate::model::CandidateItem;

/// Drop items whose URL is already stored or appeared earlier in `incoming`.
///
/// Single pass; the first occurrence of a URL wins and relative order is kept.
pub fn dedupe(incoming: Vec<CandidateItem>, existing_urls: &HashSet<String>) -> Vec<CandidateItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(incoming.len());
    let mut result = Vec::with_capacity(incoming.len());

    for item in incoming {
        if existing_urls.contains(&item.url) || !seen.insert(item.url.clone()) {
            continue;
        }
        result.push(item);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, url: &str) -> CandidateItem {
        CandidateItem {
            title: title.into(),
            url: url.into(),
            source_domain: "example.com".into(),
            raw_content: "...".into(),
            published_at: None,
            author_handle: None,
            image_url: None,
        }
    }

    fn urls(items: &[CandidateItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn filters_urls_already_stored() {
        let existing: HashSet<String> = ["https://openai.com/blog/gpt5", "https://anthropic.com/news"]
            .into_iter()
            .map(String::from)
            .collect();
        let incoming = vec![
            item("GPT-5", "https://openai.com/blog/gpt5"),
            item("New Model", "https://mistral.ai/news"),
        ];

        let result = dedupe(incoming, &existing);
        assert_eq!(urls(&result), vec!["https://mistral.ai/news"]);
    }

    #[test]
    fn keeps_everything_when_nothing_stored_and_urls_distinct() {
        let incoming = vec![item("A", "https://a.com"), item("B", "https://b.com")];
        assert_eq!(dedupe(incoming.clone(), &HashSet::new()), incoming);
    }

    #[test]
    fn first_occurrence_within_batch_wins() {
        let incoming = vec![
            item("Story A", "https://same.com"),
            item("Other", "https://other.com"),
            item("Story A duplicate", "https://same.com"),
        ];

        let result = dedupe(incoming, &HashSet::new());
        assert_eq!(urls(&result), vec!["https://same.com", "https://other.com"]);
        assert_eq!(result[0].title, "Story A");
    }

    #[test]
    fn output_has_no_stored_or_repeated_urls_and_keeps_order() {
        let existing: HashSet<String> = ["https://u/3".to_string()].into_iter().collect();
        let incoming: Vec<CandidateItem> = [1, 2, 3, 2, 4, 1, 5, 3]
            .iter()
            .map(|n| item(&format!("t{n}"), &format!("https://u/{n}")))
            .collect();

        let result = dedupe(incoming, &existing);
        assert_eq!(
            urls(&result),
            vec!["https://u/1", "https://u/2", "https://u/4", "https://u/5"]
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(dedupe(Vec::new(), &HashSet::new()).is_empty());
    }
}

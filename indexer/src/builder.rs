use searchcore::html::title_and_body;
use searchcore::lemmatizer::Lemmatizer;
use searchcore::{Lemma, Occurrence, Page};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const TITLE_WEIGHT: f32 = 1.0;
pub const BODY_WEIGHT: f32 = 0.8;

/// Lemma counts of a page's title and body segments.
#[derive(Debug, Default)]
pub struct PageLemmas {
    pub title: HashMap<String, u32>,
    pub body: HashMap<String, u32>,
}

impl PageLemmas {
    pub fn of(lemmatizer: &Lemmatizer, html: &str) -> Self {
        let (title, body) = title_and_body(html);
        Self { title: lemmatizer.lemma_counts(&title), body: lemmatizer.lemma_counts(&body) }
    }

    /// Forms present in either segment.
    pub fn forms(&self) -> HashSet<&str> {
        self.title.keys().chain(self.body.keys()).map(String::as_str).collect()
    }

    /// Weighted occurrence score, `None` when the form appears in neither segment.
    pub fn rank(&self, form: &str) -> Option<f32> {
        let title = self.title.get(form).copied();
        let body = self.body.get(form).copied();
        if title.is_none() && body.is_none() {
            return None;
        }
        Some(title.unwrap_or(0) as f32 * TITLE_WEIGHT + body.unwrap_or(0) as f32 * BODY_WEIGHT)
    }
}

/// Site-wide document frequency of every lemma, counted once per page.
///
/// Pages of any status take part, failed fetches included.
pub fn lemma_frequencies(lemmatizer: &Lemmatizer, pages: &[Page]) -> BTreeMap<String, u32> {
    let mut frequencies = BTreeMap::new();
    for page in pages {
        let lemmas = PageLemmas::of(lemmatizer, &page.content);
        for form in lemmas.forms() {
            *frequencies.entry(form.to_string()).or_insert(0) += 1;
        }
    }
    frequencies
}

/// Occurrence rows for every (page, lemma) pair where the lemma appears.
///
/// Only pages with a status below 400 are ranked.
pub fn occurrences(lemmatizer: &Lemmatizer, pages: &[Page], lemmas: &[Lemma]) -> Vec<Occurrence> {
    let mut out = Vec::new();
    for page in pages {
        if page.code >= 400 {
            tracing::debug!(path = %page.path, code = page.code, "bad status code, page not ranked");
            continue;
        }
        let page_lemmas = PageLemmas::of(lemmatizer, &page.content);
        for lemma in lemmas.iter().filter(|l| l.site_id == page.site_id) {
            if let Some(rank) = page_lemmas.rank(&lemma.form) {
                out.push(Occurrence { page_id: page.id, lemma_id: lemma.id, rank });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: u64, code: u16, title: &str, body: &str) -> Page {
        Page {
            id,
            site_id: 1,
            path: format!("/{id}"),
            code,
            content: format!("<html><head><title>{title}</title></head><body>{body}</body></html>"),
        }
    }

    #[test]
    fn rank_weights_title_over_body() {
        let lemmas = PageLemmas::of(&Lemmatizer::english(), &page(1, 200, "Cats", "cats and more cats").content);
        assert_eq!(lemmas.rank("cat"), Some(1.0 + 2.0 * 0.8));
        assert_eq!(lemmas.rank("dog"), None);
    }

    #[test]
    fn frequency_counts_pages_not_occurrences() {
        let pages = vec![
            page(1, 200, "Cats", "cats cats cats"),
            page(2, 200, "Dogs", "dogs chase cats"),
            page(3, 500, "", ""),
            page(4, 404, "Cats gone", "no cats"),
        ];
        let freq = lemma_frequencies(&Lemmatizer::english(), &pages);
        assert_eq!(freq.get("cat"), Some(&3));
        assert_eq!(freq.get("dog"), Some(&1));
        assert_eq!(freq.get("chase"), Some(&1));
    }

    #[test]
    fn error_pages_get_no_occurrences() {
        let pages = vec![page(1, 200, "Cats", "cats"), page(4, 404, "Cats gone", "no cats")];
        let lemmas = vec![
            Lemma { id: 10, site_id: 1, form: "cat".into(), frequency: 2 },
            Lemma { id: 11, site_id: 1, form: "gone".into(), frequency: 1 },
        ];
        let occ = occurrences(&Lemmatizer::english(), &pages, &lemmas);
        assert_eq!(occ, vec![Occurrence { page_id: 1, lemma_id: 10, rank: TITLE_WEIGHT + BODY_WEIGHT }]);
    }

    #[test]
    fn lemmas_of_other_sites_are_ignored() {
        let pages = vec![page(1, 200, "Cats", "cats")];
        let lemmas = vec![Lemma { id: 10, site_id: 2, form: "cat".into(), frequency: 1 }];
        assert!(occurrences(&Lemmatizer::english(), &pages, &lemmas).is_empty());
    }
}

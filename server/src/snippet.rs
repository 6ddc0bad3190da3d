use searchcore::lemmatizer::Lemmatizer;

/// Characters shown around one highlighted span.
pub const SNIPPET_WINDOW: usize = 50;
/// Occurrences closer than this to the current span's end join the span.
const MAX_GAP: usize = 5;
const SEPARATOR: &str = "...";

/// Highlighted fragments for every occurrence of `forms` in `text`.
///
/// Empty when no form occurs in the text.
pub fn build_snippet(lemmatizer: &Lemmatizer, text: &str, forms: &[String]) -> String {
    let mut offsets: Vec<usize> = forms.iter().flat_map(|form| lemmatizer.locate_occurrences(text, form)).collect();
    offsets.sort_unstable();
    offsets.dedup();

    let mut snippet = String::new();
    for (start, end) in merge_spans(text, &offsets) {
        snippet.push_str(&fragment(text, start, end));
        snippet.push_str(SEPARATOR);
    }
    snippet
}

/// Groups sorted word offsets into `(start, end)` byte spans.
pub fn merge_spans(text: &str, offsets: &[usize]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for &offset in offsets {
        if let Some(last) = spans.last_mut() {
            if offset < last.1 {
                continue;
            }
            let gap = offset - last.1;
            if gap > 0 && gap < MAX_GAP {
                last.1 = word_end(text, offset);
                continue;
            }
        }
        spans.push((offset, word_end(text, offset)));
    }
    spans
}

fn word_end(text: &str, from: usize) -> usize {
    text[from..].find(char::is_whitespace).map_or(text.len(), |i| from + i)
}

fn fragment(text: &str, start: usize, end: usize) -> String {
    let matched = &text[start..end];
    let room = SNIPPET_WINDOW.saturating_sub(matched.chars().count());
    let before = context_before(&text[..start], room / 2);
    let after = context_after(&text[end..], room - room / 2);
    format!("{}<b>{matched}</b>{}", before.trim_start(), after.trim_end())
}

/// At most `n` trailing characters of `head`, without a cut-off first word.
fn context_before(head: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match head.char_indices().rev().nth(n - 1) {
        None | Some((0, _)) => head,
        Some((begin, _)) => {
            let slice = &head[begin..];
            slice.find(char::is_whitespace).map_or("", |i| &slice[i..])
        }
    }
}

/// At most `n` leading characters of `tail`, without a cut-off last word.
fn context_after(tail: &str, n: usize) -> &str {
    let Some((cut, next)) = tail.char_indices().nth(n) else {
        return tail;
    };
    let slice = &tail[..cut];
    if next.is_whitespace() {
        return slice;
    }
    slice.rfind(char::is_whitespace).map_or("", |i| &slice[..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_words_share_a_span() {
        let text = "Cats cats are great pets";
        assert_eq!(merge_spans(text, &[14, 20]), vec![(14, 24)]);
        assert_eq!(merge_spans(text, &[0, 14]), vec![(0, 4), (14, 19)]);
    }

    #[test]
    fn offsets_inside_a_span_are_absorbed() {
        let text = "great-pets forever";
        assert_eq!(merge_spans(text, &[0, 6]), vec![(0, 10)]);
    }

    #[test]
    fn highlights_merged_words() {
        let lemmatizer = Lemmatizer::english();
        let snippet = build_snippet(&lemmatizer, "Dogs dogs are great pets too", &["great".into(), "pet".into()]);
        assert_eq!(snippet, "Dogs dogs are <b>great pets</b> too...");
    }

    #[test]
    fn window_drops_partial_words() {
        let lemmatizer = Lemmatizer::english();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi rho sigma";
        let snippet = build_snippet(&lemmatizer, text, &["iota".into()]);
        assert!(snippet.contains("<b>iota</b>"));
        assert!(snippet.ends_with("..."));
        let plain = snippet.replace("<b>", "").replace("</b>", "").replace("...", "");
        assert!(plain.chars().count() <= SNIPPET_WINDOW);
        for word in plain.split_whitespace() {
            assert!(text.split_whitespace().any(|w| w == word), "{word}");
        }
    }

    #[test]
    fn no_occurrence_means_empty_snippet() {
        let lemmatizer = Lemmatizer::english();
        assert!(build_snippet(&lemmatizer, "nothing to see", &["cat".into()]).is_empty());
    }
}

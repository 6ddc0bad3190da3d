use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref DENYLIST: Regex = Regex::new(r"[\p{P}\p{S}\d]").expect("valid regex");
    static ref WORD: Regex = Regex::new(r"[^\p{P}\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref FUNCTION_WORDS: HashMap<&'static str, &'static str> = {
        let table: &[(&str, &[&str])] = &[
            ("PREP", &[
                "about","above","across","after","against","along","among","around","at","before","behind","below",
                "beneath","beside","between","beyond","by","down","during","except","for","from","in","inside","into",
                "near","of","off","on","onto","out","outside","over","past","since","through","throughout","to","toward",
                "towards","under","underneath","until","up","upon","via","with","within","without",
            ]),
            ("CONJ", &[
                "although","and","as","because","but","either","if","neither","nor","or","so","than","that","though",
                "unless","whereas","whether","while","yet",
            ]),
            ("INTJ", &["ah","alas","aha","hey","hello","hi","hmm","oh","oops","ouch","ugh","wow","yes"]),
            ("PRON", &[
                "all","any","anybody","anyone","anything","both","each","everybody","everyone","everything","few","he",
                "her","hers","herself","him","himself","his","i","it","its","itself","me","mine","my","myself","nobody",
                "none","nothing","one","other","our","ours","ourselves","own","same","she","some","somebody","someone",
                "something","such","their","theirs","them","themselves","these","they","this","those","us","we","what",
                "whatever","which","who","whoever","whom","whose","you","your","yours","yourself","yourselves",
            ]),
            ("PART", &[
                "a","again","also","am","an","are","aren","be","been","being","can","cannot","could","couldn","did",
                "didn","do","does","doesn","doing","don","further","had","hadn","has","hasn","have","haven","having",
                "here","how","is","isn","just","ll","may","might","more","most","must","mustn","no","not","once","only",
                "ought","re","shall","shan","should","shouldn","the","then","there","too","ve","very","was","wasn",
                "were","weren","when","where","why","will","won","would","wouldn",
            ]),
        ];
        let mut words = HashMap::new();
        for (tag, list) in table {
            for word in list.iter() {
                words.insert(*word, *tag);
            }
        }
        words
    };
}

const SERVICE_TAGS: [&str; 5] = ["PREP", "CONJ", "INTJ", "PRON", "PART"];

/// Dictionary lookups for a single lowercase token.
///
/// Both calls fail for tokens the dictionary does not know; callers skip such tokens.
pub trait Morphology: Send + Sync {
    fn normal_forms(&self, word: &str) -> Result<Vec<String>>;
    /// Tags in the form `"{normal form}|{part of speech}"`.
    fn morph_info(&self, word: &str) -> Result<Vec<String>>;
}

/// Snowball English stemmer plus a closed table of function words.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishMorphology;

impl EnglishMorphology {
    fn checked(word: &str) -> Result<String> {
        let normalized = word.nfkc().collect::<String>().to_lowercase();
        if normalized.is_empty() || !normalized.chars().all(char::is_alphabetic) {
            return Err(anyhow!("unknown word: {word:?}"));
        }
        Ok(normalized)
    }
}

impl Morphology for EnglishMorphology {
    fn normal_forms(&self, word: &str) -> Result<Vec<String>> {
        let word = Self::checked(word)?;
        Ok(vec![STEMMER.stem(&word).into_owned()])
    }

    fn morph_info(&self, word: &str) -> Result<Vec<String>> {
        let word = Self::checked(word)?;
        let pos = match FUNCTION_WORDS.get(word.as_str()) {
            Some(tag) => *tag,
            None if word.chars().count() == 1 => "X",
            None => "LEX",
        };
        Ok(vec![format!("{word}|{pos}")])
    }
}

/// Maps text to lemmas, dropping symbols, digits and function words.
pub struct Lemmatizer {
    morphology: Box<dyn Morphology>,
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Lemmatizer {
    pub fn new(morphology: impl Morphology + 'static) -> Self {
        Self { morphology: Box::new(morphology) }
    }

    pub fn english() -> Self {
        Self::new(EnglishMorphology)
    }

    /// Normal forms of one token, or nothing when it is a service word or unknown.
    pub fn lemmas(&self, word: &str) -> Vec<String> {
        let word = word.to_lowercase();
        if word.is_empty() {
            return Vec::new();
        }
        let forms = match self.morphology.normal_forms(&word) {
            Ok(forms) => forms,
            Err(err) => {
                tracing::trace!(%err, "token skipped");
                return Vec::new();
            }
        };
        match self.is_service_word(&word) {
            Ok(false) => forms,
            Ok(true) => Vec::new(),
            Err(err) => {
                tracing::trace!(%err, "token skipped");
                Vec::new()
            }
        }
    }

    fn is_service_word(&self, word: &str) -> Result<bool> {
        let tags = self.morphology.morph_info(word)?;
        Ok(tags
            .iter()
            .any(|tag| tag.chars().count() <= 3 || SERVICE_TAGS.iter().any(|s| tag.contains(s))))
    }

    /// Multiset of lemmas in `text`, as form -> occurrence count.
    pub fn lemma_counts(&self, text: &str) -> HashMap<String, u32> {
        let cleaned = DENYLIST.replace_all(text, " ").to_lowercase();
        let mut counts = HashMap::new();
        for token in cleaned.split_whitespace() {
            for form in self.lemmas(token) {
                *counts.entry(form).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Lemmas of a search query in query order, without repeats.
    pub fn query_lemmas(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for token in query.to_lowercase().split_whitespace() {
            for form in self.lemmas(token) {
                if seen.insert(form.clone()) {
                    out.push(form);
                }
            }
        }
        out
    }

    /// Byte offsets of every token in `text` whose lemmas include `form`, ascending.
    pub fn locate_occurrences(&self, text: &str, form: &str) -> Vec<usize> {
        WORD.find_iter(text)
            .filter(|m| self.lemmas(m.as_str()).iter().any(|l| l == form))
            .map(|m| m.start())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lemmas_and_drops_function_words() {
        let lemmatizer = Lemmatizer::english();
        let counts = lemmatizer.lemma_counts("Cats are great pets, and cats purr.");
        assert_eq!(counts.get("cat"), Some(&2));
        assert_eq!(counts.get("pet"), Some(&1));
        assert!(!counts.contains_key("are"));
        assert!(!counts.contains_key("and"));
    }

    #[test]
    fn digits_and_symbols_never_become_lemmas() {
        let lemmatizer = Lemmatizer::english();
        let counts = lemmatizer.lemma_counts("2024 © №5 — 42kg");
        assert_eq!(counts.get("kg"), Some(&1));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn locates_inflected_forms() {
        let lemmatizer = Lemmatizer::english();
        let text = "Dogs, dog; DOGMA the dog.";
        let offsets = lemmatizer.locate_occurrences(text, "dog");
        assert_eq!(offsets, vec![0, 6, 21]);
    }

    #[test]
    fn failing_tokens_are_skipped() {
        struct Picky;
        impl Morphology for Picky {
            fn normal_forms(&self, word: &str) -> Result<Vec<String>> {
                if word == "boom" {
                    return Err(anyhow!("no such word"));
                }
                Ok(vec![word.to_string()])
            }
            fn morph_info(&self, word: &str) -> Result<Vec<String>> {
                Ok(vec![format!("{word}|LEX")])
            }
        }
        let lemmatizer = Lemmatizer::new(Picky);
        let counts = lemmatizer.lemma_counts("boom rocket");
        assert_eq!(counts.len(), 1);
        assert!(counts.contains_key("rocket"));
    }

    #[test]
    fn query_lemmas_keep_order_without_repeats() {
        let lemmatizer = Lemmatizer::english();
        assert_eq!(lemmatizer.query_lemmas("Great pets and PETS"), vec!["great", "pet"]);
    }
}

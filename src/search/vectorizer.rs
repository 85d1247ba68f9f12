//! TF-IDF vector space over a fixed document collection

use super::stop_words::ENGLISH_STOP_WORDS;
use super::SearchError;
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use regex::Regex;

/// Unicode words of two or more characters
const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// Sparse vector as (term index, weight) pairs sorted by term index
pub type SparseVector = Vec<(usize, f32)>;

/// Lexical vector space fitted once on a corpus
///
/// Weights are raw term counts times smoothed idf,
/// `ln((1 + n) / (1 + df)) + 1`, and every vector is L2-normalized so cosine
/// similarity reduces to a dot product. Queries are projected onto the
/// fitted vocabulary; unseen terms are dropped.
#[derive(Debug, Clone)]
pub struct VectorSpaceModel {
    token_pattern: Regex,
    stop_words: HashSet<&'static str>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    documents: Vec<SparseVector>,
}

impl VectorSpaceModel {
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Result<Self, SearchError> {
        let token_pattern = Regex::new(TOKEN_PATTERN)?;
        let mut stop_words = HashSet::with_capacity(ENGLISH_STOP_WORDS.len());
        stop_words.extend(ENGLISH_STOP_WORDS.iter().copied());

        let mut model = Self {
            token_pattern,
            stop_words,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            documents: Vec::new(),
        };

        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| model.tokenize(t.as_ref())).collect();

        // Vocabulary indices follow sorted term order
        let mut terms: Vec<&str> = tokenized.iter().flatten().map(String::as_str).collect();
        terms.sort_unstable();
        terms.dedup();
        model.vocabulary = terms
            .iter()
            .enumerate()
            .map(|(index, term)| (term.to_string(), index))
            .collect();

        let mut document_frequency = vec![0usize; terms.len()];
        let counts: Vec<HashMap<usize, f32>> = tokenized
            .iter()
            .map(|tokens| {
                let counts = model.count_terms(tokens);
                for term in counts.keys() {
                    document_frequency[*term] += 1;
                }
                counts
            })
            .collect();

        let n = texts.len() as f64;
        model.idf = document_frequency
            .iter()
            .map(|&df| (((1.0 + n) / (1.0 + df as f64)).ln() + 1.0) as f32)
            .collect();

        model.documents = counts.into_iter().map(|c| model.weigh(c)).collect();

        tracing::debug!(
            "Fitted TF-IDF space: {} documents, {} terms",
            model.documents.len(),
            model.vocabulary.len()
        );

        Ok(model)
    }

    /// Weighted, normalized vector of `text` in the fitted space
    pub fn transform(&self, text: &str) -> SparseVector {
        let tokens = self.tokenize(text);
        self.weigh(self.count_terms(&tokens))
    }

    /// Cosine similarity of `query` against every fitted document
    pub fn similarities(&self, query: &str) -> Vec<f32> {
        let query: HashMap<usize, f32> = self.transform(query).into_iter().collect();
        self.documents
            .iter()
            .map(|doc| {
                doc.iter()
                    .filter_map(|(term, weight)| query.get(term).map(|q| q * weight))
                    .fold(0.0, |total, product| total + product)
            })
            .collect()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.token_pattern
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| !self.stop_words.contains(*token))
            .map(str::to_string)
            .collect()
    }

    fn count_terms(&self, tokens: &[String]) -> HashMap<usize, f32> {
        let mut counts = HashMap::new();
        for token in tokens {
            if let Some(&term) = self.vocabulary.get(token) {
                *counts.entry(term).or_insert(0.0) += 1.0;
            }
        }
        counts
    }

    fn weigh(&self, counts: HashMap<usize, f32>) -> SparseVector {
        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(term, count)| (term, count * self.idf[term]))
            .collect();
        vector.sort_unstable_by_key(|(term, _)| *term);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, weight) in vector.iter_mut() {
                *weight /= norm;
            }
        }
        vector
    }
}

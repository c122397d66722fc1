use crate::models::item::GeneratedItem;
use crate::utils::text::{book_of, normalize, question_kind, rolling_hash, significant_tokens};
use std::collections::HashSet;
use std::fmt;

const SIMILARITY_THRESHOLD: f64 = 0.4;
const BOOK_SHARE_LIMIT_PERCENT: usize = 20;
const MIN_ACCEPTED_FOR_SHARE_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateReason {
    ExactText,
    HashMatch,
    ReferenceReused(String),
    SimilarText { overlap: f64, book: String },
    BookOverused(String),
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::ExactText => write!(f, "identical question text"),
            DuplicateReason::HashMatch => write!(f, "question hash already seen"),
            DuplicateReason::ReferenceReused(r) => write!(f, "reference {} already used", r),
            DuplicateReason::SimilarText { overlap, book } => {
                write!(f, "too similar to an existing item ({:.2} overlap, {})", overlap, book)
            }
            DuplicateReason::BookOverused(b) => write!(f, "{} is over-represented in the batch", b),
        }
    }
}

#[derive(Debug, Default)]
pub struct DuplicateGuard {
    seen_hashes: HashSet<u32>,
    used_references: HashSet<String>,
}

impl DuplicateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, candidate: &GeneratedItem, accepted: &[GeneratedItem]) -> bool {
        self.check(candidate, accepted).is_some()
    }

    /// Runs the checks in order and returns the first one that fires.
    pub fn check(
        &self,
        candidate: &GeneratedItem,
        accepted: &[GeneratedItem],
    ) -> Option<DuplicateReason> {
        let text = normalize(&candidate.text);

        if accepted.iter().any(|a| normalize(&a.text) == text) {
            return Some(DuplicateReason::ExactText);
        }

        if self.seen_hashes.contains(&rolling_hash(&text)) {
            return Some(DuplicateReason::HashMatch);
        }

        let reference = reference_key(&candidate.reference);
        if self.used_references.contains(&reference)
            || accepted.iter().any(|a| reference_key(&a.reference) == reference)
        {
            return Some(DuplicateReason::ReferenceReused(candidate.reference.clone()));
        }

        let book = book_of(&candidate.reference).to_lowercase();
        let tokens = significant_tokens(&candidate.text);
        let kind = question_kind(&candidate.text);
        for existing in accepted {
            let overlap = token_overlap(&tokens, &significant_tokens(&existing.text));
            if overlap <= SIMILARITY_THRESHOLD {
                continue;
            }
            let same_book = book_of(&existing.reference).to_lowercase() == book;
            let same_kind = kind.is_some() && kind == question_kind(&existing.text);
            if same_book || same_kind {
                return Some(DuplicateReason::SimilarText {
                    overlap,
                    book: book_of(&existing.reference).to_string(),
                });
            }
        }

        if accepted.len() >= MIN_ACCEPTED_FOR_SHARE_LIMIT {
            let same_book = accepted
                .iter()
                .filter(|a| book_of(&a.reference).to_lowercase() == book)
                .count();
            if same_book * 100 > BOOK_SHARE_LIMIT_PERCENT * accepted.len() {
                return Some(DuplicateReason::BookOverused(
                    book_of(&candidate.reference).to_string(),
                ));
            }
        }

        None
    }

    pub fn remember(&mut self, item: &GeneratedItem) {
        self.seen_hashes.insert(rolling_hash(&normalize(&item.text)));
        self.used_references.insert(reference_key(&item.reference));
    }
}

fn reference_key(reference: &str) -> String {
    reference.trim().to_lowercase()
}

/// Shared tokens divided by the larger token count of the two texts.
pub fn token_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / denom as f64
}

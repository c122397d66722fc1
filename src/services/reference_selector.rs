use crate::models::item::Difficulty;
use crate::services::canon::{self, Testament};
use crate::utils::text::book_of;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const MAX_LOCATOR_ATTEMPTS: usize = 20;
const BOOK_SHARE_CAP_PERCENT: usize = 25;
const MIN_BATCH_FOR_SHARE_CAP: usize = 4;
const UNUSED_BOOK_BONUS: f64 = 1.2;
const UNKNOWN_BOOK_CHAPTERS: u32 = 20;
const UNKNOWN_BOOK_VERSES: u32 = 30;

fn tier_bonus(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 1.2,
        Difficulty::Medium => 1.3,
        Difficulty::Hard => 1.5,
        Difficulty::Expert => 1.6,
    }
}

/// Reference usage across every generator in the running process.
#[derive(Debug, Default)]
pub struct SessionUsage {
    counts: Mutex<HashMap<String, u32>>,
}

impl SessionUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, reference: &str) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(reference.to_string()).or_insert(0) += 1;
        }
    }

    pub fn count(&self, reference: &str) -> u32 {
        self.counts
            .lock()
            .map(|c| c.get(reference).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.lock().map(|c| c.values().sum()).unwrap_or(0)
    }

    pub fn top(&self, limit: usize) -> Vec<(String, u32)> {
        let mut entries: Vec<(String, u32)> = match self.counts.lock() {
            Ok(c) => c.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            Err(_) => return Vec::new(),
        };
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        entries
    }
}

/// Picks references for one batch while avoiding reuse and steering the testament mix.
pub struct ReferenceSelector {
    batch_usage: HashMap<String, u32>,
    book_usage: HashMap<String, usize>,
    global_usage: HashMap<String, u32>,
    testaments: Vec<Testament>,
    session: Arc<SessionUsage>,
    old_target_percent: usize,
}

impl ReferenceSelector {
    pub fn new(session: Arc<SessionUsage>, old_target_percent: u32) -> Self {
        Self {
            batch_usage: HashMap::new(),
            book_usage: HashMap::new(),
            global_usage: HashMap::new(),
            testaments: Vec::new(),
            session,
            old_target_percent: old_target_percent.min(100) as usize,
        }
    }

    pub fn begin_batch(&mut self, global_usage: HashMap<String, u32>) {
        self.batch_usage.clear();
        self.book_usage.clear();
        self.testaments.clear();
        self.global_usage = global_usage;
    }

    pub fn select_reference<R: Rng + ?Sized>(
        &mut self,
        pool: &[&str],
        difficulty: Difficulty,
        rng: &mut R,
    ) -> Option<String> {
        let eligible = self.eligible_books(pool);
        let candidates = self.apply_mix_rule(eligible);

        let weighted: Vec<(&str, f64)> = candidates
            .iter()
            .map(|name| (*name, self.book_weight(name, difficulty)))
            .collect();
        let book = weighted
            .choose_weighted(rng, |(_, w)| *w)
            .map(|(name, _)| *name)
            .ok()?;

        let reference = self.pick_locator(book, rng);
        self.record(&reference);
        Some(reference)
    }

    /// Frees the testament slot; the reference stays used for the rest of the batch.
    pub fn release(&mut self, reference: &str) {
        if let Some(testament) = canon::testament_of(book_of(reference)) {
            if let Some(pos) = self.testaments.iter().rposition(|t| *t == testament) {
                self.testaments.remove(pos);
            }
        }
    }

    pub fn testament_counts(&self) -> (usize, usize) {
        let old = self
            .testaments
            .iter()
            .filter(|t| **t == Testament::Old)
            .count();
        (old, self.testaments.len() - old)
    }

    pub fn batch_len(&self) -> usize {
        self.batch_usage.values().map(|v| *v as usize).sum()
    }

    fn record(&mut self, reference: &str) {
        *self.batch_usage.entry(reference.to_string()).or_insert(0) += 1;
        *self
            .book_usage
            .entry(book_of(reference).to_string())
            .or_insert(0) += 1;
        if let Some(testament) = canon::testament_of(book_of(reference)) {
            self.testaments.push(testament);
        }
        self.session.record(reference);
    }

    fn eligible_books<'a>(&self, pool: &[&'a str]) -> Vec<&'a str> {
        let batch_len = self.batch_len();
        if batch_len < MIN_BATCH_FOR_SHARE_CAP {
            return pool.to_vec();
        }
        let filtered: Vec<&str> = pool
            .iter()
            .copied()
            .filter(|name| {
                let used = self.book_usage.get(*name).copied().unwrap_or(0);
                used * 100 <= BOOK_SHARE_CAP_PERCENT * batch_len
            })
            .collect();
        if filtered.is_empty() {
            pool.to_vec()
        } else {
            filtered
        }
    }

    fn apply_mix_rule<'a>(&self, books: Vec<&'a str>) -> Vec<&'a str> {
        let produced = self.testaments.len();
        if produced == 0 {
            return books;
        }
        let (old, new) = self.testament_counts();
        let wanted = if old * 100 < self.old_target_percent * produced {
            Testament::Old
        } else if new * 100 < (100 - self.old_target_percent) * produced {
            Testament::New
        } else {
            return books;
        };
        let restricted: Vec<&str> = books
            .iter()
            .copied()
            .filter(|name| canon::testament_of(name) == Some(wanted))
            .collect();
        if restricted.is_empty() {
            books
        } else {
            restricted
        }
    }

    fn book_weight(&self, name: &str, difficulty: Difficulty) -> f64 {
        let mut weight = 1.0;
        if canon::find(name).is_some_and(|b| b.tier == difficulty) {
            weight *= tier_bonus(difficulty);
        }
        if !self.book_usage.contains_key(name) {
            weight *= UNUSED_BOOK_BONUS;
        }
        weight
    }

    fn is_fresh(&self, reference: &str) -> bool {
        !self.batch_usage.contains_key(reference)
            && self.global_usage.get(reference).copied().unwrap_or(0) == 0
    }

    fn pick_locator<R: Rng + ?Sized>(&self, book: &str, rng: &mut R) -> String {
        let mut batch_fresh: Option<String> = None;
        let mut last = String::new();

        for _ in 0..MAX_LOCATOR_ATTEMPTS {
            let candidate = random_locator(book, rng);
            if self.is_fresh(&candidate) {
                return candidate;
            }
            if batch_fresh.is_none() && !self.batch_usage.contains_key(&candidate) {
                batch_fresh = Some(candidate.clone());
            }
            last = candidate;
        }

        let fallback = batch_fresh.unwrap_or(last);
        tracing::warn!(
            book = %book,
            reference = %fallback,
            attempts = MAX_LOCATOR_ATTEMPTS,
            "No unused reference found, falling back to a recently used one"
        );
        fallback
    }
}

fn random_locator<R: Rng + ?Sized>(book: &str, rng: &mut R) -> String {
    match canon::find(book) {
        Some(entry) => {
            let chapters: Vec<(usize, u16)> = entry.verses.iter().copied().enumerate().collect();
            let (idx, verses) = chapters
                .choose_weighted(rng, |(_, v)| f64::from(*v))
                .copied()
                .unwrap_or((0, entry.verses[0]));
            let verse = rng.gen_range(1..=u32::from(verses.max(1)));
            format!("{} {}:{}", entry.name, idx + 1, verse)
        }
        None => {
            let chapter = rng.gen_range(1..=UNKNOWN_BOOK_CHAPTERS);
            let verse = rng.gen_range(1..=UNKNOWN_BOOK_VERSES);
            format!("{} {}:{}", book.trim(), chapter, verse)
        }
    }
}

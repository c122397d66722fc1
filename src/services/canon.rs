use crate::models::item::Difficulty;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Testament {
    Old,
    New,
}

#[derive(Debug)]
pub struct Book {
    pub name: &'static str,
    pub testament: Testament,
    pub tier: Difficulty,
    pub verses: &'static [u16],
}

impl Book {
    pub fn chapters(&self) -> usize {
        self.verses.len()
    }
}

use Difficulty::{Easy, Expert, Hard, Medium};
use Testament::{New, Old};

pub static BOOKS: &[Book] = &[
    Book {
        name: "Genesis",
        testament: Old,
        tier: Easy,
        verses: &[
            31, 25, 24, 26, 32, 22, 24, 22, 29, 32, 32, 20, 18, 24, 21, 16, 27, 33, 38, 18, 34,
            24, 20, 67, 34, 35, 46, 22, 35, 43, 55, 32, 20, 31, 29, 43, 36, 30, 23, 23, 57, 38,
            34, 34, 28, 34, 31, 22, 33, 26,
        ],
    },
    Book {
        name: "Exodus",
        testament: Old,
        tier: Easy,
        verses: &[
            22, 25, 22, 31, 23, 30, 25, 32, 35, 29, 10, 51, 22, 31, 27, 36, 16, 27, 25, 26, 36,
            31, 33, 18, 40, 37, 21, 43, 46, 38, 18, 35, 23, 35, 35, 38, 29, 31, 43, 38,
        ],
    },
    Book {
        name: "Joshua",
        testament: Old,
        tier: Medium,
        verses: &[
            18, 24, 17, 24, 15, 27, 26, 35, 27, 43, 23, 24, 33, 15, 63, 10, 18, 28, 51, 9, 45,
            34, 16, 33,
        ],
    },
    Book {
        name: "Judges",
        testament: Old,
        tier: Medium,
        verses: &[
            36, 23, 31, 24, 31, 40, 25, 35, 57, 18, 40, 15, 25, 20, 20, 31, 13, 31, 30, 48, 25,
        ],
    },
    Book {
        name: "Ruth",
        testament: Old,
        tier: Easy,
        verses: &[22, 23, 18, 22],
    },
    Book {
        name: "1 Samuel",
        testament: Old,
        tier: Medium,
        verses: &[
            28, 36, 21, 22, 12, 21, 17, 22, 27, 27, 15, 25, 23, 52, 35, 23, 58, 30, 24, 42, 15,
            23, 29, 22, 44, 25, 12, 25, 11, 31, 13,
        ],
    },
    Book {
        name: "Nehemiah",
        testament: Old,
        tier: Hard,
        verses: &[11, 20, 32, 23, 19, 19, 73, 18, 38, 39, 36, 47, 31],
    },
    Book {
        name: "Esther",
        testament: Old,
        tier: Medium,
        verses: &[22, 23, 15, 17, 14, 14, 10, 17, 32, 3],
    },
    Book {
        name: "Proverbs",
        testament: Old,
        tier: Easy,
        verses: &[
            33, 22, 35, 27, 23, 35, 27, 36, 18, 32, 31, 28, 25, 35, 33, 33, 28, 24, 29, 30, 31,
            29, 35, 34, 28, 28, 27, 28, 27, 33, 31,
        ],
    },
    Book {
        name: "Ecclesiastes",
        testament: Old,
        tier: Hard,
        verses: &[18, 26, 22, 16, 20, 12, 29, 17, 18, 20, 10, 14],
    },
    Book {
        name: "Song of Solomon",
        testament: Old,
        tier: Expert,
        verses: &[17, 17, 11, 16, 16, 13, 13, 14],
    },
    Book {
        name: "Lamentations",
        testament: Old,
        tier: Hard,
        verses: &[22, 22, 66, 22, 22],
    },
    Book {
        name: "Daniel",
        testament: Old,
        tier: Easy,
        verses: &[21, 49, 30, 37, 31, 28, 28, 27, 27, 21, 45, 13],
    },
    Book {
        name: "Joel",
        testament: Old,
        tier: Expert,
        verses: &[20, 32, 21],
    },
    Book {
        name: "Obadiah",
        testament: Old,
        tier: Expert,
        verses: &[21],
    },
    Book {
        name: "Jonah",
        testament: Old,
        tier: Easy,
        verses: &[17, 10, 10, 11],
    },
    Book {
        name: "Micah",
        testament: Old,
        tier: Hard,
        verses: &[16, 13, 12, 13, 15, 16, 20],
    },
    Book {
        name: "Nahum",
        testament: Old,
        tier: Expert,
        verses: &[15, 13, 19],
    },
    Book {
        name: "Habakkuk",
        testament: Old,
        tier: Expert,
        verses: &[17, 20, 19],
    },
    Book {
        name: "Zephaniah",
        testament: Old,
        tier: Expert,
        verses: &[18, 15, 20],
    },
    Book {
        name: "Haggai",
        testament: Old,
        tier: Expert,
        verses: &[15, 23],
    },
    Book {
        name: "Matthew",
        testament: New,
        tier: Easy,
        verses: &[
            25, 23, 17, 25, 48, 34, 29, 34, 38, 42, 30, 50, 58, 36, 39, 28, 27, 35, 30, 34, 46,
            46, 39, 51, 46, 75, 66, 20,
        ],
    },
    Book {
        name: "Mark",
        testament: New,
        tier: Easy,
        verses: &[45, 28, 35, 41, 43, 56, 37, 38, 50, 52, 33, 44, 37, 72, 47, 20],
    },
    Book {
        name: "Luke",
        testament: New,
        tier: Easy,
        verses: &[
            80, 52, 38, 44, 39, 49, 50, 56, 62, 42, 54, 59, 35, 35, 32, 31, 37, 43, 48, 47, 38,
            71, 56, 53,
        ],
    },
    Book {
        name: "John",
        testament: New,
        tier: Easy,
        verses: &[
            51, 25, 36, 54, 47, 71, 53, 59, 41, 42, 57, 50, 38, 31, 27, 33, 26, 40, 42, 31, 25,
        ],
    },
    Book {
        name: "Acts",
        testament: New,
        tier: Easy,
        verses: &[
            26, 47, 26, 37, 42, 15, 60, 40, 43, 48, 30, 25, 52, 28, 41, 40, 34, 28, 41, 38, 40,
            30, 35, 27, 27, 32, 44, 31,
        ],
    },
    Book {
        name: "Romans",
        testament: New,
        tier: Medium,
        verses: &[32, 29, 31, 25, 21, 23, 25, 39, 33, 21, 36, 21, 14, 23, 33, 27],
    },
    Book {
        name: "Galatians",
        testament: New,
        tier: Medium,
        verses: &[24, 21, 29, 31, 26, 18],
    },
    Book {
        name: "Ephesians",
        testament: New,
        tier: Medium,
        verses: &[23, 22, 21, 32, 33, 24],
    },
    Book {
        name: "Philippians",
        testament: New,
        tier: Medium,
        verses: &[30, 30, 21, 23],
    },
    Book {
        name: "Colossians",
        testament: New,
        tier: Hard,
        verses: &[29, 23, 25, 18],
    },
    Book {
        name: "2 Timothy",
        testament: New,
        tier: Hard,
        verses: &[18, 26, 17, 22],
    },
    Book {
        name: "Titus",
        testament: New,
        tier: Hard,
        verses: &[16, 15, 15],
    },
    Book {
        name: "Philemon",
        testament: New,
        tier: Expert,
        verses: &[25],
    },
    Book {
        name: "Hebrews",
        testament: New,
        tier: Hard,
        verses: &[14, 18, 19, 16, 14, 20, 28, 13, 28, 39, 40, 29, 25],
    },
    Book {
        name: "James",
        testament: New,
        tier: Medium,
        verses: &[27, 26, 18, 17, 20],
    },
    Book {
        name: "1 Peter",
        testament: New,
        tier: Medium,
        verses: &[25, 25, 22, 19, 14],
    },
    Book {
        name: "1 John",
        testament: New,
        tier: Medium,
        verses: &[10, 29, 24, 21, 21],
    },
    Book {
        name: "Jude",
        testament: New,
        tier: Expert,
        verses: &[25],
    },
    Book {
        name: "Revelation",
        testament: New,
        tier: Medium,
        verses: &[
            20, 29, 22, 11, 14, 17, 17, 13, 21, 11, 19, 17, 18, 20, 8, 21, 18, 24, 21, 15, 27,
            21,
        ],
    },
];

pub fn find(name: &str) -> Option<&'static Book> {
    BOOKS.iter().find(|b| b.name.eq_ignore_ascii_case(name.trim()))
}

pub fn book_names() -> Vec<&'static str> {
    BOOKS.iter().map(|b| b.name).collect()
}

pub fn testament_of(name: &str) -> Option<Testament> {
    find(name).map(|b| b.testament)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_well_formed() {
        for book in BOOKS {
            assert!(!book.verses.is_empty(), "{} has no chapters", book.name);
            assert!(book.verses.iter().all(|v| *v > 0), "{} has an empty chapter", book.name);
        }
        let names: std::collections::HashSet<_> = BOOKS.iter().map(|b| b.name).collect();
        assert_eq!(names.len(), BOOKS.len());
    }

    #[test]
    fn both_testaments_and_all_tiers_are_represented() {
        assert!(BOOKS.iter().any(|b| b.testament == Testament::Old));
        assert!(BOOKS.iter().any(|b| b.testament == Testament::New));
        for d in Difficulty::ALL {
            assert!(BOOKS.iter().any(|b| b.tier == d), "no books for {}", d);
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find("1 samuel").map(|b| b.chapters()), Some(31));
        assert_eq!(testament_of("Jude"), Some(Testament::New));
        assert!(find("Maccabees").is_none());
    }
}

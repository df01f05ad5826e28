//! Keyword heuristics for book categories, tags and forum popularity.
//!
//! Everything here is pure: the same book always yields the same category and
//! tags, and popularity depends only on its inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{models::Book, timestamp::Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookCategory {
    #[serde(rename = "소설")]
    Fiction,
    #[serde(rename = "에세이")]
    Essay,
    #[serde(rename = "자기계발")]
    SelfHelp,
    #[serde(rename = "경제/경영")]
    Business,
    #[serde(rename = "인문/사회")]
    Humanities,
    #[serde(rename = "과학/기술")]
    Science,
    #[serde(rename = "역사")]
    History,
    #[serde(rename = "어린이/청소년")]
    Youth,
    #[serde(rename = "기타")]
    Other,
}

impl BookCategory {
    /// Matching order; the first category with a keyword hit wins.
    pub const ALL: [BookCategory; 9] = [
        Self::Fiction,
        Self::Essay,
        Self::SelfHelp,
        Self::Business,
        Self::Humanities,
        Self::Science,
        Self::History,
        Self::Youth,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fiction => "소설",
            Self::Essay => "에세이",
            Self::SelfHelp => "자기계발",
            Self::Business => "경제/경영",
            Self::Humanities => "인문/사회",
            Self::Science => "과학/기술",
            Self::History => "역사",
            Self::Youth => "어린이/청소년",
            Self::Other => "기타",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == label)
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Fiction => &["소설", "장편", "단편", "novel", "fiction", "문학"],
            Self::Essay => &["에세이", "산문", "수필", "essay"],
            Self::SelfHelp => &["자기계발", "습관", "성공", "동기부여", "self-help", "리더십"],
            Self::Business => &["경제", "경영", "투자", "주식", "마케팅", "부동산", "business", "finance"],
            Self::Humanities => &["인문", "사회", "철학", "심리", "정치", "사회학", "philosophy"],
            Self::Science => &["과학", "기술", "물리", "화학", "생물", "우주", "프로그래밍", "science", "technology"],
            Self::History => &["역사", "history", "조선", "세계사", "한국사"],
            Self::Youth => &["어린이", "청소년", "동화", "아동", "그림책", "children"],
            Self::Other => &[],
        }
    }
}

impl fmt::Display for BookCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookTag {
    #[serde(rename = "힐링")]
    Healing,
    #[serde(rename = "성장")]
    Growth,
    #[serde(rename = "사랑")]
    Love,
    #[serde(rename = "추리")]
    Mystery,
    #[serde(rename = "판타지")]
    Fantasy,
    #[serde(rename = "SF")]
    ScienceFiction,
    #[serde(rename = "철학")]
    Philosophy,
    #[serde(rename = "심리")]
    Psychology,
    #[serde(rename = "투자")]
    Investing,
    #[serde(rename = "고전")]
    Classic,
}

impl BookTag {
    pub const ALL: [BookTag; 10] = [
        Self::Healing,
        Self::Growth,
        Self::Love,
        Self::Mystery,
        Self::Fantasy,
        Self::ScienceFiction,
        Self::Philosophy,
        Self::Psychology,
        Self::Investing,
        Self::Classic,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healing => "힐링",
            Self::Growth => "성장",
            Self::Love => "사랑",
            Self::Mystery => "추리",
            Self::Fantasy => "판타지",
            Self::ScienceFiction => "SF",
            Self::Philosophy => "철학",
            Self::Psychology => "심리",
            Self::Investing => "투자",
            Self::Classic => "고전",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Healing => &["힐링", "위로", "치유", "행복", "마음"],
            Self::Growth => &["성장", "청춘", "도전", "꿈"],
            Self::Love => &["사랑", "연애", "로맨스", "romance", "love"],
            Self::Mystery => &["추리", "미스터리", "탐정", "살인", "스릴러", "mystery"],
            Self::Fantasy => &["판타지", "마법", "fantasy", "드래곤"],
            Self::ScienceFiction => &["sf", "공상과학", "로봇", "외계", "미래"],
            Self::Philosophy => &["철학", "니체", "philosophy", "존재"],
            Self::Psychology => &["심리", "마음챙김", "psychology", "감정"],
            Self::Investing => &["투자", "주식", "재테크", "부자"],
            Self::Classic => &["고전", "classic", "세계문학"],
        }
    }
}

impl fmt::Display for BookTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased title, authors, publisher and contents joined for matching.
fn haystack(book: &Book) -> String {
    let mut text = String::with_capacity(book.title.len() + book.publisher.len() + book.contents.len() + 16);
    text.push_str(&book.title);
    for author in &book.authors {
        text.push(' ');
        text.push_str(author);
    }
    text.push(' ');
    text.push_str(&book.publisher);
    text.push(' ');
    text.push_str(&book.contents);
    text.to_lowercase()
}

pub fn categorize_book(book: &Book) -> BookCategory {
    let text = haystack(book);
    BookCategory::ALL
        .into_iter()
        .find(|category| category.keywords().iter().any(|keyword| text.contains(keyword)))
        .unwrap_or(BookCategory::Other)
}

pub fn tag_book(book: &Book) -> Vec<BookTag> {
    let text = haystack(book);
    BookTag::ALL
        .into_iter()
        .filter(|tag| tag.keywords().iter().any(|keyword| text.contains(keyword)))
        .collect()
}

/// `post_count * 10 - whole days since last activity`. Unbounded below.
pub fn calculate_popularity(post_count: i64, last_activity: Option<Timestamp>, now: Timestamp) -> i64 {
    let days = last_activity.map(|at| at.days_until(now)).unwrap_or(0);
    post_count.saturating_mul(10).saturating_sub(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn book(title: &str, contents: &str) -> Book {
        Book {
            isbn: "9788937460449".into(),
            title: title.into(),
            authors: vec!["작가".into()],
            publisher: "민음사".into(),
            thumbnail: String::new(),
            contents: contents.into(),
        }
    }

    #[test]
    fn first_matching_category_wins() {
        let novel = book("데미안", "헤르만 헤세의 성장 소설");
        assert_eq!(categorize_book(&novel), BookCategory::Fiction);
        let history = book("조선왕조실록", "역사 이야기");
        assert_eq!(categorize_book(&history), BookCategory::History);
    }

    #[test]
    fn unmatched_book_is_other_and_deterministic() {
        let plain = book("무제", "");
        assert_eq!(categorize_book(&plain), BookCategory::Other);
        assert_eq!(categorize_book(&plain), categorize_book(&plain.clone()));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let english = book("The Art of Fiction", "");
        assert_eq!(categorize_book(&english), BookCategory::Fiction);
        assert_eq!(tag_book(&book("SF Stories", "")), vec![BookTag::ScienceFiction]);
    }

    #[test]
    fn tags_follow_fixed_order() {
        let tags = tag_book(&book("사랑과 추리", "위로가 되는 이야기"));
        assert_eq!(tags, vec![BookTag::Healing, BookTag::Love, BookTag::Mystery]);
    }

    #[test]
    fn popularity_decays_one_point_per_day() {
        let now = Timestamp::now();
        let three_days_ago = now.plus(Duration::days(-3));
        assert_eq!(calculate_popularity(5, Some(three_days_ago), now), 47);
        let long_ago = now.plus(Duration::days(-400));
        assert_eq!(calculate_popularity(0, Some(long_ago), now), -400);
    }

    #[test]
    fn category_labels_round_trip() {
        for category in BookCategory::ALL {
            assert_eq!(BookCategory::parse(category.as_str()), Some(category));
        }
    }
}

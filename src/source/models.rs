use serde::Serialize;
use std::collections::BTreeMap;

/// Publication status as reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    #[default]
    Unknown,
}

impl MangaStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "ongoing" => MangaStatus::Ongoing,
            "completed" | "complete" => MangaStatus::Completed,
            _ => MangaStatus::Unknown,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub current_page: u32,
    pub has_next_page: bool,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub description: String,
    pub status: MangaStatus,
}

/// Metadata and chapter list for one series.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub status: MangaStatus,
    pub genres: Vec<String>,
    pub authors: Vec<String>,
    pub chapters: Vec<ChapterSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummary {
    /// `{manga_id}/{chapter_id}`, usable with `fetch_pages`.
    pub id: String,
    pub title: String,
    pub chapter_number: Option<f64>,
    pub released_date: Option<String>,
}

/// One image of a chapter, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page: u32,
    pub img: String,
    /// Extra request headers the image host expects, e.g. `Referer`.
    pub header_for_image: BTreeMap<String, String>,
}

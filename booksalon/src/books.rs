//! External book lookup (Kakao book search API).

use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{RemoteService, SalonError, ValidationError},
    models::Book,
    validators::{is_valid_isbn, strip_whitespace},
};

pub const DEFAULT_BOOK_API_BASE: &str = "https://dapi.kakao.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchTarget {
    Isbn,
    #[default]
    Title,
}

impl SearchTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isbn => "isbn",
            Self::Title => "title",
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait BookLookup {
    async fn search(&self, query: &str, target: SearchTarget) -> Result<Vec<Book>, SalonError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<RawBook>,
}

#[derive(Debug, Deserialize)]
struct RawBook {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    contents: String,
    #[serde(default)]
    isbn: String,
}

impl From<RawBook> for Book {
    fn from(raw: RawBook) -> Self {
        Book {
            // The API returns "ISBN10 ISBN13" in one field.
            isbn: strip_whitespace(&raw.isbn),
            title: raw.title,
            authors: raw.authors,
            publisher: raw.publisher,
            thumbnail: raw.thumbnail,
            contents: raw.contents,
        }
    }
}

#[derive(Clone)]
pub struct KakaoBookClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl KakaoBookClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, SalonError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

impl BookLookup for KakaoBookClient {
    async fn search(&self, query: &str, target: SearchTarget) -> Result<Vec<Book>, SalonError> {
        let query = match target {
            SearchTarget::Isbn => strip_whitespace(query),
            SearchTarget::Title => query.trim().to_string(),
        };
        if query.is_empty() {
            return Ok(Vec::new());
        }
        if target == SearchTarget::Isbn && !is_valid_isbn(&query) {
            return Err(
                ValidationError::single("query", "validation.isbn", "isbn must be 10 or 13 digits").into(),
            );
        }
        let query = query.as_str();
        let url = format!("{}/v3/search/book", self.base_url);
        debug!("book lookup {} by {}", query, target.as_str());
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .query(&[("query", query), ("target", target.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(SalonError::remote(
                RemoteService::BookApi,
                format!("request failed: {status} - {body}"),
            ));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.documents.into_iter().map(Book::from).collect())
    }
}

//! Catalogue lookups against Google Books and Open Library, cached in Redis

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    config::{MetadataConfig, RedisConfig},
    error::{AppError, AppResult},
    isbn::Isbn,
    models::{book::MetadataSource, metadata::BookMetadata},
    services::{http, redis::RedisService},
};

const GOOGLE_BOOKS: &str = "google_books";
const OPEN_LIBRARY: &str = "open_library";
const MAX_SEARCH_RESULTS: usize = 10;

/// ISBN lookups, as used by cover analysis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IsbnLookup: Send + Sync {
    async fn lookup_isbn(&self, isbn: &str) -> AppResult<Option<BookMetadata>>;
}

/// Single-edition lookups against the two remote catalogues
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalogue: Send + Sync {
    async fn google_books(&self, isbn: &Isbn) -> AppResult<Option<BookMetadata>>;
    async fn open_library(&self, isbn: &Isbn) -> AppResult<Option<BookMetadata>>;
}

/// Google Books first; Open Library on a miss or an error. A failing
/// Open Library degrades to no record.
pub async fn resolve_isbn<C: Catalogue + ?Sized>(catalogue: &C, isbn: &Isbn) -> Option<BookMetadata> {
    match catalogue.google_books(isbn).await {
        Ok(Some(metadata)) => return Some(metadata),
        Ok(None) => {}
        Err(e) => tracing::warn!("Google Books lookup for {} failed: {}", isbn, e),
    }

    match catalogue.open_library(isbn).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("Open Library lookup for {} failed: {}", isbn, e);
            None
        }
    }
}

#[derive(Clone)]
pub struct HttpCatalogue {
    client: reqwest::Client,
    config: MetadataConfig,
}

impl HttpCatalogue {
    pub fn new(config: MetadataConfig) -> AppResult<Self> {
        let client = http::build_client(Duration::from_secs(config.timeout_seconds))?;
        Ok(Self { client, config })
    }

    async fn search(&self, query: &str) -> AppResult<Vec<BookMetadata>> {
        let response: GoogleVolumes = http::send_json(GOOGLE_BOOKS, self.google_request(query)).await?;
        Ok(map_google_volumes(response, MAX_SEARCH_RESULTS))
    }

    fn google_request(&self, query: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/volumes", self.config.google_books_url.trim_end_matches('/'));
        let max_results = MAX_SEARCH_RESULTS.to_string();
        let mut params = vec![("q", query), ("maxResults", max_results.as_str())];
        if let Some(ref key) = self.config.google_books_api_key {
            params.push(("key", key.as_str()));
        }
        self.client.get(url).query(&params)
    }
}

#[async_trait]
impl Catalogue for HttpCatalogue {
    async fn google_books(&self, isbn: &Isbn) -> AppResult<Option<BookMetadata>> {
        let query = format!("isbn:{}", isbn.isbn13());
        let response: GoogleVolumes = http::send_json(GOOGLE_BOOKS, self.google_request(&query)).await?;
        Ok(map_google_volumes(response, 1).into_iter().next())
    }

    async fn open_library(&self, isbn: &Isbn) -> AppResult<Option<BookMetadata>> {
        let bibkey = format!("ISBN:{}", isbn.isbn13());
        let url = format!("{}/api/books", self.config.open_library_url.trim_end_matches('/'));
        let request = self.client.get(url).query(&[
            ("bibkeys", bibkey.as_str()),
            ("jscmd", "data"),
            ("format", "json"),
        ]);

        let mut books: HashMap<String, OpenLibraryBook> = http::send_json(OPEN_LIBRARY, request).await?;
        Ok(books.remove(&bibkey).and_then(|b| map_open_library(b, isbn)))
    }
}

#[derive(Clone)]
pub struct MetadataService {
    catalogue: HttpCatalogue,
    redis: RedisService,
    cache_ttl_seconds: u64,
}

impl MetadataService {
    pub fn new(config: MetadataConfig, redis_config: &RedisConfig, redis: RedisService) -> AppResult<Self> {
        Ok(Self {
            catalogue: HttpCatalogue::new(config)?,
            redis,
            cache_ttl_seconds: redis_config.metadata_cache_ttl_seconds,
        })
    }

    /// Look up one edition by ISBN: cache, then Google Books, then Open Library
    pub async fn lookup(&self, raw_isbn: &str) -> AppResult<Option<BookMetadata>> {
        let isbn = Isbn::parse(raw_isbn)
            .map_err(|e| AppError::Validation(format!("Invalid ISBN {}: {}", raw_isbn, e)))?;
        let cache_key = format!("metadata:isbn:{}", isbn.isbn13());

        match self.redis.get_json::<BookMetadata>(&cache_key).await {
            Ok(Some(cached)) => {
                tracing::debug!("Metadata cache hit for {}", isbn);
                return Ok(Some(cached));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Metadata cache unavailable: {}", e),
        }

        let found = resolve_isbn(&self.catalogue, &isbn).await;

        if let Some(ref metadata) = found {
            if let Err(e) = self
                .redis
                .set_json(&cache_key, metadata, self.cache_ttl_seconds)
                .await
            {
                tracing::warn!("Failed to cache metadata for {}: {}", isbn, e);
            }
        }

        Ok(found)
    }

    /// Free-text search on Google Books
    pub async fn search(&self, title: Option<&str>, author: Option<&str>) -> AppResult<Vec<BookMetadata>> {
        let query = search_query(title, author)
            .ok_or_else(|| AppError::Validation("Provide a title or an author to search".to_string()))?;
        self.catalogue.search(&query).await
    }
}

#[async_trait]
impl IsbnLookup for MetadataService {
    async fn lookup_isbn(&self, isbn: &str) -> AppResult<Option<BookMetadata>> {
        self.lookup(isbn).await
    }
}

fn search_query(title: Option<&str>, author: Option<&str>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        parts.push(format!("intitle:{}", title));
    }
    if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
        parts.push(format!("inauthor:{}", author));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Catalogue thumbnails are served over plain http by default
fn secure_cover_url(url: &str) -> String {
    let url = url.replace("&edge=curl", "");
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Google Books

#[derive(Debug, Default, Deserialize)]
struct GoogleVolumes {
    #[serde(default)]
    items: Vec<GoogleVolume>,
}

#[derive(Debug, Deserialize)]
struct GoogleVolume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: GoogleVolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GoogleVolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    page_count: Option<i32>,
    categories: Vec<String>,
    language: Option<String>,
    industry_identifiers: Vec<GoogleIdentifier>,
    image_links: Option<GoogleImageLinks>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GoogleImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

fn map_google_volumes(volumes: GoogleVolumes, limit: usize) -> Vec<BookMetadata> {
    volumes
        .items
        .into_iter()
        .filter_map(|v| map_google_volume(v.volume_info))
        .take(limit)
        .collect()
}

fn map_google_volume(info: GoogleVolumeInfo) -> Option<BookMetadata> {
    let title = non_empty(info.title)?;

    let identifier = |kind: &str| {
        info.industry_identifiers
            .iter()
            .find(|i| i.kind == kind)
            .and_then(|i| Isbn::parse(&i.identifier).ok())
    };
    let isbn13 = identifier("ISBN_13").or_else(|| identifier("ISBN_10"));

    let cover_image_url = info
        .image_links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail))
        .map(|url| secure_cover_url(&url));

    Some(BookMetadata {
        title,
        subtitle: non_empty(info.subtitle),
        authors: info.authors,
        publisher: non_empty(info.publisher),
        published_date: non_empty(info.published_date),
        description: non_empty(info.description),
        page_count: info.page_count.filter(|p| *p > 0),
        categories: info.categories,
        language: non_empty(info.language),
        isbn10: isbn13.as_ref().and_then(|i| i.isbn10()),
        isbn13: isbn13.map(|i| i.isbn13().to_string()),
        cover_image_url,
        source: Some(MetadataSource::GoogleBooks),
    })
}

// Open Library

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenLibraryBook {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<OpenLibraryNamed>,
    publishers: Vec<OpenLibraryNamed>,
    publish_date: Option<String>,
    number_of_pages: Option<i32>,
    subjects: Vec<OpenLibraryNamed>,
    cover: Option<OpenLibraryCover>,
}

#[derive(Debug, Deserialize)]
struct OpenLibraryNamed {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenLibraryCover {
    small: Option<String>,
    medium: Option<String>,
    large: Option<String>,
}

fn map_open_library(book: OpenLibraryBook, isbn: &Isbn) -> Option<BookMetadata> {
    let title = non_empty(book.title)?;
    let cover_image_url = book
        .cover
        .and_then(|c| c.large.or(c.medium).or(c.small))
        .map(|url| secure_cover_url(&url));

    Some(BookMetadata {
        title,
        subtitle: non_empty(book.subtitle),
        authors: book.authors.into_iter().map(|a| a.name).collect(),
        publisher: book.publishers.into_iter().next().map(|p| p.name),
        published_date: non_empty(book.publish_date),
        description: None,
        page_count: book.number_of_pages.filter(|p| *p > 0),
        categories: book.subjects.into_iter().take(5).map(|s| s.name).collect(),
        language: None,
        isbn10: isbn.isbn10(),
        isbn13: Some(isbn.isbn13().to_string()),
        cover_image_url,
        source: Some(MetadataSource::OpenLibrary),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_google_volume() {
        let volumes: GoogleVolumes = serde_json::from_value(json!({
            "totalItems": 1,
            "items": [{
                "volumeInfo": {
                    "title": "Dune",
                    "authors": ["Frank Herbert"],
                    "publisher": "Ace",
                    "publishedDate": "1990-09-01",
                    "pageCount": 535,
                    "categories": ["Fiction"],
                    "language": "en",
                    "industryIdentifiers": [
                        { "type": "ISBN_10", "identifier": "0441172717" },
                        { "type": "ISBN_13", "identifier": "9780441172719" }
                    ],
                    "imageLinks": {
                        "thumbnail": "http://books.google.com/books/content?id=x&printsec=frontcover&img=1&zoom=1&edge=curl"
                    }
                }
            }]
        }))
        .unwrap();

        let books = map_google_volumes(volumes, 10);
        assert_eq!(books.len(), 1);
        let dune = &books[0];
        assert_eq!(dune.title, "Dune");
        assert_eq!(dune.authors, vec!["Frank Herbert"]);
        assert_eq!(dune.isbn13.as_deref(), Some("9780441172719"));
        assert_eq!(dune.isbn10.as_deref(), Some("0441172717"));
        assert_eq!(dune.page_count, Some(535));
        assert_eq!(dune.source, Some(MetadataSource::GoogleBooks));
        assert_eq!(
            dune.cover_image_url.as_deref(),
            Some("https://books.google.com/books/content?id=x&printsec=frontcover&img=1&zoom=1")
        );
    }

    #[test]
    fn test_google_without_items_or_title() {
        let empty: GoogleVolumes = serde_json::from_value(json!({ "totalItems": 0 })).unwrap();
        assert!(map_google_volumes(empty, 10).is_empty());

        let untitled: GoogleVolumes =
            serde_json::from_value(json!({ "items": [{ "volumeInfo": { "authors": ["X"] } }] })).unwrap();
        assert!(map_google_volumes(untitled, 10).is_empty());
    }

    #[test]
    fn test_map_open_library() {
        let isbn = Isbn::parse("9780441172719").unwrap();
        let mut books: HashMap<String, OpenLibraryBook> = serde_json::from_value(json!({
            "ISBN:9780441172719": {
                "title": "Dune",
                "authors": [{ "name": "Frank Herbert", "url": "https://openlibrary.org/authors/OL79034A" }],
                "publishers": [{ "name": "Ace Books" }],
                "publish_date": "1990",
                "number_of_pages": 535,
                "subjects": [{ "name": "Science fiction", "url": "x" }],
                "cover": { "medium": "https://covers.openlibrary.org/b/id/1-M.jpg" }
            }
        }))
        .unwrap();

        let dune = map_open_library(books.remove("ISBN:9780441172719").unwrap(), &isbn).unwrap();
        assert_eq!(dune.authors, vec!["Frank Herbert"]);
        assert_eq!(dune.publisher.as_deref(), Some("Ace Books"));
        assert_eq!(dune.categories, vec!["Science fiction"]);
        assert_eq!(dune.isbn10.as_deref(), Some("0441172717"));
        assert_eq!(dune.source, Some(MetadataSource::OpenLibrary));
        assert_eq!(
            dune.cover_image_url.as_deref(),
            Some("https://covers.openlibrary.org/b/id/1-M.jpg")
        );
    }

    fn dune(source: MetadataSource) -> BookMetadata {
        BookMetadata {
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            isbn13: Some("9780441172719".to_string()),
            source: Some(source),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_prefers_google_books() {
        let isbn = Isbn::parse("9780441172719").unwrap();
        let mut catalogue = MockCatalogue::new();
        catalogue
            .expect_google_books()
            .times(1)
            .returning(|_| Ok(Some(dune(MetadataSource::GoogleBooks))));
        catalogue.expect_open_library().times(0);

        let found = resolve_isbn(&catalogue, &isbn).await.unwrap();
        assert_eq!(found.source, Some(MetadataSource::GoogleBooks));
    }

    #[tokio::test]
    async fn test_resolve_google_error_falls_back_to_open_library() {
        let isbn = Isbn::parse("9780441172719").unwrap();
        let mut catalogue = MockCatalogue::new();
        catalogue
            .expect_google_books()
            .times(1)
            .returning(|_| Err(AppError::throttled(GOOGLE_BOOKS, "HTTP 429: slow down")));
        catalogue
            .expect_open_library()
            .times(1)
            .returning(|_| Ok(Some(dune(MetadataSource::OpenLibrary))));

        let found = resolve_isbn(&catalogue, &isbn).await.unwrap();
        assert_eq!(found.source, Some(MetadataSource::OpenLibrary));
    }

    #[tokio::test]
    async fn test_resolve_google_miss_falls_back_to_open_library() {
        let isbn = Isbn::parse("0441172717").unwrap();
        let mut catalogue = MockCatalogue::new();
        catalogue.expect_google_books().times(1).returning(|_| Ok(None));
        catalogue
            .expect_open_library()
            .withf(|isbn| isbn.isbn13() == "9780441172719")
            .times(1)
            .returning(|_| Ok(Some(dune(MetadataSource::OpenLibrary))));

        let found = resolve_isbn(&catalogue, &isbn).await.unwrap();
        assert_eq!(found.source, Some(MetadataSource::OpenLibrary));
    }

    #[tokio::test]
    async fn test_resolve_both_failing_is_a_miss() {
        let isbn = Isbn::parse("9780441172719").unwrap();
        let mut catalogue = MockCatalogue::new();
        catalogue
            .expect_google_books()
            .returning(|_| Err(AppError::upstream(GOOGLE_BOOKS, "request failed: timeout")));
        catalogue
            .expect_open_library()
            .returning(|_| Err(AppError::upstream(OPEN_LIBRARY, "HTTP 503: down")));

        assert!(resolve_isbn(&catalogue, &isbn).await.is_none());
    }

    #[test]
    fn test_search_query() {
        assert_eq!(search_query(Some(" Dune "), None).as_deref(), Some("intitle:Dune"));
        assert_eq!(
            search_query(Some("Dune"), Some("Herbert")).as_deref(),
            Some("intitle:Dune inauthor:Herbert")
        );
        assert_eq!(search_query(Some(""), Some("  ")), None);
    }
}

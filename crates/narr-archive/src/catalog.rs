//! Remote catalog: what the archive publishes and when it last changed.
//!
//! The listing is fetched once per [`Catalog`] and cached for its lifetime;
//! a new run builds a new catalog to observe new remote entries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};

/// Timestamp format of the listing's modification column, e.g.
/// `08-Jan-2015 10:12`.
pub const LISTING_TIME_FORMAT: &str = "%d-%b-%Y %H:%M";

/// One file published by the remote archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub last_modified: NaiveDateTime,
    /// Size as displayed by the listing (e.g. `1.3M`).
    pub size: String,
}

/// Transport to the remote archive.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the HTML directory listing.
    async fn list_page(&self) -> Result<String>;

    /// Download the file `name` to `destination`, returning the number of
    /// bytes written.
    async fn fetch(&self, name: &str, destination: &Path) -> Result<u64>;
}

/// Parse every row of an HTML directory listing.
///
/// A row is a `<tr>` with an anchor in one cell, the modification time in
/// the next and the size after that. Rows with a blank or `-` time (parent
/// and sub-directories) are skipped; a row whose time does not parse is an
/// error, as is a page without any anchored rows.
pub fn parse_listing(html: &str) -> Result<Vec<RemoteEntry>> {
    let document = Html::parse_document(html);
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let anchor_sel = selector("a")?;

    let mut entries = Vec::new();
    let mut anchored_rows = 0usize;

    for row in document.select(&row_sel) {
        let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
        let Some((index, anchor)) = cells
            .iter()
            .enumerate()
            .find_map(|(i, cell)| cell.select(&anchor_sel).next().map(|a| (i, a)))
        else {
            continue;
        };
        anchored_rows += 1;

        let name = text_of(&anchor);
        let mtime = cells.get(index + 1).map(text_of).unwrap_or_default();
        if name.is_empty() || mtime.is_empty() || mtime == "-" {
            debug!(name = %name, "Skipping listing row without modification time");
            continue;
        }

        let last_modified = NaiveDateTime::parse_from_str(&mtime, LISTING_TIME_FORMAT)
            .map_err(|e| {
                ArchiveError::RemoteList(format!(
                    "malformed modification time '{}' for {}: {}",
                    mtime, name, e
                ))
            })?;
        let size = cells.get(index + 2).map(text_of).unwrap_or_default();

        entries.push(RemoteEntry {
            name,
            last_modified,
            size,
        });
    }

    if anchored_rows == 0 {
        return Err(ArchiveError::RemoteList(
            "listing page contains no file rows".to_string(),
        ));
    }

    Ok(entries)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ArchiveError::RemoteList(format!("invalid CSS selector '{}': {}", css, e)))
}

fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Cached view of the remote archive.
pub struct Catalog {
    source: Arc<dyn RemoteSource>,
    entries: OnceCell<HashMap<String, RemoteEntry>>,
}

impl Catalog {
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self {
            source,
            entries: OnceCell::new(),
        }
    }

    /// All remote entries keyed by name, listing the remote on first use.
    pub async fn entries(&self) -> Result<&HashMap<String, RemoteEntry>> {
        self.entries
            .get_or_try_init(|| async {
                let page = self.source.list_page().await?;
                let entries: HashMap<_, _> = parse_listing(&page)?
                    .into_iter()
                    .map(|entry| (entry.name.clone(), entry))
                    .collect();
                info!(count = entries.len(), "Loaded remote catalog");
                Ok::<_, ArchiveError>(entries)
            })
            .await
    }

    /// Modification time of the remote file `name`, if it is published.
    pub async fn last_modified(&self, name: &str) -> Result<Option<NaiveDateTime>> {
        Ok(self.entries().await?.get(name).map(|e| e.last_modified))
    }

    /// Download `name` into `destination` through the underlying source.
    pub async fn fetch(&self, name: &str, destination: &Path) -> Result<u64> {
        self.source.fetch(name, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LISTING: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html><head><title>Index of /wd51we/NARR_archive</title></head><body>
<table>
<tr><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th><th><a href="?C=S;O=A">Size</a></th></tr>
<tr><td><a href="/wd51we/">Parent Directory</a></td><td>&nbsp;</td><td align="right">  - </td></tr>
<tr><td><a href="rcdas.2015010300.awip32.merged">rcdas.2015010300.awip32.merged</a></td><td align="right">08-Jan-2015 10:12  </td><td align="right">1.3M</td></tr>
<tr><td><a href="rcdas.2015010303.awip32.merged">rcdas.2015010303.awip32.merged</a></td><td align="right">08-Jan-2015 10:14  </td><td align="right">1.4M</td></tr>
<tr><td><a href="rcdas.2015010306.awip32.merged">rcdas.2015010306.awip32.merged</a></td><td align="right">09-Jan-2015 00:01  </td><td align="right">1.2M</td></tr>
</table></body></html>"#;

    #[test]
    fn test_parses_every_row() {
        let entries = parse_listing(LISTING).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "rcdas.2015010300.awip32.merged");
        assert_eq!(entries[0].size, "1.3M");
        assert_eq!(
            entries[2].last_modified,
            NaiveDateTime::parse_from_str("09-Jan-2015 00:01", LISTING_TIME_FORMAT).unwrap()
        );
    }

    #[test]
    fn test_malformed_time_is_error() {
        let html = r#"<table><tr><td><a href="x">x</a></td><td>yesterday</td><td>1K</td></tr></table>"#;
        assert!(matches!(parse_listing(html), Err(ArchiveError::RemoteList(_))));
    }

    #[test]
    fn test_page_without_rows_is_error() {
        assert!(parse_listing("<html><body>Service Unavailable</body></html>").is_err());
    }

    #[test]
    fn test_empty_directory_is_ok() {
        let html = r#"<table><tr><td><a href="/up/">Parent Directory</a></td><td></td><td>-</td></tr></table>"#;
        assert!(parse_listing(html).unwrap().is_empty());
    }

    struct CountingSource {
        lists: AtomicUsize,
    }

    #[async_trait]
    impl RemoteSource for CountingSource {
        async fn list_page(&self) -> Result<String> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(LISTING.to_string())
        }

        async fn fetch(&self, name: &str, _destination: &Path) -> Result<u64> {
            Err(ArchiveError::NotFound(name.to_string()))
        }
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let source = Arc::new(CountingSource {
            lists: AtomicUsize::new(0),
        });
        let catalog = Catalog::new(source.clone());

        assert!(catalog
            .last_modified("rcdas.2015010303.awip32.merged")
            .await
            .unwrap()
            .is_some());
        assert!(catalog
            .last_modified("rcdas.2015010309.awip32.merged")
            .await
            .unwrap()
            .is_none());
        assert_eq!(catalog.entries().await.unwrap().len(), 3);
        assert_eq!(source.lists.load(Ordering::SeqCst), 1);
    }
}

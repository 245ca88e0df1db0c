use anyhow::Context;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::naming::{format_size, page_file_name};
use crate::source::Page;
use crate::zip::{ArchiveEntry, ArchiveError, build_archive};

/// Pause between two page downloads, to go easy on image hosts.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

/// Something that can download a page image
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url`, sending `headers` along with the request
    async fn fetch_image(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("chapter has no pages")]
    NoPages,
    #[error("none of the {attempted} pages could be downloaded")]
    NothingDownloaded { attempted: usize },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// A chapter packed into a CBZ buffer
#[derive(Debug, Clone)]
pub struct PackagedChapter {
    pub bytes: Vec<u8>,
    pub pages_total: usize,
    pub pages_packed: usize,
    /// 1-based numbers of the pages that failed to download
    pub skipped: Vec<usize>,
}

/// Downloads chapter pages and packs them into a CBZ archive
pub struct ChapterPackager<F: ImageFetcher + ?Sized> {
    fetcher: Arc<F>,
    page_delay: Duration,
}

impl<F: ImageFetcher + ?Sized> ChapterPackager<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Download `pages` in order and build the archive.
    ///
    /// A page that fails to download is skipped; the others keep the
    /// numbers of their original positions. Only when every download
    /// fails is the whole chapter an error.
    pub async fn package(&self, pages: &[Page]) -> Result<PackagedChapter, PackageError> {
        if pages.is_empty() {
            return Err(PackageError::NoPages);
        }

        let total = pages.len();
        let mut entries = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        for (position, page) in pages.iter().enumerate() {
            if position > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            debug!("Downloading page {}/{}: {}", position + 1, total, page.img);
            match self
                .fetcher
                .fetch_image(&page.img, &page.header_for_image)
                .await
            {
                Ok(data) => entries.push(ArchiveEntry::new(
                    page_file_name(position, total, &page.img),
                    data,
                )),
                Err(e) => {
                    warn!(page = position + 1, url = %page.img, "skipping page: {:#}", e);
                    skipped.push(position + 1);
                }
            }
        }

        if entries.is_empty() {
            return Err(PackageError::NothingDownloaded { attempted: total });
        }

        let bytes = build_archive(&entries)?;
        info!(
            pages = entries.len(),
            skipped = skipped.len(),
            size = %format_size(bytes.len() as u64),
            "packaged chapter"
        );

        Ok(PackagedChapter {
            bytes,
            pages_total: total,
            pages_packed: entries.len(),
            skipped,
        })
    }
}

/// Pack local image files into a CBZ archive, in the given order
pub async fn pack_files(paths: &[PathBuf]) -> anyhow::Result<Vec<u8>> {
    let mut entries = Vec::with_capacity(paths.len());
    for (position, path) in paths.iter().enumerate() {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = page_file_name(position, paths.len(), &path.to_string_lossy());
        entries.push(ArchiveEntry::new(name, data));
    }

    Ok(build_archive(&entries)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFetcher {
        images: HashMap<String, Vec<u8>>,
        seen_headers: Mutex<Vec<BTreeMap<String, String>>>,
    }

    impl FakeFetcher {
        fn with(images: &[(&str, &str)]) -> Self {
            Self {
                images: images
                    .iter()
                    .map(|(url, data)| (url.to_string(), data.as_bytes().to_vec()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch_image(
            &self,
            url: &str,
            headers: &BTreeMap<String, String>,
        ) -> anyhow::Result<Vec<u8>> {
            self.seen_headers.lock().unwrap().push(headers.clone());
            match self.images.get(url) {
                Some(data) => Ok(data.clone()),
                None => bail!("404 for {url}"),
            }
        }
    }

    fn page(n: u32, img: &str) -> Page {
        Page {
            page: n,
            img: img.to_string(),
            header_for_image: BTreeMap::from([("Referer".to_string(), "https://site/".to_string())]),
        }
    }

    fn packager(fetcher: FakeFetcher) -> ChapterPackager<FakeFetcher> {
        ChapterPackager::new(Arc::new(fetcher)).with_page_delay(Duration::ZERO)
    }

    fn names_in(archive: &[u8]) -> Vec<String> {
        let mut reader = ::zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
        (0..reader.len())
            .map(|i| reader.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn packs_pages_in_order() {
        let fetcher = FakeFetcher::with(&[("https://i/1.png", "one"), ("https://i/2.jpg?x=1", "two")]);
        let pages = [page(0, "https://i/1.png"), page(1, "https://i/2.jpg?x=1")];

        let chapter = packager(fetcher).package(&pages).await.unwrap();

        assert_eq!(chapter.pages_total, 2);
        assert_eq!(chapter.pages_packed, 2);
        assert!(chapter.skipped.is_empty());
        assert_eq!(names_in(&chapter.bytes), ["001.png", "002.jpg"]);
    }

    #[tokio::test]
    async fn failed_pages_are_skipped_but_numbering_is_kept() {
        let fetcher = FakeFetcher::with(&[("https://i/1.png", "one"), ("https://i/3.png", "three")]);
        let pages = [
            page(0, "https://i/1.png"),
            page(1, "https://i/missing.png"),
            page(2, "https://i/3.png"),
        ];

        let chapter = packager(fetcher).package(&pages).await.unwrap();

        assert_eq!(chapter.pages_packed, 2);
        assert_eq!(chapter.skipped, [2]);
        assert_eq!(names_in(&chapter.bytes), ["001.png", "003.png"]);
    }

    #[tokio::test]
    async fn page_headers_are_forwarded() {
        let fetcher = Arc::new(FakeFetcher::with(&[("https://i/1.png", "one")]));
        ChapterPackager::new(fetcher.clone())
            .with_page_delay(Duration::ZERO)
            .package(&[page(0, "https://i/1.png")])
            .await
            .unwrap();

        let seen = fetcher.seen_headers.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["Referer"], "https://site/");
    }

    #[tokio::test]
    async fn no_pages_is_an_error() {
        let result = packager(FakeFetcher::default()).package(&[]).await;
        assert!(matches!(result, Err(PackageError::NoPages)));
    }

    #[tokio::test]
    async fn all_downloads_failing_is_an_error() {
        let pages = [page(0, "https://i/a.png"), page(1, "https://i/b.png")];
        let result = packager(FakeFetcher::default()).package(&pages).await;
        assert!(matches!(
            result,
            Err(PackageError::NothingDownloaded { attempted: 2 })
        ));
    }

    #[tokio::test]
    async fn packs_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("cover.PNG");
        let second = dir.path().join("scan");
        std::fs::write(&first, b"png bytes").unwrap();
        std::fs::write(&second, b"jpeg bytes").unwrap();

        let archive = pack_files(&[first, second]).await.unwrap();
        assert_eq!(names_in(&archive), ["001.png", "002.jpg"]);
    }

    #[tokio::test]
    async fn packing_nothing_fails() {
        let err = pack_files(&[]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::EmptyInput)
        ));
    }
}

//! Image scraping from web pages.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{OpsError, OpsResult};
use crate::log::OperationLog;
use crate::model::{Invocation, Manifest, Operation, params};

const OUTPUT_DIR: &str = "downloaded_images";
const MEDIA_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "bmp", "webp", "png", "mp4", "gif"];
const MIN_IMAGE_BYTES: usize = 10 * 1024;
const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(30);
const LAZY_ATTRIBUTES: [&str; 2] = ["data-src", "data-original"];

fn img_selector() -> OpsResult<Selector> {
    Selector::parse("img").map_err(|err| OpsError::InvalidInput {
        field: "selector",
        reason: "unparseable",
        value: Some(err.to_string()),
    })
}

fn has_media_extension(url: &Url) -> bool {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Absolute media URLs referenced by `<img>` tags, in document order.
///
/// With `lazy` set, tags without `src` fall back to `data-src` and
/// `data-original`.
fn image_urls(page: &Url, html: &str, selector: &Selector, lazy: bool) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|img| {
            let element = img.value();
            let src = element.attr("src").filter(|src| !src.trim().is_empty());
            let src = if lazy {
                src.or_else(|| {
                    LAZY_ATTRIBUTES
                        .iter()
                        .find_map(|attr| element.attr(attr).filter(|src| !src.trim().is_empty()))
                })
            } else {
                src
            };
            page.join(src?.trim()).ok()
        })
        .filter(has_media_extension)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// `<host>/<path with / replaced by _>`, or `<host>/root` for the site root.
fn page_folder(page: &Url) -> PathBuf {
    let host = page.host_str().unwrap_or("unknown_host");
    let path = page.path().trim_matches('/').replace('/', "_");
    let path = if path.is_empty() { "root".to_string() } else { path };
    Path::new(host).join(path)
}

fn image_file_name(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if last.contains('.') {
        last.to_string()
    } else {
        let mut hasher = DefaultHasher::new();
        url.as_str().hash(&mut hasher);
        format!("image_{:016x}.jpg", hasher.finish())
    }
}

/// Downloads images referenced by one or more pages into
/// `<target>/downloaded_images/<host>/<path>/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeImages;

/// Outcome of scraping one page.
enum PageOutcome {
    /// Page processed; number of images saved to disk.
    Done(u64),
    Failed,
}

impl ScrapeImages {
    fn scrape_page(
        client: &Client,
        selector: &Selector,
        raw: &str,
        base: &Path,
        lazy: bool,
        dry_run: bool,
        log: &mut OperationLog,
    ) -> OpsResult<PageOutcome> {
        let page = match Url::parse(raw) {
            Ok(page) => page,
            Err(err) => {
                log.line(format!("Invalid URL {raw}: {err}"))?;
                return Ok(PageOutcome::Failed);
            }
        };
        log.line(format!("Scrape starting for: {page}"))?;
        let html = match client
            .get(page.clone())
            .timeout(PAGE_TIMEOUT)
            .send()
            .and_then(|response| {
                if response.status() == StatusCode::OK {
                    response.text().map(Some)
                } else {
                    Ok(None)
                }
            }) {
            Ok(Some(html)) => html,
            Ok(None) => {
                log.line(format!("Failed to load page: {page}"))?;
                return Ok(PageOutcome::Failed);
            }
            Err(err) => {
                log.line(format!("Scrape exception for {page}: {err}"))?;
                return Ok(PageOutcome::Failed);
            }
        };

        let urls = image_urls(&page, &html, selector, lazy);
        if urls.is_empty() {
            log.line("No images found.")?;
            return Ok(PageOutcome::Done(0));
        }
        let output_dir = base.join(page_folder(&page));
        if dry_run {
            for url in &urls {
                log.line(format!(
                    "[Dry Run] Would download: {url} -> {}",
                    output_dir.display()
                ))?;
            }
            return Ok(PageOutcome::Done(0));
        }
        fs::create_dir_all(&output_dir)
            .map_err(|source| OpsError::io("scrape_images.create_dir", &output_dir, source))?;
        let mut saved = 0_u64;
        for url in &urls {
            if Self::download(client, url, &output_dir, log)? {
                saved += 1;
            }
        }
        Ok(PageOutcome::Done(saved))
    }

    /// Fetch one image, returning whether a new file was written.
    fn download(client: &Client, url: &Url, output_dir: &Path, log: &mut OperationLog) -> OpsResult<bool> {
        let name = image_file_name(url);
        let path = output_dir.join(&name);
        if path.exists() {
            return Ok(false);
        }
        let response = match client.get(url.clone()).timeout(IMAGE_TIMEOUT).send() {
            Ok(response) if response.status() == StatusCode::OK => response,
            Ok(response) => {
                log.line(format!("Failed to download {url} status: {}", response.status()))?;
                return Ok(false);
            }
            Err(err) => {
                log.line(format!("Error downloading {url}: {err}"))?;
                return Ok(false);
            }
        };
        let bytes = match response.bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                log.line(format!("Error downloading {url}: {err}"))?;
                return Ok(false);
            }
        };
        if bytes.len() < MIN_IMAGE_BYTES {
            log.line(format!("Skipped (too small): {name}"))?;
            return Ok(false);
        }
        fs::write(&path, &bytes).map_err(|source| OpsError::io("scrape_images.write", &path, source))?;
        log.line(format!("Downloaded: {name}"))?;
        Ok(true)
    }
}

impl Operation for ScrapeImages {
    fn run(&self, invocation: &Invocation<'_>) -> OpsResult<Manifest> {
        let mut log = OperationLog::open(invocation.log_path)?;
        let Some(urls) = invocation.params.get(params::SCRAPER_URLS) else {
            return log.soft_failure("No URLs provided for scraping.");
        };
        let lazy = invocation.params.flag(params::SCRAPER_DYNAMIC);
        let base = invocation.target.join(OUTPUT_DIR);
        if !invocation.dry_run {
            fs::create_dir_all(&base)
                .map_err(|source| OpsError::io("scrape_images.create_base", &base, source))?;
        }
        let selector = img_selector()?;
        let client = Client::builder()
            .user_agent(concat!("ordo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| OpsError::HttpClient { source })?;

        let (mut processed, mut errors, mut saved) = (0_u64, 0_u64, 0_u64);
        for raw in urls.lines().map(str::trim).filter(|line| !line.is_empty()) {
            processed += 1;
            let outcome =
                Self::scrape_page(&client, &selector, raw, &base, lazy, invocation.dry_run, &mut log)?;
            match outcome {
                PageOutcome::Done(count) => saved += count,
                PageOutcome::Failed => errors += 1,
            }
        }

        log.line(format!("Processed {processed} URLs, {errors} failed."))?;
        log.finish()?;
        let manifest = Manifest::counts(processed, errors);
        // The image root is shared across runs; only offer it when this run added to it.
        Ok(if saved > 0 {
            manifest.with_output_dir(base)
        } else {
            manifest
        })
    }
}

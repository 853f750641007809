use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::filename::{extract_last_modified, is_extra, is_media, parse_title_year, ParsedName};
use super::listing::{as_directory, ListingEntry, ListingSource};
use crate::source::FailureReason;

/// Knobs for a single crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Stop after this many listing entries have been scanned.
    pub max_items: Option<usize>,
    /// Re-list directories even when their timestamp has not advanced.
    pub force: bool,
    /// Directory URL to the remote timestamp seen on the previous crawl.
    pub known_dirs: HashMap<String, Option<DateTime<Utc>>>,
    /// Directories to visit before the root, e.g. earlier failures. Seeds
    /// outside the root are ignored.
    pub seeds: Vec<ListingEntry>,
}

/// A media file whose name yielded a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawledTitle {
    pub title: String,
    pub year: Option<i32>,
    pub file_url: String,
    pub directory_url: Option<String>,
    pub remote_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    Title(CrawledTitle),
    /// A media file with no usable title in its own or its folder's name.
    Unparsed { name: String, url: String },
    DirectoryListed {
        url: String,
        remote_modified: Option<DateTime<Utc>>,
        media_count: usize,
    },
    DirectorySkipped { url: String },
    DirectoryFailed {
        name: String,
        url: String,
        reason: FailureReason,
        raw: String,
        error: String,
    },
}

impl CrawlEvent {
    /// The file or directory the event is about.
    pub fn url(&self) -> &str {
        match self {
            Self::Title(title) => &title.file_url,
            Self::Unparsed { url, .. }
            | Self::DirectoryListed { url, .. }
            | Self::DirectorySkipped { url }
            | Self::DirectoryFailed { url, .. } => url,
        }
    }
}

struct PendingDir {
    url: Url,
    name: String,
    raw: String,
    remote_modified: Option<DateTime<Utc>>,
    parsed: Option<ParsedName>,
    is_root: bool,
}

/// Breadth-first walk over a listing tree.
///
/// Pull-based: each [`Crawler::next`] call returns one event and only fetches
/// another directory once the events of the previous one are used up.
pub struct Crawler<'a> {
    source: &'a dyn ListingSource,
    root: String,
    options: CrawlOptions,
    queue: VecDeque<PendingDir>,
    seen: HashSet<String>,
    pending: VecDeque<CrawlEvent>,
    scanned: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(source: &'a dyn ListingSource, root: Url, mut options: CrawlOptions) -> Self {
        let root = as_directory(&root);
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();

        for seed in std::mem::take(&mut options.seeds) {
            let Ok(url) = Url::parse(&seed.url) else {
                continue;
            };
            let url = as_directory(&url);
            if !url.as_str().starts_with(root.as_str()) {
                tracing::debug!(%url, "seed outside crawl root, ignored");
                continue;
            }
            if seen.insert(url.to_string()) {
                queue.push_back(PendingDir {
                    parsed: parse_title_year(&seed.name),
                    remote_modified: extract_last_modified(&seed.raw),
                    name: seed.name,
                    raw: seed.raw,
                    url,
                    is_root: false,
                });
            }
        }

        if seen.insert(root.to_string()) {
            queue.push_back(PendingDir {
                name: root.to_string(),
                raw: String::new(),
                remote_modified: None,
                parsed: None,
                url: root.clone(),
                is_root: true,
            });
        }

        Self {
            source,
            root: root.to_string(),
            options,
            queue,
            seen,
            pending: VecDeque::new(),
            scanned: 0,
        }
    }

    /// The crawl root, always ending in a slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Listing entries looked at so far.
    pub const fn scanned(&self) -> usize {
        self.scanned
    }

    fn limit_reached(&self) -> bool {
        self.options.max_items.is_some_and(|max| self.scanned >= max)
    }

    pub async fn next(&mut self) -> Option<CrawlEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.limit_reached() {
                return None;
            }
            let dir = self.queue.pop_front()?;
            self.visit(dir).await;
        }
    }

    async fn visit(&mut self, dir: PendingDir) {
        let entries = match self.source.list(&dir.url).await {
            Ok(entries) => entries,
            Err(e) => {
                let reason = if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::NetworkError
                };
                tracing::warn!(url = %dir.url, "listing failed: {e}");
                self.pending.push_back(CrawlEvent::DirectoryFailed {
                    name: dir.name,
                    url: dir.url.to_string(),
                    reason,
                    raw: dir.raw,
                    error: e.to_string(),
                });
                return;
            }
        };

        let mut media_count = 0;
        let mut subdirs = 0;
        let mut truncated = false;
        // Below the root a folder holds one movie plus its extras.
        let mut feature: Option<ListingEntry> = None;

        for entry in entries {
            if self.limit_reached() {
                truncated = true;
                break;
            }
            self.scanned += 1;

            if entry.is_dir {
                subdirs += 1;
                self.enqueue_dir(entry);
            } else if is_media(&entry.name) {
                media_count += 1;
                if dir.is_root {
                    let event = self.title_event(&dir, entry);
                    self.pending.push_back(event);
                } else if feature
                    .as_ref()
                    .is_none_or(|f| is_extra(&f.name) && !is_extra(&entry.name))
                {
                    feature = Some(entry);
                }
            }
        }

        if let Some(entry) = feature {
            let event = self.title_event(&dir, entry);
            self.pending.push_back(event);
        }

        // A partially scanned directory must not be cached as done.
        if truncated {
            return;
        }

        let url = dir.url.to_string();
        if media_count == 0 && subdirs == 0 && !dir.is_root {
            self.pending.push_back(CrawlEvent::DirectoryFailed {
                name: dir.name,
                url,
                reason: FailureReason::NoMedia,
                raw: dir.raw,
                error: String::new(),
            });
        } else {
            self.pending.push_back(CrawlEvent::DirectoryListed {
                url,
                remote_modified: dir.remote_modified,
                media_count,
            });
        }
    }

    fn enqueue_dir(&mut self, entry: ListingEntry) {
        let Ok(url) = Url::parse(&entry.url) else {
            return;
        };
        if !url.as_str().starts_with(&self.root) || !self.seen.insert(url.to_string()) {
            return;
        }

        let remote_modified = extract_last_modified(&entry.raw);
        if !self.options.force {
            let cached = self.options.known_dirs.get(url.as_str()).copied().flatten();
            if let (Some(seen_at), Some(now)) = (cached, remote_modified) {
                if now <= seen_at {
                    self.pending.push_back(CrawlEvent::DirectorySkipped {
                        url: url.to_string(),
                    });
                    return;
                }
            }
        }

        self.queue.push_back(PendingDir {
            parsed: parse_title_year(&entry.name),
            name: entry.name,
            raw: entry.raw,
            remote_modified,
            url,
            is_root: false,
        });
    }

    fn title_event(&self, dir: &PendingDir, entry: ListingEntry) -> CrawlEvent {
        let own = parse_title_year(&entry.name);
        // Folder-per-movie layouts keep the year on the folder.
        let parsed = match (own, &dir.parsed) {
            (Some(own), Some(folder)) if own.year.is_none() && folder.year.is_some() => {
                Some(folder.clone())
            }
            (None, folder) => folder.clone(),
            (own, _) => own,
        };

        match parsed {
            Some(ParsedName { title, year }) => CrawlEvent::Title(CrawledTitle {
                title,
                year,
                remote_modified: extract_last_modified(&entry.raw),
                file_url: entry.url,
                directory_url: (!dir.is_root).then(|| dir.url.to_string()),
            }),
            None => CrawlEvent::Unparsed {
                name: entry.name,
                url: entry.url,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::network::{ClientError, ClientResult};

    /// In-memory tree keyed by directory URL.
    #[derive(Default)]
    struct FakeTree {
        dirs: HashMap<String, Vec<ListingEntry>>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeTree {
        fn dir(mut self, url: &str, entries: &[(&str, &str)]) -> Self {
            let listed = entries
                .iter()
                .map(|(name, raw)| {
                    let is_dir = name.ends_with('/');
                    ListingEntry {
                        name: name.trim_end_matches('/').to_string(),
                        url: Url::parse(url).unwrap().join(name).unwrap().to_string(),
                        is_dir,
                        raw: (*raw).to_string(),
                    }
                })
                .collect();
            self.dirs.insert(url.to_string(), listed);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingSource for FakeTree {
        async fn list(&self, url: &Url) -> ClientResult<Vec<ListingEntry>> {
            self.requests.lock().unwrap().push(url.to_string());
            self.dirs.get(url.as_str()).cloned().ok_or(ClientError::Status {
                status: 404,
                url: url.to_string(),
            })
        }
    }

    const ROOT: &str = "http://nas.local/movies/";

    fn library() -> FakeTree {
        FakeTree::default()
            .dir(
                ROOT,
                &[
                    ("Inception (2010)/", "Inception (2010)/ 2023-04-05 12:30"),
                    ("Heat (1995).mkv", "Heat (1995).mkv 2021-11-02 09:15"),
                    ("readme.txt", ""),
                    ("Extras/", ""),
                ],
            )
            .dir(
                "http://nas.local/movies/Inception%20(2010)/",
                &[("inception.mkv", "inception.mkv 2023-04-05 12:00")],
            )
            .dir("http://nas.local/movies/Extras/", &[("cover.jpg", "")])
    }

    async fn drain(crawler: &mut Crawler<'_>) -> Vec<CrawlEvent> {
        let mut events = Vec::new();
        while let Some(event) = crawler.next().await {
            events.push(event);
        }
        events
    }

    fn titles(events: &[CrawlEvent]) -> Vec<CrawledTitle> {
        events
            .iter()
            .filter_map(|e| match e {
                CrawlEvent::Title(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_walks_tree_breadth_first() {
        let tree = library();
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), CrawlOptions::default());
        let events = drain(&mut crawler).await;

        let found = titles(&events);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Heat");
        assert_eq!(found[0].year, Some(1995));
        assert_eq!(found[0].directory_url, None);
        assert_eq!(
            found[0].remote_modified,
            Some(Utc.with_ymd_and_hms(2021, 11, 2, 9, 15, 0).unwrap())
        );

        // File has no year, folder does.
        assert_eq!(found[1].title, "Inception");
        assert_eq!(found[1].year, Some(2010));
        assert_eq!(
            found[1].file_url,
            "http://nas.local/movies/Inception%20(2010)/inception.mkv"
        );
        assert_eq!(
            found[1].directory_url.as_deref(),
            Some("http://nas.local/movies/Inception%20(2010)/")
        );

        assert!(events.iter().any(|e| matches!(
            e,
            CrawlEvent::DirectoryFailed { reason: FailureReason::NoMedia, name, .. } if name == "Extras"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            CrawlEvent::DirectoryListed { media_count: 1, url, .. } if url == ROOT
        )));
        assert_eq!(crawler.scanned(), 6);
    }

    #[tokio::test]
    async fn test_lazy_fetching() {
        let tree = library();
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), CrawlOptions::default());

        let first = crawler.next().await.unwrap();
        assert!(matches!(first, CrawlEvent::Title(_)));
        assert_eq!(tree.requested(), vec![ROOT.to_string()]);
    }

    #[tokio::test]
    async fn test_max_items_bounds_scan() {
        let tree = library();
        let options = CrawlOptions {
            max_items: Some(2),
            ..Default::default()
        };
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), options);
        let events = drain(&mut crawler).await;

        assert_eq!(crawler.scanned(), 2);
        assert_eq!(titles(&events).len(), 1);
        assert_eq!(tree.requested().len(), 1);
        assert!(!events
            .iter()
            .any(|e| matches!(e, CrawlEvent::DirectoryListed { .. })));
    }

    #[tokio::test]
    async fn test_unchanged_directory_skipped() {
        let tree = library();
        let inception = "http://nas.local/movies/Inception%20(2010)/".to_string();
        let mut options = CrawlOptions::default();
        options.known_dirs.insert(
            inception.clone(),
            Some(Utc.with_ymd_and_hms(2023, 4, 5, 12, 30, 0).unwrap()),
        );

        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), options.clone());
        let events = drain(&mut crawler).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, CrawlEvent::DirectorySkipped { url } if *url == inception)));
        assert_eq!(titles(&events).len(), 1);

        options.force = true;
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), options);
        let events = drain(&mut crawler).await;
        assert_eq!(titles(&events).len(), 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort() {
        let tree = FakeTree::default().dir(
            ROOT,
            &[("Gone/", ""), ("Alien (1979).mp4", ""), ("(2001).mkv", "")],
        );
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), CrawlOptions::default());
        let events = drain(&mut crawler).await;

        assert_eq!(titles(&events).len(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, CrawlEvent::Unparsed { name, .. } if name == "(2001).mkv")));
        assert!(events.iter().any(|e| matches!(
            e,
            CrawlEvent::DirectoryFailed { reason: FailureReason::NetworkError, name, .. } if name == "Gone"
        )));
    }

    #[tokio::test]
    async fn test_seeds_visited_first() {
        let tree = library();
        let options = CrawlOptions {
            seeds: vec![ListingEntry {
                name: "Extras".into(),
                url: "http://nas.local/movies/Extras/".into(),
                is_dir: true,
                raw: String::new(),
            }],
            ..Default::default()
        };
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), options);
        let _ = drain(&mut crawler).await;

        let requested = tree.requested();
        assert_eq!(requested[0], "http://nas.local/movies/Extras/");
        // Not listed twice when the root links to it again.
        assert_eq!(requested.iter().filter(|u| u.ends_with("/Extras/")).count(), 1);
    }

    #[tokio::test]
    async fn test_seeds_outside_root_ignored() {
        let tree = library().dir("http://nas.local/music/", &[("Album/", "")]);
        let options = CrawlOptions {
            seeds: vec![ListingEntry {
                name: "music".into(),
                url: "http://nas.local/music/".into(),
                is_dir: true,
                raw: String::new(),
            }],
            ..Default::default()
        };
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), options);
        let _ = drain(&mut crawler).await;

        assert!(!tree.requested().iter().any(|u| u.contains("/music/")));
    }

    #[tokio::test]
    async fn test_root_without_trailing_slash() {
        let tree = library();
        let root = Url::parse("http://nas.local/movies").unwrap();
        let mut crawler = Crawler::new(&tree, root, CrawlOptions::default());
        assert_eq!(crawler.root(), ROOT);

        let events = drain(&mut crawler).await;
        assert_eq!(titles(&events).len(), 2);
        assert_eq!(tree.requested()[0], ROOT);
    }

    #[tokio::test]
    async fn test_one_title_per_movie_folder() {
        let folder = "http://nas.local/movies/Inception%20(2010)/";
        let tree = FakeTree::default()
            .dir(ROOT, &[("Inception (2010)/", "")])
            .dir(
                folder,
                &[
                    ("sample.mkv", ""),
                    ("inception.mkv", ""),
                    ("trailer.mp4", ""),
                ],
            );
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), CrawlOptions::default());
        let events = drain(&mut crawler).await;

        let found = titles(&events);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Inception");
        assert_eq!(found[0].year, Some(2010));
        assert_eq!(found[0].file_url, format!("{folder}inception.mkv"));
        assert!(events.iter().any(|e| matches!(
            e,
            CrawlEvent::DirectoryListed { media_count: 3, url, .. } if url == folder
        )));
    }

    #[tokio::test]
    async fn test_loose_files_at_root_are_separate_titles() {
        let tree = FakeTree::default().dir(
            ROOT,
            &[("Alien (1979).mkv", ""), ("Aliens (1986).mkv", "")],
        );
        let mut crawler = Crawler::new(&tree, Url::parse(ROOT).unwrap(), CrawlOptions::default());
        let events = drain(&mut crawler).await;

        assert_eq!(titles(&events).len(), 2);
    }
}

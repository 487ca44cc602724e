// Incremental page loading.
//
// `Pager` is the pure state machine: it decides which page to request next and
// folds settled fetches into a de-duplicated item list. `FeedSession` drives a
// `Pager` from a spawned task so at most one fetch is in flight, a refresh can
// cancel it, and dropping the session cancels everything.
use crate::result::NetworkResult;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::future::Future;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Anything the pager can hold. The key de-duplicates items across pages.
pub trait PageItem: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub index: u32,
    /// `None` asks the server for everything at its default size.
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub index: u32,
    pub items: Vec<T>,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next_key.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Fetch `page_size` items at a time and append.
    Incremental { page_size: u32 },
    /// One fetch for everything; results replace the list in place.
    ReplaceAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    pub initial_index: u32,
    pub mode: LoadMode,
}

impl PagingConfig {
    pub fn incremental(initial_index: u32, page_size: u32) -> Self {
        Self {
            initial_index,
            mode: LoadMode::Incremental {
                page_size: page_size.max(1),
            },
        }
    }

    pub fn replace_all() -> Self {
        Self {
            initial_index: 1,
            mode: LoadMode::ReplaceAll,
        }
    }

    fn request(&self, index: u32) -> PageRequest {
        let size = match self.mode {
            LoadMode::Incremental { page_size } => Some(page_size),
            LoadMode::ReplaceAll => None,
        };
        PageRequest { index, size }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PagerState {
    Idle,
    LoadingInitial,
    Loaded { page: u32 },
    LoadingNext { page: u32 },
    Exhausted { page: u32 },
    /// `page` is the index that failed; `retry` asks for it again.
    Error { message: String, page: u32 },
}

impl PagerState {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            PagerState::LoadingInitial | PagerState::LoadingNext { .. }
        )
    }
}

/// Identifies one issued request. Completions carrying a ticket from before
/// the latest `refresh` are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    request: PageRequest,
}

impl Ticket {
    pub fn request(&self) -> PageRequest {
        self.request
    }
}

#[derive(Debug, Clone)]
pub struct Pager<T> {
    config: PagingConfig,
    state: PagerState,
    pages: Vec<Page<T>>,
    items: Vec<T>,
    seen: HashSet<String>,
    generation: u64,
    in_flight: Option<Ticket>,
}

impl<T: PageItem> Pager<T> {
    pub fn new(config: PagingConfig) -> Self {
        Self {
            config,
            state: PagerState::Idle,
            pages: Vec::new(),
            items: Vec::new(),
            seen: HashSet::new(),
            generation: 0,
            in_flight: None,
        }
    }

    pub fn config(&self) -> PagingConfig {
        self.config
    }

    pub fn state(&self) -> &PagerState {
        &self.state
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn pages(&self) -> &[Page<T>] {
        &self.pages
    }

    pub fn in_flight(&self) -> Option<PageRequest> {
        self.in_flight.map(|t| t.request)
    }

    pub fn has_next(&self) -> bool {
        self.pages.last().is_some_and(Page::has_next)
    }

    fn issue(&mut self, index: u32) -> Ticket {
        let ticket = Ticket {
            generation: self.generation,
            request: self.config.request(index),
        };
        self.in_flight = Some(ticket);
        self.state = if index == self.config.initial_index {
            PagerState::LoadingInitial
        } else {
            PagerState::LoadingNext { page: index }
        };
        ticket
    }

    /// First load. Only valid from `Idle`.
    pub fn start(&mut self) -> Option<Ticket> {
        if self.state != PagerState::Idle {
            return None;
        }
        Some(self.issue(self.config.initial_index))
    }

    /// Request the page after the last loaded one, if there is one and
    /// nothing is loading.
    pub fn load_next(&mut self) -> Option<Ticket> {
        if self.in_flight.is_some() || !matches!(self.state, PagerState::Loaded { .. }) {
            return None;
        }
        let next = self.pages.last()?.next_key?;
        Some(self.issue(next))
    }

    /// Re-issue the page that failed.
    pub fn retry(&mut self) -> Option<Ticket> {
        match self.state {
            PagerState::Error { page, .. } if self.in_flight.is_none() => Some(self.issue(page)),
            _ => None,
        }
    }

    /// Drop loaded pages, any error and any in-flight request, then start
    /// over at the initial page.
    pub fn refresh(&mut self) -> Ticket {
        self.generation += 1;
        self.pages.clear();
        self.in_flight = None;
        // Replace-all lists keep showing the old items until new ones arrive.
        if matches!(self.config.mode, LoadMode::Incremental { .. }) {
            self.items.clear();
            self.seen.clear();
        }
        self.issue(self.config.initial_index)
    }

    /// Fold a settled fetch into the state. Returns `false` when the ticket
    /// is stale or unknown and nothing changed.
    pub fn complete(&mut self, ticket: Ticket, result: NetworkResult<Vec<T>>) -> bool {
        if self.in_flight != Some(ticket) || ticket.generation != self.generation {
            log::debug!("Dropping stale page result for {:?}", ticket.request);
            return false;
        }
        self.in_flight = None;
        let index = ticket.request.index;

        match result {
            NetworkResult::Success(fetched) => {
                let replace = self.config.mode == LoadMode::ReplaceAll;
                if replace {
                    self.items.clear();
                    self.seen.clear();
                }
                let prev_key = if index == self.config.initial_index {
                    None
                } else {
                    index.checked_sub(1)
                };
                // The last representable index ends the feed.
                let next_key = if replace || fetched.is_empty() {
                    None
                } else {
                    index.checked_add(1)
                };
                for item in &fetched {
                    if self.seen.insert(item.key().to_string()) {
                        self.items.push(item.clone());
                    }
                }
                self.pages.push(Page {
                    index,
                    items: fetched,
                    prev_key,
                    next_key,
                });
                self.state = if next_key.is_some() {
                    PagerState::Loaded { page: index }
                } else {
                    PagerState::Exhausted { page: index }
                };
            }
            NetworkResult::Error(message) => {
                self.state = PagerState::Error {
                    message,
                    page: index,
                };
            }
            NetworkResult::Loading => {
                self.state = PagerState::Error {
                    message: "Unknown error occurred".to_string(),
                    page: index,
                };
            }
        }
        true
    }

    pub fn snapshot(&self) -> FeedSnapshot<T> {
        FeedSnapshot {
            state: self.state.clone(),
            items: self.items.clone(),
            has_next: self.has_next(),
        }
    }
}

/// What a UI binds to.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot<T> {
    pub state: PagerState,
    pub items: Vec<T>,
    pub has_next: bool,
}

/// Source of pages, injected into a `FeedSession`.
pub trait PageFetcher<T>: Send + Sync + 'static {
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, NetworkResult<Vec<T>>>;
}

/// Adapts a closure into a `PageFetcher`.
pub struct FnFetcher<F>(F);

pub fn fetch_fn<T, F, Fut>(f: F) -> FnFetcher<F>
where
    F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NetworkResult<Vec<T>>> + Send + 'static,
{
    FnFetcher(f)
}

impl<T, F, Fut> PageFetcher<T> for FnFetcher<F>
where
    F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NetworkResult<Vec<T>>> + Send + 'static,
{
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, NetworkResult<Vec<T>>> {
        Box::pin((self.0)(request))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
    LoadMore,
    Retry,
    Refresh,
}

/// A running feed. Dropping it cancels any in-flight fetch.
#[derive(Debug)]
pub struct FeedSession<T> {
    commands: mpsc::UnboundedSender<FeedCommand>,
    snapshot: watch::Receiver<FeedSnapshot<T>>,
    task: JoinHandle<()>,
}

impl<T: PageItem> FeedSession<T> {
    /// Spawn the session on the current runtime and start the initial load.
    pub fn spawn<F: PageFetcher<T>>(fetcher: F, config: PagingConfig) -> Self {
        let pager = Pager::new(config);
        let (snap_tx, snapshot) = watch::channel(pager.snapshot());
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_feed(fetcher, pager, rx, snap_tx));
        Self {
            commands,
            snapshot,
            task,
        }
    }

    fn send(&self, command: FeedCommand) {
        if self.commands.send(command).is_err() {
            log::debug!("Feed session already stopped; dropping {:?}", command);
        }
    }

    pub fn load_more(&self) {
        self.send(FeedCommand::LoadMore);
    }

    pub fn retry(&self) {
        self.send(FeedCommand::Retry);
    }

    pub fn refresh(&self) {
        self.send(FeedCommand::Refresh);
    }

    pub fn snapshot(&self) -> FeedSnapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot<T>> {
        self.snapshot.clone()
    }

    /// Wait until a published snapshot satisfies `pred`. `None` if the
    /// session stopped first.
    pub async fn wait_for<P>(&mut self, pred: P) -> Option<FeedSnapshot<T>>
    where
        P: FnMut(&FeedSnapshot<T>) -> bool,
    {
        self.snapshot.wait_for(pred).await.ok().map(|s| s.clone())
    }

    /// Tear the session down.
    pub fn close(self) {}
}

impl<T> Drop for FeedSession<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_feed<T, F>(
    fetcher: F,
    mut pager: Pager<T>,
    mut rx: mpsc::UnboundedReceiver<FeedCommand>,
    snapshot: watch::Sender<FeedSnapshot<T>>,
) where
    T: PageItem,
    F: PageFetcher<T>,
{
    let publish = |pager: &Pager<T>| {
        snapshot.send_replace(pager.snapshot());
    };

    let mut next = pager.start();
    publish(&pager);

    loop {
        let ticket = match next.take() {
            Some(ticket) => ticket,
            None => match rx.recv().await {
                Some(command) => {
                    next = match command {
                        FeedCommand::LoadMore => pager.load_next(),
                        FeedCommand::Retry => pager.retry(),
                        FeedCommand::Refresh => Some(pager.refresh()),
                    };
                    if next.is_some() {
                        publish(&pager);
                    }
                    continue;
                }
                None => break,
            },
        };

        let mut fetch = fetcher.fetch(ticket.request());
        let settled = loop {
            tokio::select! {
                result = &mut fetch => break Some(result),
                command = rx.recv() => match command {
                    Some(FeedCommand::Refresh) => {
                        // Dropping `fetch` cancels the request in flight.
                        next = Some(pager.refresh());
                        publish(&pager);
                        break None;
                    }
                    Some(other) => log::debug!("Ignoring {:?} while a page is loading", other),
                    None => return,
                },
            }
        };

        if let Some(result) = settled
            && pager.complete(ticket, result)
        {
            publish(&pager);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl PageItem for Item {
        fn key(&self) -> &str {
            &self.0
        }
    }

    fn items(keys: &[&str]) -> Vec<Item> {
        keys.iter().map(|k| Item(k.to_string())).collect()
    }

    #[test]
    fn initial_page_has_no_prev_key() {
        let mut pager = Pager::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        assert_eq!(t.request(), PageRequest { index: 1, size: Some(2) });
        assert_eq!(*pager.state(), PagerState::LoadingInitial);

        assert!(pager.complete(t, NetworkResult::Success(items(&["a", "b"]))));
        let page = &pager.pages()[0];
        assert_eq!(page.prev_key, None);
        assert_eq!(page.next_key, Some(2));
        assert_eq!(*pager.state(), PagerState::Loaded { page: 1 });
    }

    #[test]
    fn empty_page_exhausts_feed() {
        let mut pager = Pager::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        pager.complete(t, NetworkResult::Success(items(&["a", "b"])));

        let t2 = pager.load_next().unwrap();
        assert_eq!(*pager.state(), PagerState::LoadingNext { page: 2 });
        pager.complete(t2, NetworkResult::Success(Vec::new()));

        let last = pager.pages().last().unwrap();
        assert_eq!(last.prev_key, Some(1));
        assert!(!last.has_next());
        assert!(!pager.has_next());
        assert_eq!(*pager.state(), PagerState::Exhausted { page: 2 });
        assert!(pager.load_next().is_none());
    }

    #[test]
    fn last_representable_index_ends_feed() {
        let mut pager = Pager::new(PagingConfig::incremental(u32::MAX, 2));
        let t = pager.start().unwrap();
        assert!(pager.complete(t, NetworkResult::Success(items(&["a"]))));
        assert_eq!(pager.pages()[0].next_key, None);
        assert_eq!(*pager.state(), PagerState::Exhausted { page: u32::MAX });
        assert!(pager.load_next().is_none());
    }

    #[test]
    fn only_one_request_in_flight() {
        let mut pager = Pager::<Item>::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        assert!(pager.start().is_none());
        assert!(pager.load_next().is_none());
        assert!(pager.retry().is_none());
        assert_eq!(pager.in_flight(), Some(t.request()));
    }

    #[test]
    fn duplicates_across_pages_are_dropped() {
        let mut pager = Pager::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        pager.complete(t, NetworkResult::Success(items(&["a", "b"])));
        let t = pager.load_next().unwrap();
        pager.complete(t, NetworkResult::Success(items(&["b", "c"])));

        assert_eq!(pager.items(), items(&["a", "b", "c"]).as_slice());
        assert_eq!(pager.pages()[1].items.len(), 2);
    }

    #[test]
    fn retry_reissues_failed_page() {
        let mut pager = Pager::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        pager.complete(t, NetworkResult::Success(items(&["a"])));
        let t = pager.load_next().unwrap();
        pager.complete(t, NetworkResult::Error("Connection timeout. Please try again.".into()));

        assert_eq!(
            *pager.state(),
            PagerState::Error {
                message: "Connection timeout. Please try again.".to_string(),
                page: 2
            }
        );
        assert_eq!(pager.items().len(), 1);

        let again = pager.retry().unwrap();
        assert_eq!(again.request().index, 2);
        assert_eq!(*pager.state(), PagerState::LoadingNext { page: 2 });
    }

    #[test]
    fn refresh_discards_error_and_stale_results() {
        let mut pager = Pager::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        pager.complete(t, NetworkResult::Success(items(&["a", "b"])));
        let stale = pager.load_next().unwrap();

        let fresh = pager.refresh();
        assert_eq!(fresh.request().index, 1);
        assert_eq!(*pager.state(), PagerState::LoadingInitial);
        assert!(pager.items().is_empty());

        assert!(!pager.complete(stale, NetworkResult::Success(items(&["z"]))));
        assert!(pager.complete(fresh, NetworkResult::Success(items(&["c"]))));
        assert_eq!(pager.items(), items(&["c"]).as_slice());
    }

    #[test]
    fn refresh_clears_error_state() {
        let mut pager = Pager::<Item>::new(PagingConfig::incremental(1, 2));
        let t = pager.start().unwrap();
        pager.complete(t, NetworkResult::Error("boom".into()));
        assert!(matches!(pager.state(), PagerState::Error { .. }));

        pager.refresh();
        assert_eq!(*pager.state(), PagerState::LoadingInitial);
    }

    #[test]
    fn replace_all_mode_loads_once_and_replaces() {
        let mut pager = Pager::new(PagingConfig::replace_all());
        let t = pager.start().unwrap();
        assert_eq!(t.request().size, None);
        pager.complete(t, NetworkResult::Success(items(&["a", "b"])));
        assert_eq!(*pager.state(), PagerState::Exhausted { page: 1 });
        assert!(pager.load_next().is_none());

        let t = pager.refresh();
        // Old items stay visible while the replacement loads.
        assert_eq!(pager.items().len(), 2);
        pager.complete(t, NetworkResult::Success(items(&["c"])));
        assert_eq!(pager.items(), items(&["c"]).as_slice());
    }
}

//! Resumable traversal of linked collection pages

use futures::Stream;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::page::CollectionPage;
use crate::api::request::{RequestAdapter, RequestInformation, decode_response};
use crate::error::{OrchestrationError, Result};

/// Hook applied to every page request before it is sent
pub type RequestConfigurator = Box<dyn Fn(RequestInformation) -> RequestInformation + Send + Sync>;

/// Where a [`PageIterator`] is in its traversal
///
/// `Paused` and `Delta` can be resumed; `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageIteratorState {
    NotStarted,
    IntrapageIteration,
    InterpageIteration,
    Paused,
    Delta,
    Complete,
}

/// Drains the items of a collection across next links, stopping at a delta link
///
/// Drive it with the callback-based [`iterate`](Self::iterate), item by item with
/// [`next_item`](Self::next_item), or as a [`Stream`] via
/// [`into_stream`](Self::into_stream).
pub struct PageIterator<P: CollectionPage> {
    adapter: Arc<dyn RequestAdapter>,
    current_page: Option<P>,
    queue: VecDeque<P::Item>,
    next_link: Option<String>,
    delta_link: Option<String>,
    state: PageIteratorState,
    headers: HashMap<String, String>,
    configurator: Option<RequestConfigurator>,
}

pub struct PageIteratorBuilder<P> {
    adapter: Arc<dyn RequestAdapter>,
    first_page: P,
    headers: HashMap<String, String>,
    configurator: Option<RequestConfigurator>,
}

impl<P: CollectionPage> PageIteratorBuilder<P> {
    /// Header sent with every page fetch
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn request_configurator<F>(mut self, configurator: F) -> Self
    where
        F: Fn(RequestInformation) -> RequestInformation + Send + Sync + 'static,
    {
        self.configurator = Some(Box::new(configurator));
        self
    }

    /// Fails when the first page carries no item collection
    pub fn build(self) -> Result<PageIterator<P>> {
        let mut first_page = self.first_page;
        let items = first_page.take_items().ok_or_else(|| {
            OrchestrationError::invalid_argument("page type does not expose a collection of items")
        })?;

        Ok(PageIterator {
            adapter: self.adapter,
            current_page: Some(first_page),
            queue: items.into(),
            next_link: None,
            delta_link: None,
            state: PageIteratorState::NotStarted,
            headers: self.headers,
            configurator: self.configurator,
        })
    }
}

impl<P> PageIterator<P>
where
    P: CollectionPage + DeserializeOwned + Send,
    P::Item: Send,
{
    pub fn builder(adapter: Arc<dyn RequestAdapter>, first_page: P) -> PageIteratorBuilder<P> {
        PageIteratorBuilder {
            adapter,
            first_page,
            headers: HashMap::new(),
            configurator: None,
        }
    }

    pub fn new(adapter: Arc<dyn RequestAdapter>, first_page: P) -> Result<Self> {
        Self::builder(adapter, first_page).build()
    }

    pub fn state(&self) -> PageIteratorState {
        self.state
    }

    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    pub fn delta_link(&self) -> Option<&str> {
        self.delta_link.as_deref()
    }

    /// Items of the current page not yet delivered
    pub fn pending_items(&self) -> usize {
        self.queue.len()
    }

    /// Offer items to `callback` until it returns `false` or the traversal ends
    ///
    /// An item the callback declines stays queued and is offered again on the
    /// next call. From `Delta`, the stored delta link is fetched first.
    pub async fn iterate<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&P::Item) -> bool + Send,
    {
        if self.state == PageIteratorState::Complete {
            return Ok(());
        }
        if self.state == PageIteratorState::Delta {
            self.fetch_page().await?;
        }

        loop {
            self.state = PageIteratorState::IntrapageIteration;
            while let Some(item) = self.queue.front() {
                if !callback(item) {
                    self.state = PageIteratorState::Paused;
                    debug!("Page iteration paused with {} items queued", self.queue.len());
                    return Ok(());
                }
                self.queue.pop_front();
            }

            if !self.advance().await? {
                return Ok(());
            }
        }
    }

    /// Next item in the traversal, fetching pages as needed
    ///
    /// Returns `None` once the traversal reaches `Delta` or `Complete`. Calling it
    /// again from `Delta` starts the next round of changes.
    pub async fn next_item(&mut self) -> Result<Option<P::Item>> {
        if self.state == PageIteratorState::Complete {
            return Ok(None);
        }
        if self.state == PageIteratorState::Delta {
            self.fetch_page().await?;
        }

        loop {
            self.state = PageIteratorState::IntrapageIteration;
            if let Some(item) = self.queue.pop_front() {
                return Ok(Some(item));
            }
            if !self.advance().await? {
                return Ok(None);
            }
        }
    }

    /// Stream of items ending at the next `Delta` or `Complete`
    pub fn into_stream(self) -> impl Stream<Item = Result<P::Item>> {
        futures::stream::try_unfold(self, |mut iterator| async move {
            Ok(iterator.next_item().await?.map(|item| (item, iterator)))
        })
    }

    /// Follow the drained page's next link, or settle in `Delta`/`Complete`
    ///
    /// Returns whether a new page was fetched.
    async fn advance(&mut self) -> Result<bool> {
        let (next, delta) = match &self.current_page {
            Some(page) => (
                page.next_link().map(str::to_string),
                page.delta_link().map(str::to_string),
            ),
            None => (None, None),
        };

        if let Some(next) = next {
            self.next_link = Some(next);
            self.delta_link = None;
            self.fetch_page().await?;
            return Ok(self.current_page.is_some());
        }

        if let Some(delta) = delta {
            info!("Page iteration reached delta link");
            self.delta_link = Some(delta);
            self.next_link = None;
            self.state = PageIteratorState::Delta;
        } else {
            debug!("Page iteration complete");
            self.state = PageIteratorState::Complete;
        }
        Ok(false)
    }

    /// Fetch the page behind the stored next or delta link
    ///
    /// The state only changes once a page arrives, so a failed fetch can be
    /// retried from where it left off.
    async fn fetch_page(&mut self) -> Result<()> {
        let link = self
            .next_link
            .clone()
            .or_else(|| self.delta_link.clone())
            .ok_or_else(|| OrchestrationError::invalid_argument("no link to fetch the next page from"))?;

        let mut request = RequestInformation::get(link.clone());
        for (name, value) in &self.headers {
            request.set_header(name.clone(), value.clone());
        }
        if let Some(configurator) = &self.configurator {
            request = configurator(request);
        }

        debug!("Fetching page {}", link);
        let response = self.adapter.send(request).await?;
        let Some(mut page) = decode_response::<P>(response)? else {
            debug!("Page request to {} returned no content", link);
            self.current_page = None;
            self.state = PageIteratorState::Complete;
            return Ok(());
        };

        if page.next_link() == Some(link.as_str()) {
            return Err(OrchestrationError::NextLinkLoop { link });
        }

        self.state = PageIteratorState::InterpageIteration;
        let items = page.take_items().unwrap_or_default();
        debug!("Fetched page with {} items", items.len());
        self.queue.extend(items);
        self.current_page = Some(page);
        Ok(())
    }
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use url::Url;

use crate::dom::{Dom, NodeId};

/// A fetched and parsed resource, ready to become a document.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub title: String,
    pub dom: Dom,
}

impl LoadedPage {
    pub fn blank(url: Url) -> Self {
        Self {
            url,
            title: String::new(),
            dom: Dom::blank(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("http status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// The network collaborator. Any error means "no navigation happens".
pub trait ResourceLoader {
    fn load(&mut self, url: &Url) -> Result<LoadedPage, LoadError>;
}

type PageBuilder = Rc<dyn Fn(&mut Dom, NodeId)>;

#[derive(Clone)]
enum MockResponse {
    Page {
        title: String,
        builder: Option<PageBuilder>,
    },
    Redirect(Url),
    Failure(LoadError),
}

#[derive(Default)]
struct MockLoaderState {
    responses: HashMap<String, MockResponse>,
    requests: Vec<Url>,
    strict: bool,
}

/// In-memory loader keyed by URL (fragment ignored).
///
/// Clones share state, so a test can keep a handle after moving one into a
/// [`Session`](crate::Session). Unknown URLs load as blank pages unless the
/// loader is strict, in which case they fail with a 404.
#[derive(Clone, Default)]
pub struct MockLoader {
    state: Rc<RefCell<MockLoaderState>>,
}

impl fmt::Debug for MockLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MockLoader")
            .field("pages", &state.responses.len())
            .field("requests", &state.requests)
            .field("strict", &state.strict)
            .finish()
    }
}

fn response_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => url.to_string(),
    }
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        let loader = Self::default();
        loader.state.borrow_mut().strict = true;
        loader
    }

    /// A blank page with the given title.
    pub fn page(&self, url: &str, title: &str) {
        self.insert(
            url,
            MockResponse::Page {
                title: title.to_string(),
                builder: None,
            },
        );
    }

    /// A page whose `<body>` is filled in by `builder`.
    pub fn page_with<F>(&self, url: &str, title: &str, builder: F)
    where
        F: Fn(&mut Dom, NodeId) + 'static,
    {
        self.insert(
            url,
            MockResponse::Page {
                title: title.to_string(),
                builder: Some(Rc::new(builder)),
            },
        );
    }

    pub fn redirect(&self, from: &str, to: &str) {
        if let Ok(target) = Url::parse(to) {
            self.insert(from, MockResponse::Redirect(target));
        }
    }

    pub fn fail(&self, url: &str, error: LoadError) {
        self.insert(url, MockResponse::Failure(error));
    }

    pub fn take_requests(&self) -> Vec<Url> {
        std::mem::take(&mut self.state.borrow_mut().requests)
    }

    fn insert(&self, url: &str, response: MockResponse) {
        self.state
            .borrow_mut()
            .responses
            .insert(response_key(url), response);
    }

    fn response(&self, url: &Url) -> Option<MockResponse> {
        self.state
            .borrow()
            .responses
            .get(&response_key(url.as_str()))
            .cloned()
    }
}

const MAX_REDIRECTS: usize = 20;

impl ResourceLoader for MockLoader {
    fn load(&mut self, url: &Url) -> Result<LoadedPage, LoadError> {
        let mut current = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            self.state.borrow_mut().requests.push(current.clone());
            match self.response(&current) {
                Some(MockResponse::Page { title, builder }) => {
                    let mut page = LoadedPage::blank(current);
                    page.title = title;
                    if let (Some(builder), Some(body)) = (builder, page.dom.body()) {
                        builder(&mut page.dom, body);
                    }
                    return Ok(page);
                }
                Some(MockResponse::Redirect(target)) => {
                    current = target;
                }
                Some(MockResponse::Failure(error)) => return Err(error),
                None if self.state.borrow().strict => return Err(LoadError::Status(404)),
                None => return Ok(LoadedPage::blank(current)),
            }
        }
        Err(LoadError::Transport(format!(
            "too many redirects starting at {url}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn pages_ignore_fragment_and_record_requests() {
        let handle = MockLoader::new();
        handle.page_with("http://app.local/a.html", "A", |dom, body| {
            dom.create_element(body, "a", &[("id", "next"), ("href", "b.html")])
                .expect("append anchor");
        });
        let mut loader = handle.clone();

        let page = loader.load(&url("http://app.local/a.html#top")).expect("page");
        assert_eq!(page.title, "A");
        assert!(page.dom.by_id("next").is_some());
        assert_eq!(handle.take_requests(), vec![url("http://app.local/a.html#top")]);
    }

    #[test]
    fn strict_loader_fails_unknown_urls() {
        let mut loader = MockLoader::strict();
        loader.fail("http://app.local/down", LoadError::Transport("reset".into()));
        assert_eq!(
            loader.load(&url("http://app.local/missing")).err(),
            Some(LoadError::Status(404))
        );
        assert_eq!(
            loader.load(&url("http://app.local/down")).err(),
            Some(LoadError::Transport("reset".into()))
        );
    }

    #[test]
    fn redirects_report_final_url() {
        let mut loader = MockLoader::new();
        loader.redirect("http://app.local/old", "http://app.local/new");
        loader.page("http://app.local/new", "New");
        let page = loader.load(&url("http://app.local/old")).expect("page");
        assert_eq!(page.url, url("http://app.local/new"));
        assert_eq!(page.title, "New");
    }
}

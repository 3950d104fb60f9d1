use std::collections::HashMap;
use std::fmt;

use url::{Origin, Url};

use crate::context::ContextId;
use crate::dom::Dom;

/// Opaque handle of one loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub(crate) usize);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "document#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    url: Url,
    title: String,
    origin: Origin,
    dom: Dom,
    context: ContextId,
}

impl Document {
    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fragment navigations and traversals move the URL without reloading.
    pub(crate) fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Computed once at creation; opaque origins only ever equal themselves.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub(crate) fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    /// The browsing context this document was loaded into.
    pub fn context(&self) -> ContextId {
        self.context
    }
}

#[derive(Debug, Default)]
pub(crate) struct DocumentStore {
    documents: HashMap<DocumentId, Document>,
    next_id: usize,
}

impl DocumentStore {
    pub(crate) fn insert(
        &mut self,
        url: Url,
        title: String,
        origin: Option<Origin>,
        dom: Dom,
        context: ContextId,
    ) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        let origin = origin.unwrap_or_else(|| url.origin());
        self.documents.insert(
            id,
            Document {
                id,
                url,
                title,
                origin,
                dom,
                context,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: DocumentId) -> Option<Document> {
        self.documents.remove(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.documents.len()
    }
}

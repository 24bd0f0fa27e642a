//! Editor-open documents. While a document is open its text, not the file on
//! disk, is what the server analyzes.

use std::collections::HashMap;
use std::path::PathBuf;

use lsp_types::Url;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub uri: Url,
    pub text: String,
    pub version: i32,
}

impl Document {
    pub fn path(&self) -> PathBuf {
        self.uri
            .to_file_path()
            .unwrap_or_else(|_| PathBuf::from(self.uri.path()))
    }
}

#[derive(Debug, Default)]
pub struct Documents {
    open: RwLock<HashMap<Url, Document>>,
}

impl Documents {
    pub fn new() -> Documents {
        Documents::default()
    }

    /// Stores the full text of `uri`, replacing any previous version.
    pub async fn upsert(&self, uri: Url, text: String, version: i32) {
        let document = Document {
            uri: uri.clone(),
            text,
            version,
        };
        self.open.write().await.insert(uri, document);
    }

    pub async fn close(&self, uri: &Url) -> Option<Document> {
        self.open.write().await.remove(uri)
    }

    pub async fn get(&self, uri: &Url) -> Option<Document> {
        self.open.read().await.get(uri).cloned()
    }

    pub async fn text(&self, uri: &Url) -> Option<String> {
        self.open.read().await.get(uri).map(|document| document.text.clone())
    }

    /// Snapshot of every open document, ordered by URI.
    pub async fn all(&self) -> Vec<Document> {
        let mut documents: Vec<Document> = self.open.read().await.values().cloned().collect();
        documents.sort_by(|a, b| a.uri.cmp(&b.uri));
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///site/{name}")).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let documents = Documents::new();

        documents.upsert(uri("b.md"), "one".into(), 1).await;
        documents.upsert(uri("a.md"), "a".into(), 1).await;
        documents.upsert(uri("b.md"), "two".into(), 2).await;

        let b = documents.get(&uri("b.md")).await.unwrap();
        assert_eq!(b.text, "two");
        assert_eq!(b.version, 2);
        assert_eq!(b.path(), PathBuf::from("/site/b.md"));

        let all = documents.all().await;
        assert_eq!(all.iter().map(|d| d.uri.clone()).collect::<Vec<_>>(), vec![uri("a.md"), uri("b.md")]);

        assert!(documents.close(&uri("a.md")).await.is_some());
        assert!(documents.text(&uri("a.md")).await.is_none());
        assert!(documents.close(&uri("a.md")).await.is_none());
    }
}

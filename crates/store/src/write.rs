use std::fmt::Debug;
use std::sync::Arc;

use bson::Document;
use futures::FutureExt;
use futures::future::BoxFuture;
use mongodb::Collection;
use newsmirror_core::error::{MirrorError, Result};

/// Destination for telemetry documents. Implementations report failures through the
/// returned `Result` and never panic; callers decide whether to log or drop.
pub trait DocumentSink: Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn insert_one(&self, doc: Document) -> BoxFuture<'static, Result<()>>;

    fn insert_many(&self, docs: Vec<Document>) -> BoxFuture<'static, Result<()>>;
}

pub type SharedSink = Arc<dyn DocumentSink>;

#[derive(Clone, Debug)]
pub struct MongoSink {
    collection: Collection<Document>,
}

impl MongoSink {
    pub fn new(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    pub fn shared(self) -> SharedSink {
        Arc::new(self)
    }
}

impl DocumentSink for MongoSink {
    fn name(&self) -> &str {
        self.collection.name()
    }

    fn insert_one(&self, doc: Document) -> BoxFuture<'static, Result<()>> {
        let collection = self.collection.clone();
        async move {
            collection.insert_one(doc).await.map(|_| ()).map_err(|e| {
                MirrorError::Store(format!("insert into {} failed: {e}", collection.name()))
            })
        }
        .boxed()
    }

    fn insert_many(&self, docs: Vec<Document>) -> BoxFuture<'static, Result<()>> {
        let collection = self.collection.clone();
        async move {
            if docs.is_empty() {
                return Ok(());
            }
            collection.insert_many(docs).await.map(|_| ()).map_err(|e| {
                MirrorError::Store(format!(
                    "bulk insert into {} failed: {e}",
                    collection.name()
                ))
            })
        }
        .boxed()
    }
}

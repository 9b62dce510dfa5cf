use bson::doc;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::{Client, Database};
use newsmirror_core::config::{MongoConfig, MongoTarget};
use newsmirror_core::error::{MirrorError, Result};

use crate::write::MongoSink;

const APP_NAME: &str = "newsmirror";

/// Shared handle to the telemetry database. Cloning is cheap; the driver pools connections.
#[derive(Clone, Debug)]
pub struct Store {
    client: Client,
    db: Database,
    log_collection: String,
    trace_collection: String,
    metric_collection: String,
}

impl Store {
    /// Builds a client and pings the database, so an unreachable server fails here
    /// rather than on the first write.
    pub async fn connect(cfg: &MongoConfig) -> Result<Self> {
        let options = client_options(cfg).await?;
        let client = Client::with_options(options)
            .map_err(|e| MirrorError::Store(format!("failed to create mongo client: {e}")))?;
        let db = client.database(&cfg.db_name);

        let store = Self {
            client,
            db,
            log_collection: cfg.log_collection.clone(),
            trace_collection: cfg.trace_collection.clone(),
            metric_collection: cfg.metric_collection.clone(),
        };
        store.ping().await?;
        tracing::debug!(db = %cfg.db_name, "connected to telemetry database");
        Ok(store)
    }

    pub async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| MirrorError::Store(format!("ping {} failed: {e}", self.db.name())))
    }

    pub fn db_name(&self) -> &str {
        self.db.name()
    }

    pub fn logs(&self) -> MongoSink {
        MongoSink::new(self.db.collection(&self.log_collection))
    }

    pub fn traces(&self) -> MongoSink {
        MongoSink::new(self.db.collection(&self.trace_collection))
    }

    pub fn metrics(&self) -> MongoSink {
        MongoSink::new(self.db.collection(&self.metric_collection))
    }

    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

async fn client_options(cfg: &MongoConfig) -> Result<ClientOptions> {
    let mut options = match cfg.target() {
        MongoTarget::Uri(uri) => ClientOptions::parse(uri)
            .await
            .map_err(|e| MirrorError::Config(format!("bad MONGO_URI: {e}")))?,
        MongoTarget::Host {
            host,
            port,
            credentials,
            auth_source,
        } => {
            let mut options = ClientOptions::default();
            options.hosts = vec![ServerAddress::Tcp {
                host: host.to_string(),
                port: Some(port),
            }];
            if let Some((username, password)) = credentials {
                let mut credential = Credential::default();
                credential.username = Some(username.to_string());
                credential.password = Some(password.to_string());
                credential.source = auth_source.map(str::to_string);
                options.credential = Some(credential);
            }
            options
        }
    };

    if options.server_selection_timeout.is_none() {
        options.server_selection_timeout = Some(cfg.server_selection_timeout);
    }
    if options.connect_timeout.is_none() {
        options.connect_timeout = Some(cfg.server_selection_timeout);
    }
    if options.app_name.is_none() {
        options.app_name = Some(APP_NAME.to_string());
    }
    Ok(options)
}

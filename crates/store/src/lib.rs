pub mod db;
pub mod write;

pub use db::Store;
pub use write::{DocumentSink, MongoSink, SharedSink};

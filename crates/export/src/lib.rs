pub mod attrs;
pub mod log;
pub mod metric;
pub mod span;

use futures::future::BoxFuture;
use newsmirror_core::error::{MirrorError, Result};
use tokio::runtime::Handle;

pub use log::{LogSinkHandle, LogSinkLayer, SINK_DIAGNOSTIC_TARGET};
pub use metric::DocumentMetricExporter;
pub use span::DocumentSpanExporter;

// The SDK drives exporters from its own threads, outside any tokio context; the driver
// needs one, so writes are spawned onto the runtime captured at construction.
pub(crate) async fn on_runtime(
    runtime: &Handle,
    write: BoxFuture<'static, Result<()>>,
) -> Result<()> {
    runtime
        .spawn(write)
        .await
        .map_err(|e| MirrorError::Export(format!("write task failed: {e}")))?
}

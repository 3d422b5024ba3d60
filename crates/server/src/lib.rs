pub mod protocol;
pub mod resources;
pub mod server;
pub mod state;
pub mod tools;

pub use resources::{CatalogError, ResourceCatalog, ResourceError, ResourceKind};
pub use server::{handle_request, ChannelState, McpServer, ServerError};
pub use state::AppState;
pub use tools::{ToolDispatcher, ToolError, ToolName};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Serve MCP over the process's stdin/stdout until EOF or `shutdown` fires.
pub async fn serve_stdio<F>(
    state: Arc<AppState>,
    shutdown_grace: Duration,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    McpServer::new(state)
        .with_shutdown_grace(shutdown_grace)
        .serve(tokio::io::stdin(), tokio::io::stdout(), shutdown)
        .await
}

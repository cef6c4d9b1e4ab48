//! Browser request interception over the Chrome DevTools Protocol.

mod cdp;
mod mock;
mod rules;
mod session;

pub use cdp::CdpClient;
pub use mock::{ClearMockApiTool, MockApiTool, SetHeadersTool};
pub use rules::{HttpMethod, InterceptionRule, MockRegistry, HTTP_METHODS};
pub use session::{find_browser_binary, BrowserEngine, BrowserSession, SessionManager};

use std::sync::Arc;
use tokio::sync::Mutex;

/// Global session manager (daemon model — persists across tool calls).
static SESSION_MANAGER: once_cell::sync::Lazy<Arc<Mutex<Option<SessionManager>>>> =
    once_cell::sync::Lazy::new(|| Arc::new(Mutex::new(None)));

pub(crate) async fn ensure_manager(
    workspace: &std::path::Path,
) -> Arc<Mutex<Option<SessionManager>>> {
    let mgr = SESSION_MANAGER.clone();
    {
        let mut guard = mgr.lock().await;
        if guard.is_none() {
            let base_dir = workspace.join("browser");
            *guard = Some(SessionManager::new(base_dir));
        }
    }
    mgr
}

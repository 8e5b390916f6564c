//! Shared types for the API layer.

use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::error::ServiceError;
use crate::models::PageRequest;
use crate::config::DEFAULT_PAGE_SIZE;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run one unit of database work on the blocking pool with its own
    /// connection. SQLite calls (and inference) never run on an async
    /// worker thread.
    pub async fn run<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &CoreState) -> Result<T, ServiceError> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || {
            let mut conn = core.open_db()?;
            work(&mut conn, &core).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
    }
}

// ═══════════════════════════════════════════════════════════
// Query helpers
// ═══════════════════════════════════════════════════════════

/// `?page=` for listings. Page size is fixed per listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn page_number(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page_number(), DEFAULT_PAGE_SIZE)
    }
}

/// Database models for Planboard
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts and global roles
/// - `team`: Teams
/// - `team_member`: Team membership with `pm`/`member` roles
/// - `project`: Projects owned by a user, optionally shared with a team
/// - `task`: Tasks within a project
/// - `subtask`: Checklist items within a task
/// - `event`: Calendar events
/// - `notification`: Per-user notifications
/// - `activity_log`: Append-only audit trail of mutations
///
/// # Example
///
/// ```no_run
/// use planboard_shared::models::project::{Project, CreateProject, ProjectStatus};
/// use planboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::default()).await?;
///
/// let project = Project::create(&pool, CreateProject {
///     owner_id: Uuid::new_v4(),
///     team_id: None,
///     name: "Website relaunch".to_string(),
///     description: None,
///     status: ProjectStatus::Planned,
///     start_date: None,
///     due_date: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};

pub mod activity_log;
pub mod event;
pub mod notification;
pub mod project;
pub mod subtask;
pub mod task;
pub mod team;
pub mod team_member;
pub mod user;

/// Default page size for list queries
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Upper bound on page size for list queries
pub const MAX_PAGE_SIZE: i64 = 200;

/// Limit/offset pagination shared by every list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Builds a page from optional query values, clamping to sane bounds
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let page = Pagination::default();
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn test_pagination_clamps() {
        let page = Pagination::new(Some(10_000), Some(-5));
        assert_eq!(page.limit, MAX_PAGE_SIZE);
        assert_eq!(page.offset, 0);

        let page = Pagination::new(Some(0), Some(20));
        assert_eq!(page.limit, 1);
        assert_eq!(page.offset, 20);
    }
}

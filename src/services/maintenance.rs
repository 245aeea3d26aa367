use sqlx::SqlitePool;

use crate::db::{InvitationRepository, SiteRepository};
use crate::error::AppResult;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub orphaned_sites_removed: u64,
    pub invitations_deactivated: u64,
}

impl MaintenanceReport {
    pub fn is_empty(&self) -> bool {
        self.orphaned_sites_removed == 0 && self.invitations_deactivated == 0
    }
}

pub struct MaintenanceService;

impl MaintenanceService {
    /// One cleanup pass: drop sites nobody actively belongs to and retire
    /// invite codes that can no longer be redeemed.
    pub async fn run_once(pool: &SqlitePool) -> AppResult<MaintenanceReport> {
        let mut report = MaintenanceReport::default();

        for site in SiteRepository::list_orphaned(pool).await? {
            if SiteRepository::delete_if_orphaned(pool, &site.id).await? {
                tracing::info!(site_id = %site.id, "Removed orphaned site");
                report.orphaned_sites_removed += 1;
            }
        }

        report.invitations_deactivated = InvitationRepository::deactivate_stale(pool).await?;

        Ok(report)
    }
}

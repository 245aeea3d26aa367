use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use super::directory::SiteDirectory;
use super::error::SiteError;
use super::notifier::{SiteChangeSubscription, SiteChanges, SiteNotifier};
use super::persist::SelectionFile;
use super::pointer::SessionPointer;
use crate::db::models::{AccessLevel, PageName, Role, SiteWithRole};
use crate::permissions::{effective_level, Permission};
use crate::services::site_resolver::select_site;

/// Permission of the bound site for one page, as a UI gate consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsePermission {
    pub level: AccessLevel,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_manage: bool,
    /// A site list fetch is in flight; the answer may change once it lands.
    pub is_loading: bool,
}

impl UsePermission {
    fn new(permission: Permission, is_loading: bool) -> Self {
        Self {
            level: permission.level,
            can_view: permission.can_view,
            can_edit: permission.can_edit,
            can_delete: permission.can_delete,
            can_manage: permission.can_manage,
            is_loading,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    sites: Vec<SiteWithRole>,
    current_site_id: Option<String>,
    in_flight: usize,
    /// Bumped by local list mutations; fetches that started before one are
    /// discarded.
    list_epoch: u64,
    error: Option<SiteError>,
}

impl RegistryState {
    fn current(&self) -> Option<&SiteWithRole> {
        let id = self.current_site_id.as_deref()?;
        self.sites.iter().find(|s| s.id() == id)
    }

    fn role_of(&self, site_id: &str) -> Option<Role> {
        self.sites.iter().find(|s| s.id() == site_id).map(|s| s.role)
    }

    fn owned_count(&self) -> usize {
        self.sites.iter().filter(|s| s.is_owner()).count()
    }
}

/// Client-side registry of the user's sites and the selected one.
///
/// The selection has two homes: the in-memory state here and the session
/// pointer the server reads. Every write updates memory first and the pointer
/// second under the same lock, then notifies subscribers. The lock is never
/// held across a network call.
pub struct SiteRegistry {
    directory: Arc<dyn SiteDirectory>,
    pointer: Arc<dyn SessionPointer>,
    persistence: Option<SelectionFile>,
    max_owned_sites: u32,
    state: Mutex<RegistryState>,
    notifier: SiteNotifier,
}

impl SiteRegistry {
    /// The pointer's current value seeds the selection until the first fetch
    /// reconciles it.
    pub fn new(
        directory: Arc<dyn SiteDirectory>,
        pointer: Arc<dyn SessionPointer>,
        max_owned_sites: u32,
    ) -> Self {
        let state = RegistryState {
            current_site_id: pointer.get(),
            ..Default::default()
        };
        Self {
            directory,
            pointer,
            persistence: None,
            max_owned_sites,
            state: Mutex::new(state),
            notifier: SiteNotifier::default(),
        }
    }

    /// Restore the last selection from `file` and keep it updated. A
    /// restored selection is mirrored to the session pointer straight away.
    pub fn with_persistence(mut self, file: SelectionFile) -> Self {
        if let Some(saved) = file.load() {
            self.pointer.set(Some(&saved));
            self.state
                .get_mut()
                .unwrap_or_else(|p| p.into_inner())
                .current_site_id = Some(saved);
        }
        self.persistence = Some(file);
        self
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Memory, then the session pointer, then the local file, then
    /// subscribers.
    fn select_locked(&self, state: &mut RegistryState, site_id: Option<String>) {
        state.current_site_id = site_id;
        let selected = state.current_site_id.as_deref();
        self.pointer.set(selected);
        if let Some(file) = &self.persistence {
            file.save(selected);
        }
        self.notifier.publish(selected);
        tracing::debug!(site_id = ?selected, "Current site updated");
    }

    fn record(&self, error: SiteError) -> SiteError {
        self.lock().error = Some(error.clone());
        error
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Load the user's sites and reconcile the selection.
    ///
    /// The previous selection is kept if it is still listed, otherwise the
    /// first site is selected. Reconciliation uses the selection at
    /// completion time, so a switch made while the request was in flight
    /// survives.
    pub async fn fetch_sites(&self) -> Result<(), SiteError> {
        let started_epoch = {
            let mut state = self.lock();
            state.in_flight += 1;
            state.list_epoch
        };

        let result = self.directory.list_sites().await;

        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        match result {
            Ok(sites) => {
                if state.list_epoch != started_epoch {
                    tracing::debug!("Discarding site list fetched before a local change");
                    return Ok(());
                }
                let next = select_site(&sites, state.current_site_id.as_deref())
                    .map(|s| s.id().to_string());
                state.sites = sites;
                self.select_locked(&mut state, next);
                Ok(())
            }
            Err(SiteError::NotAuthenticated) => {
                state.sites.clear();
                state.list_epoch += 1;
                self.select_locked(&mut state, None);
                state.error = Some(SiteError::NotAuthenticated);
                Err(SiteError::NotAuthenticated)
            }
            Err(e) => {
                // Keep the last known good list and selection.
                tracing::warn!("Failed to fetch sites: {}", e);
                state.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Bind `site_id`. Returns `false` and changes nothing when the site is
    /// not in the known list.
    pub fn switch_site(&self, site_id: &str) -> bool {
        let mut state = self.lock();
        if state.role_of(site_id).is_none() {
            tracing::debug!(site_id, "Ignoring switch to unknown site");
            return false;
        }
        self.select_locked(&mut state, Some(site_id.to_string()));
        true
    }

    /// Create a site and switch to it.
    ///
    /// The local owned-site check is advisory; the server enforces the same
    /// limit atomically. Once the server has created the site the call
    /// succeeds even if the follow-up refresh fails: the new site is added
    /// locally and the refresh error is only stored.
    pub async fn create_site(&self, name: &str) -> Result<SiteWithRole, SiteError> {
        {
            let mut state = self.lock();
            if state.owned_count() >= self.max_owned_sites as usize {
                let err = SiteError::SiteLimitReached(self.max_owned_sites);
                state.error = Some(err.clone());
                return Err(err);
            }
        }

        let created = self
            .directory
            .create_site(name)
            .await
            .map_err(|e| self.record(e))?;

        // Lists fetched before the creation would not contain the new site.
        self.lock().list_epoch += 1;
        if let Err(e) = self.fetch_sites().await {
            if e == SiteError::NotAuthenticated {
                return Err(e);
            }
            tracing::warn!(site_id = created.id(), "Site created but refresh failed: {}", e);
        }

        let mut state = self.lock();
        let refreshed = state.sites.iter().find(|s| s.id() == created.id()).cloned();
        let site = match refreshed {
            Some(site) => site,
            None => {
                state.sites.push(created.clone());
                created
            }
        };
        self.select_locked(&mut state, Some(site.id().to_string()));
        Ok(site)
    }

    /// Delete a site the user owns.
    pub async fn delete_site(&self, site_id: &str) -> Result<(), SiteError> {
        {
            let mut state = self.lock();
            if state.role_of(site_id) != Some(Role::Owner) {
                state.error = Some(SiteError::NotOwner);
                return Err(SiteError::NotOwner);
            }
        }

        self.directory
            .delete_site(site_id)
            .await
            .map_err(|e| self.record(e))?;

        self.forget_site(site_id);
        Ok(())
    }

    /// Leave a site the user does not own.
    pub async fn leave_site(&self, site_id: &str) -> Result<(), SiteError> {
        {
            let mut state = self.lock();
            let err = match state.role_of(site_id) {
                None => Some(SiteError::UnknownSite),
                Some(Role::Owner) => Some(SiteError::NotOwner),
                Some(_) => None,
            };
            if let Some(err) = err {
                state.error = Some(err.clone());
                return Err(err);
            }
        }

        self.directory
            .leave_site(site_id)
            .await
            .map_err(|e| self.record(e))?;

        self.forget_site(site_id);
        Ok(())
    }

    /// Drop a site locally, falling back to the first remaining one if it
    /// was selected.
    fn forget_site(&self, site_id: &str) {
        let mut state = self.lock();
        state.sites.retain(|s| s.id() != site_id);
        state.list_epoch += 1;
        if state.current_site_id.as_deref() == Some(site_id) {
            let next = state.sites.first().map(|s| s.id().to_string());
            self.select_locked(&mut state, next);
        }
    }

    /// Permission for `page` on the bound site. Never fails; anything
    /// unresolved is `close`.
    pub async fn use_permission(&self, page: PageName) -> UsePermission {
        let (site, is_loading) = {
            let state = self.lock();
            (state.current().cloned(), state.in_flight > 0)
        };

        let Some(site) = site else {
            return UsePermission::new(Permission::closed(), is_loading);
        };

        if site.role.is_privileged() {
            let level = effective_level(Some(site.role), None);
            return UsePermission::new(Permission::from_level(level), is_loading);
        }

        let permission = match self.directory.page_permission(site.id(), page).await {
            Ok(remote) => Permission::from_level(effective_level(Some(site.role), Some(remote.level))),
            Err(e) => {
                tracing::warn!(site_id = site.id(), page = page.as_str(), "Permission lookup failed: {}", e);
                Permission::closed()
            }
        };
        UsePermission::new(permission, is_loading)
    }

    /// Forget everything about the session, including the pointer.
    pub fn sign_out(&self) {
        let mut state = self.lock();
        state.sites.clear();
        state.error = None;
        state.list_epoch += 1;
        self.select_locked(&mut state, None);
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    // ------------------------------------------------------------------
    // Site-change notifications
    // ------------------------------------------------------------------

    pub fn on_site_change<F>(&self, callback: F) -> SiteChangeSubscription
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.notifier.on_site_change(callback)
    }

    pub fn subscribe(&self) -> SiteChanges {
        self.notifier.subscribe()
    }

    // ------------------------------------------------------------------
    // Computed state
    // ------------------------------------------------------------------

    pub fn sites(&self) -> Vec<SiteWithRole> {
        self.lock().sites.clone()
    }

    pub fn current_site(&self) -> Option<SiteWithRole> {
        self.lock().current().cloned()
    }

    /// Site every data query must be scoped to. `None` until a listed site
    /// is bound.
    pub fn current_site_id(&self) -> Option<String> {
        self.lock().current().map(|s| s.id().to_string())
    }

    pub fn is_owner(&self) -> bool {
        self.lock().current().is_some_and(|s| s.role == Role::Owner)
    }

    /// Owner or admin of the bound site.
    pub fn is_admin(&self) -> bool {
        self.lock().current().is_some_and(|s| s.role.is_privileged())
    }

    pub fn can_manage_members(&self) -> bool {
        self.is_admin()
    }

    pub fn owned_sites_count(&self) -> usize {
        self.lock().owned_count()
    }

    pub fn can_create_site(&self) -> bool {
        self.owned_sites_count() < self.max_owned_sites as usize
    }

    pub fn max_owned_sites(&self) -> u32 {
        self.max_owned_sites
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn error(&self) -> Option<SiteError> {
        self.lock().error.clone()
    }
}

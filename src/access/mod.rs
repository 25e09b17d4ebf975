//! Per-sheet access control.
//!
//! The collection manager never checks permissions itself. Callers consult
//! an [`AccessControl`] implementation before mutating a sheet; the only one
//! shipped here is [`GrantTable`], optionally backed by a grants file.

use crate::core::{Result, SheetError, SheetId};
use crate::storage::SnapshotFile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{Level, event};

pub type UserId = u64;

/// Account-wide role, issued by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    User,
}

impl FromStr for Role {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SuperAdmin" => Ok(Self::SuperAdmin),
            "User" => Ok(Self::User),
            other => Err(SheetError::invalid(format!("unknown role '{}'", other))),
        }
    }
}

/// Operation a user may be allowed to perform on a shared sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetPermission {
    AddColumn,
    DeleteColumn,
    UpdateColumn,
    AddRow,
    DeleteRow,
    UpdateRow,
}

impl SheetPermission {
    pub const ALL: [SheetPermission; 6] = [
        Self::AddColumn,
        Self::DeleteColumn,
        Self::UpdateColumn,
        Self::AddRow,
        Self::DeleteRow,
        Self::UpdateRow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddColumn => "addColumn",
            Self::DeleteColumn => "deleteColumn",
            Self::UpdateColumn => "updateColumn",
            Self::AddRow => "addRow",
            Self::DeleteRow => "deleteRow",
            Self::UpdateRow => "updateRow",
        }
    }

    /// Parses a list of permission names, reporting every unknown one at once.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<BTreeSet<Self>> {
        let mut parsed = BTreeSet::new();
        let mut invalid = Vec::new();
        for name in names {
            match name.as_ref().parse::<Self>() {
                Ok(permission) => {
                    parsed.insert(permission);
                }
                Err(_) => invalid.push(name.as_ref().to_string()),
            }
        }
        if !invalid.is_empty() {
            return Err(SheetError::invalid(format!(
                "Invalid permissions: {}",
                invalid.join(", ")
            )));
        }
        Ok(parsed)
    }
}

impl FromStr for SheetPermission {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| SheetError::invalid(format!("unknown permission '{}'", s)))
    }
}

impl fmt::Display for SheetPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a user on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SheetRole {
    Owner,
    Editor,
    Viewer,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn super_admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::SuperAdmin)
    }

    pub fn user(user_id: UserId) -> Self {
        Self::new(user_id, Role::User)
    }

    #[inline]
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetGrant {
    pub user_id: UserId,
    pub sheet_id: SheetId,
    pub role: SheetRole,
    pub permissions: BTreeSet<SheetPermission>,
}

impl SheetGrant {
    pub fn allows(&self, permission: SheetPermission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn grant_for(&self, user: UserId, sheet: SheetId) -> Option<SheetGrant>;

    async fn grants_for_sheet(&self, sheet: SheetId) -> Vec<SheetGrant>;

    async fn sheets_for_user(&self, user: UserId) -> Vec<SheetId>;

    /// Creates or updates the user's grant on `sheet`. The permission set is
    /// replaced only when `permissions` is non-empty.
    async fn share(
        &self,
        sheet: SheetId,
        user: UserId,
        role: SheetRole,
        permissions: Option<BTreeSet<SheetPermission>>,
    ) -> Result<SheetGrant>;

    /// Replaces the permission set of an existing grant.
    async fn set_permissions(
        &self,
        sheet: SheetId,
        user: UserId,
        permissions: BTreeSet<SheetPermission>,
    ) -> Result<SheetGrant>;

    async fn remove_user(&self, sheet: SheetId, user: UserId) -> Result<()>;

    /// Drops every grant on `sheet`, returning how many there were.
    async fn revoke_sheet(&self, sheet: SheetId) -> Result<usize>;

    async fn has_access(&self, actor: &Actor, sheet: SheetId) -> bool {
        actor.is_super_admin() || self.grant_for(actor.user_id, sheet).await.is_some()
    }

    async fn has_permission(
        &self,
        actor: &Actor,
        sheet: SheetId,
        permission: SheetPermission,
    ) -> bool {
        if actor.is_super_admin() {
            return true;
        }
        self.grant_for(actor.user_id, sheet)
            .await
            .is_some_and(|grant| grant.allows(permission))
    }
}

pub const GRANTS_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantsSnapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    grants: Vec<SheetGrant>,
}

type GrantMap = HashMap<(SheetId, UserId), SheetGrant>;

/// Grant storage keyed by `(sheet, user)`.
///
/// When opened on a file, every change is written there before it becomes
/// visible; a failed write leaves the table as it was.
#[derive(Default)]
pub struct GrantTable {
    grants: RwLock<GrantMap>,
    file: Option<Arc<SnapshotFile>>,
}

impl GrantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a grant table persisted at `path`, loading it if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = Arc::new(SnapshotFile::new(path.as_ref()));
        let loader = Arc::clone(&file);
        let loaded =
            tokio::task::spawn_blocking(move || loader.load::<GrantsSnapshot>()).await??;

        let mut grants = GrantMap::new();
        if let Some(snapshot) = loaded {
            if snapshot.version != GRANTS_VERSION {
                return Err(SheetError::Storage(format!(
                    "unsupported grants version {} (expected {})",
                    snapshot.version, GRANTS_VERSION
                )));
            }
            for grant in snapshot.grants {
                grants.insert((grant.sheet_id, grant.user_id), grant);
            }
            event!(
                Level::INFO,
                path = %file.path().display(),
                grants = grants.len(),
                "loaded grants"
            );
        }

        Ok(Self {
            grants: RwLock::new(grants),
            file: Some(file),
        })
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref().map(SnapshotFile::path)
    }

    /// Applies `change` to a copy of the table, persists the copy, then
    /// publishes it. Writers are serialized by the table's write lock.
    async fn mutate<T>(&self, change: impl FnOnce(&mut GrantMap) -> Result<T>) -> Result<T> {
        let mut grants = self.grants.write().await;
        let mut next = grants.clone();
        let out = change(&mut next)?;

        if let Some(file) = self.file.clone() {
            let mut list: Vec<SheetGrant> = next.values().cloned().collect();
            list.sort_by_key(|g| (g.sheet_id, g.user_id));
            let snapshot = GrantsSnapshot {
                version: GRANTS_VERSION,
                saved_at: Utc::now(),
                grants: list,
            };
            tokio::task::spawn_blocking(move || file.save(&snapshot)).await??;
        }

        *grants = next;
        Ok(out)
    }
}

fn missing_grant(sheet: SheetId, user: UserId) -> SheetError {
    SheetError::not_found(format!("access of user {} to {}", user, sheet))
}

#[async_trait]
impl AccessControl for GrantTable {
    async fn grant_for(&self, user: UserId, sheet: SheetId) -> Option<SheetGrant> {
        self.grants.read().await.get(&(sheet, user)).cloned()
    }

    async fn grants_for_sheet(&self, sheet: SheetId) -> Vec<SheetGrant> {
        let grants = self.grants.read().await;
        let mut found: Vec<SheetGrant> = grants
            .values()
            .filter(|g| g.sheet_id == sheet)
            .cloned()
            .collect();
        found.sort_by_key(|g| g.user_id);
        found
    }

    async fn sheets_for_user(&self, user: UserId) -> Vec<SheetId> {
        let grants = self.grants.read().await;
        let mut sheets: Vec<SheetId> = grants
            .keys()
            .filter(|(_, u)| *u == user)
            .map(|(s, _)| *s)
            .collect();
        sheets.sort();
        sheets
    }

    async fn share(
        &self,
        sheet: SheetId,
        user: UserId,
        role: SheetRole,
        permissions: Option<BTreeSet<SheetPermission>>,
    ) -> Result<SheetGrant> {
        self.mutate(|grants| {
            let grant = grants.entry((sheet, user)).or_insert_with(|| SheetGrant {
                user_id: user,
                sheet_id: sheet,
                role,
                permissions: BTreeSet::new(),
            });
            grant.role = role;
            if let Some(permissions) = permissions.filter(|p| !p.is_empty()) {
                grant.permissions = permissions;
            }
            Ok(grant.clone())
        })
        .await
    }

    async fn set_permissions(
        &self,
        sheet: SheetId,
        user: UserId,
        permissions: BTreeSet<SheetPermission>,
    ) -> Result<SheetGrant> {
        self.mutate(|grants| {
            let grant = grants
                .get_mut(&(sheet, user))
                .ok_or_else(|| missing_grant(sheet, user))?;
            grant.permissions = permissions;
            Ok(grant.clone())
        })
        .await
    }

    async fn remove_user(&self, sheet: SheetId, user: UserId) -> Result<()> {
        self.mutate(|grants| {
            grants
                .remove(&(sheet, user))
                .map(|_| ())
                .ok_or_else(|| missing_grant(sheet, user))
        })
        .await
    }

    async fn revoke_sheet(&self, sheet: SheetId) -> Result<usize> {
        self.mutate(|grants| {
            let before = grants.len();
            grants.retain(|(s, _), _| *s != sheet);
            Ok(before - grants.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_reports_every_unknown_name() {
        let err = SheetPermission::parse_all(&["addRow", "fly", "teleport"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument: Invalid permissions: fly, teleport"
        );

        let parsed = SheetPermission::parse_all(&["addRow", "deleteColumn"]).unwrap();
        assert!(parsed.contains(&SheetPermission::AddRow));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn permission_names_round_trip_through_serde() {
        let json = serde_json::to_string(&SheetPermission::UpdateColumn).unwrap();
        assert_eq!(json, "\"updateColumn\"");
    }

    #[tokio::test]
    async fn super_admin_bypasses_grants() {
        let table = GrantTable::new();
        let admin = Actor::super_admin(1);
        assert!(table.has_access(&admin, SheetId(3)).await);
        assert!(
            table
                .has_permission(&admin, SheetId(3), SheetPermission::DeleteRow)
                .await
        );
    }

    #[tokio::test]
    async fn share_keeps_permissions_unless_new_ones_are_given() {
        let table = GrantTable::new();
        let sheet = SheetId(1);
        let user = Actor::user(7);

        table
            .share(
                sheet,
                7,
                SheetRole::Editor,
                Some(BTreeSet::from([SheetPermission::AddRow])),
            )
            .await
            .unwrap();
        assert!(table.has_permission(&user, sheet, SheetPermission::AddRow).await);
        assert!(!table.has_permission(&user, sheet, SheetPermission::DeleteRow).await);

        let grant = table
            .share(sheet, 7, SheetRole::Viewer, Some(BTreeSet::new()))
            .await
            .unwrap();
        assert_eq!(grant.role, SheetRole::Viewer);
        assert!(grant.allows(SheetPermission::AddRow));
    }

    #[tokio::test]
    async fn removing_unknown_user_is_not_found() {
        let table = GrantTable::new();
        assert!(matches!(
            table.remove_user(SheetId(1), 5).await,
            Err(SheetError::NotFound(_))
        ));
        assert!(matches!(
            table.set_permissions(SheetId(1), 5, BTreeSet::new()).await,
            Err(SheetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn revoke_sheet_drops_only_that_sheet() {
        let table = GrantTable::new();
        for (sheet, user) in [(1, 1), (1, 2), (2, 1)] {
            table
                .share(SheetId(sheet), user, SheetRole::Viewer, None)
                .await
                .unwrap();
        }

        assert_eq!(table.revoke_sheet(SheetId(1)).await.unwrap(), 2);
        assert_eq!(table.sheets_for_user(1).await, vec![SheetId(2)]);
    }

    #[tokio::test]
    async fn grants_file_is_reloaded_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grants.json");

        {
            let table = GrantTable::open(&path).await.unwrap();
            table
                .share(
                    SheetId(3),
                    8,
                    SheetRole::Editor,
                    Some(BTreeSet::from([SheetPermission::UpdateRow])),
                )
                .await
                .unwrap();
            table.share(SheetId(4), 8, SheetRole::Viewer, None).await.unwrap();
            table.remove_user(SheetId(4), 8).await.unwrap();
        }

        let table = GrantTable::open(&path).await.unwrap();
        assert_eq!(table.file_path(), Some(path.as_path()));
        assert_eq!(table.sheets_for_user(8).await, vec![SheetId(3)]);
        assert!(
            table
                .has_permission(&Actor::user(8), SheetId(3), SheetPermission::UpdateRow)
                .await
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_grants_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let table = GrantTable::open(blocker.join("grants.json")).await.unwrap();

        let err = table
            .share(SheetId(1), 2, SheetRole::Viewer, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::Storage(_)));
        assert!(table.grant_for(2, SheetId(1)).await.is_none());
    }
}

//! Sheet lifecycle and permission-gated row and column operations.
//!
//! [`SheetService`] is what the HTTP layer talks to. It checks the actor
//! against the [`AccessControl`] collaborator and hands positional work to
//! the [`PositionedCollectionManager`].

use crate::access::{AccessControl, Actor, SheetGrant, SheetPermission, SheetRole, UserId};
use crate::collection::{PositionedCollectionManager, load_sheet};
use crate::core::{
    CellValue, ColumnChange, Payload, Position, PositionedRecord, Result, Sheet, SheetError,
    SheetId, SheetSnapshot,
};
use crate::storage::RecordStore;
use crate::transaction::{run_in_transaction, run_read};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Level, event};

/// Cell value of the row every new sheet starts with.
pub const DEFAULT_CELL: &str = "N/A";

#[derive(Clone)]
pub struct SheetService {
    store: Arc<dyn RecordStore>,
    access: Arc<dyn AccessControl>,
    rows: PositionedCollectionManager,
}

impl SheetService {
    pub fn new(store: Arc<dyn RecordStore>, access: Arc<dyn AccessControl>) -> Self {
        let rows = PositionedCollectionManager::new(Arc::clone(&store));
        Self {
            store,
            access,
            rows,
        }
    }

    pub fn manager(&self) -> &PositionedCollectionManager {
        &self.rows
    }

    pub fn access(&self) -> &Arc<dyn AccessControl> {
        &self.access
    }

    // ------------------------------------------------------------------
    // Sheets
    // ------------------------------------------------------------------

    /// Creates a sheet with one row of [`DEFAULT_CELL`] values at position 0
    /// and makes the creator its owner.
    pub async fn create_sheet(
        &self,
        actor: &Actor,
        name: &str,
        columns: Vec<String>,
    ) -> Result<SheetSnapshot> {
        require_super_admin(actor, "create sheets")?;
        let name = require_name(name)?;
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(SheetError::invalid("column names must not be empty"));
        }

        let snapshot = run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let sheet = tx.create_sheet(&name, columns).await?;
                let defaults = vec![CellValue::from(DEFAULT_CELL); sheet.column_count()];
                let first = tx.create_record(sheet.id, 0, defaults).await?;
                Ok(SheetSnapshot {
                    sheet,
                    rows: vec![first],
                })
            })
        })
        .await?;

        self.access
            .share(
                snapshot.sheet.id,
                actor.user_id,
                SheetRole::Owner,
                Some(SheetPermission::ALL.into_iter().collect()),
            )
            .await?;
        event!(
            Level::INFO,
            sheet = %snapshot.sheet.id,
            columns = snapshot.sheet.column_count(),
            owner = actor.user_id,
            "sheet created"
        );
        Ok(snapshot)
    }

    /// Every sheet for a SuperAdmin, otherwise only the shared ones. A
    /// non-blank `search` keeps the sheets whose name contains it, ignoring
    /// case.
    pub async fn list_sheets(&self, actor: &Actor, search: Option<&str>) -> Result<Vec<Sheet>> {
        let mut sheets = run_read(self.store.as_ref(), |tx| {
            Box::pin(async move { tx.list_sheets().await })
        })
        .await?;
        if let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            sheets.retain(|s| s.name.to_lowercase().contains(&needle));
        }
        if actor.is_super_admin() {
            return Ok(sheets);
        }
        let visible: BTreeSet<SheetId> = self
            .access
            .sheets_for_user(actor.user_id)
            .await
            .into_iter()
            .collect();
        Ok(sheets
            .into_iter()
            .filter(|s| visible.contains(&s.id))
            .collect())
    }

    /// Access is checked before existence, so callers without a grant cannot
    /// tell a missing sheet from a hidden one.
    pub async fn get_sheet(&self, actor: &Actor, sheet: SheetId) -> Result<SheetSnapshot> {
        self.require_access(actor, sheet).await?;
        self.rows.snapshot(sheet).await
    }

    pub async fn rename_sheet(&self, actor: &Actor, sheet: SheetId, name: &str) -> Result<Sheet> {
        require_super_admin(actor, "rename sheets")?;
        let name = require_name(name)?;
        run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move { tx.rename_sheet(sheet, &name).await })
        })
        .await
    }

    /// Deletes the sheet, all of its rows and every grant on it.
    pub async fn delete_sheet(&self, actor: &Actor, sheet: SheetId) -> Result<()> {
        require_super_admin(actor, "delete sheets")?;
        run_in_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move { tx.delete_sheet(sheet).await })
        })
        .await?;
        let revoked = self.access.revoke_sheet(sheet).await?;
        event!(Level::INFO, sheet = %sheet, grants = revoked, "sheet deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    pub async fn list_rows(&self, actor: &Actor, sheet: SheetId) -> Result<Vec<PositionedRecord>> {
        self.require_access(actor, sheet).await?;
        self.rows.list(sheet).await
    }

    pub async fn insert_row(
        &self,
        actor: &Actor,
        sheet: SheetId,
        payload: Payload,
        position: Option<Position>,
    ) -> Result<PositionedRecord> {
        self.require(actor, sheet, SheetPermission::AddRow).await?;
        self.rows.insert(sheet, payload, position).await
    }

    pub async fn update_row(
        &self,
        actor: &Actor,
        sheet: SheetId,
        position: Position,
        payload: Payload,
    ) -> Result<PositionedRecord> {
        self.require(actor, sheet, SheetPermission::UpdateRow).await?;
        self.rows.update_payload(sheet, position, payload).await
    }

    pub async fn move_row(
        &self,
        actor: &Actor,
        sheet: SheetId,
        source: Position,
        target: Position,
    ) -> Result<Vec<PositionedRecord>> {
        self.require(actor, sheet, SheetPermission::UpdateRow).await?;
        self.rows.move_record(sheet, source, target).await
    }

    pub async fn delete_row(
        &self,
        actor: &Actor,
        sheet: SheetId,
        position: Position,
    ) -> Result<PositionedRecord> {
        self.require(actor, sheet, SheetPermission::DeleteRow).await?;
        self.rows.delete(sheet, position).await
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    pub async fn change_columns(
        &self,
        actor: &Actor,
        sheet: SheetId,
        change: ColumnChange,
    ) -> Result<SheetSnapshot> {
        let permission = match change {
            ColumnChange::Insert { .. } => SheetPermission::AddColumn,
            ColumnChange::Delete { .. } => SheetPermission::DeleteColumn,
            ColumnChange::Rename { .. } | ColumnChange::Move { .. } => SheetPermission::UpdateColumn,
        };
        self.require(actor, sheet, permission).await?;
        self.rows.apply_column_change(sheet, change).await
    }

    // ------------------------------------------------------------------
    // Sharing
    // ------------------------------------------------------------------

    /// Grants each `(user, role)` access to the sheet. A non-empty
    /// `permissions` set replaces the permissions of every listed user.
    pub async fn share(
        &self,
        actor: &Actor,
        sheet: SheetId,
        users: Vec<(UserId, SheetRole)>,
        permissions: Option<BTreeSet<SheetPermission>>,
    ) -> Result<Vec<SheetGrant>> {
        require_super_admin(actor, "manage sheet access")?;
        if users.is_empty() {
            return Err(SheetError::invalid("users array is required"));
        }
        self.require_sheet(sheet).await?;

        for (user, role) in users {
            self.access
                .share(sheet, user, role, permissions.clone())
                .await?;
        }
        let grants = self.access.grants_for_sheet(sheet).await;
        event!(Level::INFO, sheet = %sheet, grants = grants.len(), "sheet access updated");
        Ok(grants)
    }

    pub async fn set_permissions(
        &self,
        actor: &Actor,
        sheet: SheetId,
        user: UserId,
        permissions: BTreeSet<SheetPermission>,
    ) -> Result<SheetGrant> {
        require_super_admin(actor, "update permissions")?;
        self.require_sheet(sheet).await?;
        self.access.set_permissions(sheet, user, permissions).await
    }

    pub async fn remove_user(&self, actor: &Actor, sheet: SheetId, user: UserId) -> Result<()> {
        require_super_admin(actor, "remove user access")?;
        self.require_sheet(sheet).await?;
        self.access.remove_user(sheet, user).await
    }

    pub async fn grants(&self, actor: &Actor, sheet: SheetId) -> Result<Vec<SheetGrant>> {
        self.require_access(actor, sheet).await?;
        self.require_sheet(sheet).await?;
        Ok(self.access.grants_for_sheet(sheet).await)
    }

    async fn require_sheet(&self, sheet: SheetId) -> Result<Sheet> {
        run_read(self.store.as_ref(), move |tx| {
            Box::pin(async move { load_sheet(tx, sheet).await })
        })
        .await
    }

    async fn require_access(&self, actor: &Actor, sheet: SheetId) -> Result<()> {
        if self.access.has_access(actor, sheet).await {
            Ok(())
        } else {
            Err(SheetError::denied(format!(
                "user {} has no access to {}",
                actor.user_id, sheet
            )))
        }
    }

    async fn require(&self, actor: &Actor, sheet: SheetId, permission: SheetPermission) -> Result<()> {
        if self.access.has_permission(actor, sheet, permission).await {
            Ok(())
        } else {
            event!(
                Level::DEBUG,
                user = actor.user_id,
                sheet = %sheet,
                permission = %permission,
                "permission check failed"
            );
            Err(SheetError::denied(format!(
                "you do not have the {} permission on {}",
                permission, sheet
            )))
        }
    }
}

fn require_super_admin(actor: &Actor, action: &str) -> Result<()> {
    if actor.is_super_admin() {
        Ok(())
    } else {
        Err(SheetError::denied(format!("only SuperAdmin can {}", action)))
    }
}

fn require_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SheetError::invalid("sheet name must not be empty"));
    }
    Ok(trimmed.to_string())
}

use crate::access::{SheetPermission, SheetRole, UserId};
use crate::core::{CellValue, ColumnChange, Position, Result, SheetError, SheetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSheetRequest {
    pub name: String,
    pub columns: Vec<String>,
}

/// Query of `GET /api/sheets`.
#[derive(Debug, Default, Deserialize)]
pub struct ListSheetsQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameSheetRequest {
    pub name: String,
}

/// Body of `PUT /api/sheets/:id/columns`: exactly one of the three index
/// fields, plus `newColumnName` for inserts and renames.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdateRequest {
    pub new_column_name: Option<String>,
    pub insert_at_index: Option<Position>,
    pub delete_at_index: Option<Position>,
    pub update_at_index: Option<Position>,
}

impl ColumnUpdateRequest {
    pub fn into_change(self) -> Result<ColumnChange> {
        let name = || {
            self.new_column_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| SheetError::invalid("newColumnName is required"))
        };
        match (self.insert_at_index, self.delete_at_index, self.update_at_index) {
            (Some(index), None, None) => Ok(ColumnChange::Insert {
                index,
                name: name()?,
            }),
            (None, Some(index), None) => Ok(ColumnChange::Delete { index }),
            (None, None, Some(index)) => Ok(ColumnChange::Rename {
                index,
                name: name()?,
            }),
            _ => Err(SheetError::invalid(
                "specify exactly one of insertAtIndex, deleteAtIndex or updateAtIndex",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub source_index: Position,
    pub target_index: Position,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRowRequest {
    pub spreadsheet_id: SheetId,
    pub position: Option<Position>,
    pub row: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRowRequest {
    pub row: Vec<CellValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareUser {
    pub user_id: UserId,
    pub role: SheetRole,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub users: Vec<ShareUser>,
    pub permissions: Option<Vec<String>>,
}

impl ShareRequest {
    pub fn parsed_permissions(&self) -> Result<Option<BTreeSet<SheetPermission>>> {
        self.permissions
            .as_deref()
            .map(SheetPermission::parse_all)
            .transpose()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionsRequest {
    pub user_id: UserId,
    pub permissions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_request_with_one_operation_becomes_a_change() {
        let request: ColumnUpdateRequest =
            serde_json::from_str(r#"{"insertAtIndex": 1, "newColumnName": "X"}"#).unwrap();
        assert_eq!(
            request.into_change().unwrap(),
            ColumnChange::Insert {
                index: 1,
                name: "X".into()
            }
        );

        let request: ColumnUpdateRequest =
            serde_json::from_str(r#"{"deleteAtIndex": 0}"#).unwrap();
        assert_eq!(
            request.into_change().unwrap(),
            ColumnChange::Delete { index: 0 }
        );
    }

    #[test]
    fn column_request_rejects_zero_or_many_operations() {
        assert!(matches!(
            ColumnUpdateRequest::default().into_change(),
            Err(SheetError::InvalidArgument(_))
        ));

        let request = ColumnUpdateRequest {
            insert_at_index: Some(0),
            delete_at_index: Some(1),
            new_column_name: Some("X".into()),
            ..Default::default()
        };
        assert!(matches!(
            request.into_change(),
            Err(SheetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rename_requires_a_name() {
        let request = ColumnUpdateRequest {
            update_at_index: Some(0),
            new_column_name: Some(" ".into()),
            ..Default::default()
        };
        assert!(matches!(
            request.into_change(),
            Err(SheetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn create_sheet_request_requires_a_columns_array() {
        assert!(serde_json::from_str::<CreateSheetRequest>(r#"{"name": "A"}"#).is_err());
        assert!(
            serde_json::from_str::<CreateSheetRequest>(r#"{"name": "A", "columns": "B"}"#)
                .is_err()
        );
        let request: CreateSheetRequest =
            serde_json::from_str(r#"{"name": "A", "columns": []}"#).unwrap();
        assert!(request.columns.is_empty());
    }

    #[test]
    fn share_request_validates_permission_names() {
        let request: ShareRequest = serde_json::from_str(
            r#"{"users": [{"userId": 2, "role": "EDITOR"}], "permissions": ["addRow", "nope"]}"#,
        )
        .unwrap();
        assert_eq!(request.users[0].role, SheetRole::Editor);
        assert!(request.parsed_permissions().is_err());
    }
}

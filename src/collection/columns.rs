//! Structural column changes.
//!
//! A [`ColumnChange`] is validated against the current column set once and
//! then applied to the column names and to every row payload with the same
//! index arithmetic, so names and cells never drift apart.

use crate::core::{CellValue, ColumnChange, Payload, Position, Result, SheetError};

/// Checks a change against a column set of `len` columns.
pub fn validate(change: &ColumnChange, len: usize) -> Result<()> {
    let len = len as Position;
    match change {
        ColumnChange::Insert { index, name } => {
            require_name(name)?;
            check_index("insertAtIndex", *index, len)
        }
        ColumnChange::Delete { index } => check_index("deleteAtIndex", *index, len - 1),
        ColumnChange::Rename { index, name } => {
            require_name(name)?;
            check_index("updateAtIndex", *index, len - 1)
        }
        ColumnChange::Move { source, target } => {
            check_index("sourceIndex", *source, len - 1)?;
            check_index("targetIndex", *target, len - 1)
        }
    }
}

/// Returns the column set after `change`. Call [`validate`] first.
pub fn apply_to_columns(columns: &[String], change: &ColumnChange) -> Vec<String> {
    let mut next = columns.to_vec();
    match change {
        ColumnChange::Insert { index, name } => next.insert(*index as usize, name.clone()),
        ColumnChange::Delete { index } => {
            next.remove(*index as usize);
        }
        ColumnChange::Rename { index, name } => next[*index as usize] = name.clone(),
        ColumnChange::Move { source, target } => relocate(&mut next, *source, *target),
    }
    next
}

/// Returns the payload after `change`, given the column count it was written
/// for. A payload whose length does not match is a broken invariant.
pub fn apply_to_payload(
    payload: &[CellValue],
    column_count: usize,
    change: &ColumnChange,
) -> Result<Payload> {
    if payload.len() != column_count {
        return Err(SheetError::ConstraintViolation(format!(
            "row has {} cells but the sheet has {} columns",
            payload.len(),
            column_count
        )));
    }
    let mut next = payload.to_vec();
    match change {
        ColumnChange::Insert { index, .. } => next.insert(*index as usize, CellValue::empty()),
        ColumnChange::Delete { index } => {
            next.remove(*index as usize);
        }
        ColumnChange::Rename { .. } => {}
        ColumnChange::Move { source, target } => relocate(&mut next, *source, *target),
    }
    Ok(next)
}

fn relocate<T>(items: &mut Vec<T>, source: Position, target: Position) {
    let item = items.remove(source as usize);
    items.insert(target as usize, item);
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SheetError::invalid("column name must not be empty"));
    }
    Ok(())
}

fn check_index(field: &'static str, index: Position, max: Position) -> Result<()> {
    if index < 0 {
        return Err(SheetError::invalid(format!(
            "{} must be non-negative, got {}",
            field, index
        )));
    }
    if index > max {
        return Err(SheetError::out_of_range(field, index, max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn cells(values: &[i64]) -> Payload {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    #[test]
    fn insert_adds_placeholder_at_index() {
        let change = ColumnChange::Insert {
            index: 1,
            name: "X".into(),
        };
        validate(&change, 3).unwrap();
        assert_eq!(
            apply_to_columns(&cols(&["A", "B", "C"]), &change),
            cols(&["A", "X", "B", "C"])
        );
        let row = apply_to_payload(&cells(&[1, 2, 3]), 3, &change).unwrap();
        assert_eq!(
            row,
            vec![
                CellValue::from(1),
                CellValue::empty(),
                CellValue::from(2),
                CellValue::from(3)
            ]
        );
    }

    #[test]
    fn insert_may_append() {
        let change = ColumnChange::Insert {
            index: 3,
            name: "D".into(),
        };
        validate(&change, 3).unwrap();
        assert_eq!(
            apply_to_columns(&cols(&["A", "B", "C"]), &change),
            cols(&["A", "B", "C", "D"])
        );
    }

    #[test]
    fn delete_removes_cell() {
        let change = ColumnChange::Delete { index: 0 };
        validate(&change, 3).unwrap();
        assert_eq!(
            apply_to_payload(&cells(&[1, 2, 3]), 3, &change).unwrap(),
            cells(&[2, 3])
        );
    }

    #[test]
    fn move_relocates_like_splice() {
        let change = ColumnChange::Move {
            source: 0,
            target: 2,
        };
        validate(&change, 3).unwrap();
        assert_eq!(
            apply_to_columns(&cols(&["A", "B", "C"]), &change),
            cols(&["B", "C", "A"])
        );
        assert_eq!(
            apply_to_payload(&cells(&[1, 2, 3]), 3, &change).unwrap(),
            cells(&[2, 3, 1])
        );
    }

    #[test]
    fn rename_leaves_payload_alone() {
        let change = ColumnChange::Rename {
            index: 2,
            name: "Total".into(),
        };
        validate(&change, 3).unwrap();
        assert_eq!(
            apply_to_columns(&cols(&["A", "B", "C"]), &change),
            cols(&["A", "B", "Total"])
        );
        assert_eq!(
            apply_to_payload(&cells(&[1, 2, 3]), 3, &change).unwrap(),
            cells(&[1, 2, 3])
        );
    }

    #[test]
    fn bad_indices_are_rejected() {
        let insert_past_end = ColumnChange::Insert {
            index: 4,
            name: "X".into(),
        };
        assert!(matches!(
            validate(&insert_past_end, 3),
            Err(SheetError::OutOfRange { .. })
        ));

        let negative = ColumnChange::Delete { index: -1 };
        assert!(matches!(
            validate(&negative, 3),
            Err(SheetError::InvalidArgument(_))
        ));

        let delete_on_empty = ColumnChange::Delete { index: 0 };
        assert!(matches!(
            validate(&delete_on_empty, 0),
            Err(SheetError::OutOfRange { .. })
        ));

        let blank_name = ColumnChange::Rename {
            index: 0,
            name: "  ".into(),
        };
        assert!(matches!(
            validate(&blank_name, 3),
            Err(SheetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn mismatched_payload_is_a_constraint_violation() {
        let change = ColumnChange::Delete { index: 0 };
        assert!(matches!(
            apply_to_payload(&cells(&[1, 2]), 3, &change),
            Err(SheetError::ConstraintViolation(_))
        ));
    }
}

mod common;

use common::{FaultyStore, assert_dense, ints, seed_grid, seed_sheet};
use sheetstore::{CellValue, ColumnChange, PositionedCollectionManager, SheetError};
use std::sync::Arc;

fn faulty_manager() -> (Arc<FaultyStore>, PositionedCollectionManager) {
    let store = Arc::new(FaultyStore::new());
    let manager = PositionedCollectionManager::new(store.clone());
    (store, manager)
}

#[tokio::test]
async fn test_failed_insert_cascade_leaves_no_trace() {
    let (store, manager) = faulty_manager();
    let sheet = seed_sheet(&manager, 5).await;
    let before = manager.list(sheet).await.unwrap();

    // Inserting at the front shifts all five rows; the third shift fails.
    store.fail_update_position_on(3);
    let err = manager
        .insert(sheet, vec![CellValue::from("boom")], Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, SheetError::Storage(_)));
    assert_eq!(store.update_position_calls(), 3);
    store.disarm();

    let after = manager.list(sheet).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_failed_delete_cascade_keeps_deleted_row() {
    let (store, manager) = faulty_manager();
    let sheet = seed_sheet(&manager, 6).await;
    let before = manager.list(sheet).await.unwrap();

    store.fail_update_position_on(3);
    manager.delete(sheet, 0).await.unwrap_err();
    store.disarm();

    assert_eq!(manager.list(sheet).await.unwrap(), before);
}

#[tokio::test]
async fn test_failed_move_never_exposes_sentinel() {
    let (store, manager) = faulty_manager();
    let sheet = seed_sheet(&manager, 6).await;
    let before = manager.list(sheet).await.unwrap();

    // Call 1 parks the source at the sentinel, calls 2..=6 shift, call 7 lands.
    for failing_call in [1, 3, 7] {
        store.fail_update_position_on(failing_call);
        manager.move_record(sheet, 0, 5).await.unwrap_err();
        store.disarm();

        let rows = manager.list(sheet).await.unwrap();
        assert_dense(&rows);
        assert_eq!(rows, before);
    }

    // Disarmed, the same move goes through.
    let rows = manager.move_record(sheet, 0, 5).await.unwrap();
    assert_eq!(rows[5].id, before[0].id);
}

#[tokio::test]
async fn test_store_stays_usable_after_rollback() {
    let (store, manager) = faulty_manager();
    let sheet = seed_grid(&manager, &["A", "B"], &[ints(&[1, 2]), ints(&[3, 4])]).await;

    store.fail_update_position_on(1);
    manager.insert(sheet, ints(&[0, 0]), Some(0)).await.unwrap_err();
    store.disarm();

    // Column changes never touch positions and are unaffected by the fault.
    let snapshot = manager
        .apply_column_change(sheet, ColumnChange::Delete { index: 0 })
        .await
        .unwrap();
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(snapshot.rows[0].payload, ints(&[2]));

    let row = manager.insert(sheet, ints(&[9]), Some(0)).await.unwrap();
    assert_eq!(row.position, 0);
    assert_dense(&manager.list(sheet).await.unwrap());
}

#[tokio::test]
async fn test_failed_column_reshape_leaves_every_row_unchanged() {
    let (store, manager) = faulty_manager();
    let sheet = seed_grid(
        &manager,
        &["A", "B"],
        &[ints(&[1, 2]), ints(&[3, 4]), ints(&[5, 6]), ints(&[7, 8])],
    )
    .await;
    let before = manager.snapshot(sheet).await.unwrap();

    // The first row is rewritten, the second fails.
    store.fail_update_payload_on(2);
    let err = manager
        .apply_column_change(
            sheet,
            ColumnChange::Insert {
                index: 1,
                name: "X".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SheetError::Storage(_)));
    assert_eq!(store.update_payload_calls(), 2);
    store.disarm();

    let after = manager.snapshot(sheet).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.sheet.columns, vec!["A", "B"]);
    assert!(after.rows.iter().all(|row| row.payload.len() == 2));
}

//! Guest reconciliation between the spreadsheet and the store.
//!
//! Import pulls roster facts (sheet wins for name and capacity); export
//! pushes pending responses (store wins for response fields). The store lock
//! is only held for synchronous store work, never across sheet I/O.

use std::collections::{HashMap, HashSet};

use crate::db::{RosterFact, UpsertOutcome};
use crate::error::SyncError;
use crate::sheets::{ResponseRow, RosterRow, SheetSource};
use crate::state::SharedDb;

/// Counts from one roster import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub read: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Guests absent from the sheet whose old row another invite now holds.
    pub released: usize,
}

/// Counts from one response export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub pending: usize,
    pub written: usize,
    pub marked: usize,
    /// Written, but a newer response landed before marking; stays pending.
    pub changed_during_export: usize,
    pub failed: usize,
    pub unmapped: usize,
}

/// Validate a sheet row into a roster fact; `None` if it lacks a code or name.
fn roster_fact(row: &RosterRow) -> Option<RosterFact> {
    if row.invite_code.is_empty() || row.name.is_empty() {
        return None;
    }
    Some(RosterFact {
        invite_code: row.invite_code.clone(),
        name: row.name.clone(),
        max_adults: row.max_adults(),
        max_kids: row.kid_count.max(0),
        sheet_row: Some(row.sheet_row),
        confirmed_adults: row.confirmed_adults,
    })
}

/// Import the guest roster from the sheet in one transaction.
pub async fn sync_from_sheet(
    db: &SharedDb,
    sheet: &dyn SheetSource,
) -> Result<ImportSummary, SyncError> {
    let rows = sheet.read_roster().await?;

    let mut summary = ImportSummary {
        read: rows.len(),
        ..ImportSummary::default()
    };
    let mut seen = HashSet::new();
    let mut facts = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(fact) = roster_fact(row) else {
            log::debug!("Import: skipping sheet row {} (missing invite code or name)", row.sheet_row);
            summary.skipped += 1;
            continue;
        };
        if !seen.insert(fact.invite_code.clone()) {
            log::warn!(
                "Import: duplicate invite code {} at sheet row {}; keeping the first row",
                fact.invite_code,
                row.sheet_row
            );
            summary.skipped += 1;
            continue;
        }
        facts.push(fact);
    }

    let claims: HashMap<i64, String> = facts
        .iter()
        .filter_map(|fact| Some((fact.sheet_row?, fact.invite_code.clone())))
        .collect();

    let summary = {
        let db = db.lock();
        db.with_transaction(|tx| {
            let mut summary = summary;
            for fact in &facts {
                match tx.upsert_roster_fact(fact) {
                    Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
                    Ok(UpsertOutcome::Updated) => summary.updated += 1,
                    Ok(UpsertOutcome::Unchanged) => summary.unchanged += 1,
                    Err(e) => {
                        log::warn!("Import: failed to upsert {}: {}", fact.invite_code, e);
                        summary.failed += 1;
                    }
                }
            }
            for code in tx.release_claimed_sheet_rows(&claims)? {
                log::warn!(
                    "Import: {} is no longer in the sheet and its row was reused; detaching it",
                    code
                );
                summary.released += 1;
            }
            Ok(summary)
        })?
    };

    log::info!(
        "Import: {} rows read, {} inserted, {} updated, {} unchanged, {} skipped, {} failed, {} released",
        summary.read,
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.skipped,
        summary.failed,
        summary.released
    );
    Ok(summary)
}

/// Export pending responses to the sheet, then mark the written ones synced.
///
/// Marks are applied in one transaction, each conditional on the guest's
/// `response_rev` still matching the exported snapshot.
pub async fn sync_to_sheet(
    db: &SharedDb,
    sheet: &dyn SheetSource,
) -> Result<ExportSummary, SyncError> {
    if !sheet.is_configured() {
        return Ok(ExportSummary::default());
    }

    let (pending, unmapped) = {
        let db = db.lock();
        (db.list_pending_export()?, db.list_unmapped_pending()?)
    };

    for guest in &unmapped {
        log::warn!(
            "Export: {} has a pending response but no sheet row; skipping",
            guest.invite_code
        );
    }

    let mut summary = ExportSummary {
        pending: pending.len(),
        unmapped: unmapped.len(),
        ..ExportSummary::default()
    };
    if pending.is_empty() {
        return Ok(summary);
    }

    let mut written = Vec::with_capacity(pending.len());
    for guest in &pending {
        let Some(sheet_row) = guest.sheet_row else {
            continue;
        };
        match sheet.write_response(sheet_row, &ResponseRow::from(guest)).await {
            Ok(()) => written.push((guest.invite_code.as_str(), guest.response_rev)),
            Err(e) => {
                log::warn!(
                    "Export: failed to write {} to sheet row {}: {}",
                    guest.invite_code,
                    sheet_row,
                    e
                );
                summary.failed += 1;
            }
        }
    }
    summary.written = written.len();

    if !written.is_empty() {
        let (marked, changed) = {
            let db = db.lock();
            db.with_transaction(|tx| {
                let mut marked = 0;
                let mut changed = 0;
                for (code, rev) in &written {
                    if tx.mark_synced_if_unchanged(code, *rev)? {
                        marked += 1;
                    } else {
                        log::info!("Export: {} changed during export; will re-export", code);
                        changed += 1;
                    }
                }
                Ok((marked, changed))
            })?
        };
        summary.marked = marked;
        summary.changed_during_export = changed;
    }

    log::info!(
        "Export: {} pending, {} written, {} marked, {} changed, {} failed, {} unmapped",
        summary.pending,
        summary.written,
        summary.marked,
        summary.changed_during_export,
        summary.failed,
        summary.unmapped
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::ResponseFields;
    use crate::sheets::test_utils::{roster_row, FakeSheet};

    fn shared_db() -> SharedDb {
        Arc::new(Mutex::new(test_db()))
    }

    fn response(adults: i64, kids: i64) -> ResponseFields {
        ResponseFields {
            confirmed_adults: Some(adults),
            confirmed_kids: Some(kids),
            dietary_info: Some("sin gluten".to_string()),
            message_for_us: Some("¡Felicidades!".to_string()),
            song_request: None,
        }
    }

    #[tokio::test]
    async fn test_import_respond_export_round() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![roster_row(5, "G1", "Ana & Joan", "Si", 1)]);

        let import = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(import.inserted, 1);
        {
            let db = db.lock();
            let guest = db.get_by_invite_code("G1").unwrap();
            assert_eq!(guest.max_adults, 2);
            assert_eq!(guest.max_kids, 1);
            assert!(guest.synced_at.is_some(), "new guests start clean");
            assert_eq!(db.pending_export_count().unwrap(), 0);
        }

        db.lock()
            .record_response("G1", &response(2, 1), Some("HN"))
            .unwrap();

        let export = sync_to_sheet(&db, &sheet).await.unwrap();
        assert_eq!(export.written, 1);
        assert_eq!(export.marked, 1);

        let writes = sheet.writes();
        assert_eq!(writes.len(), 1);
        let (row, cells) = &writes[0];
        assert_eq!(*row, 5);
        assert_eq!(cells.confirmed_adults, Some(2));
        assert_eq!(cells.confirmed_kids, Some(1));
        assert_eq!(cells.dietary_info.as_deref(), Some("sin gluten"));
        assert_eq!(cells.response_country.as_deref(), Some("HN"));

        let guest = db.lock().get_by_invite_code("G1").unwrap();
        let synced_at = guest.synced_at.clone().expect("marked synced");
        let response_at = guest.response_at.clone().expect("responded");
        assert!(synced_at > response_at);
    }

    #[tokio::test]
    async fn test_second_export_writes_nothing() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![roster_row(2, "G1", "Ana", "No", 0)]);
        sync_from_sheet(&db, &sheet).await.unwrap();
        db.lock().record_response("G1", &response(1, 0), None).unwrap();

        sync_to_sheet(&db, &sheet).await.unwrap();
        let second = sync_to_sheet(&db, &sheet).await.unwrap();

        assert_eq!(second.pending, 0);
        assert_eq!(second.written, 0);
        assert_eq!(sheet.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_import_preserves_pending_response() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![roster_row(2, "G1", "Ana", "No", 0)]);
        sync_from_sheet(&db, &sheet).await.unwrap();
        db.lock().record_response("G1", &response(1, 0), None).unwrap();

        sheet.set_roster(vec![roster_row(3, "G1", "Ana María", "Si", 2)]);
        let import = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(import.updated, 1);

        let guest = db.lock().get_by_invite_code("G1").unwrap();
        assert_eq!(guest.name, "Ana María");
        assert_eq!(guest.max_adults, 2);
        assert_eq!(guest.sheet_row, Some(3));
        assert_eq!(guest.confirmed_adults, Some(1));
        assert_eq!(guest.dietary_info.as_deref(), Some("sin gluten"));
        assert!(guest.synced_at.is_none(), "response still pending export");
    }

    #[tokio::test]
    async fn test_reused_sheet_row_is_not_overwritten_by_departed_guest() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![roster_row(5, "OLD", "Pau", "No", 0)]);
        sync_from_sheet(&db, &sheet).await.unwrap();

        sheet.set_roster(vec![roster_row(5, "NEW", "Marta", "No", 0)]);
        let import = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(import.inserted, 1);
        assert_eq!(import.released, 1);

        db.lock().record_response("OLD", &response(1, 0), None).unwrap();
        let export = sync_to_sheet(&db, &sheet).await.unwrap();

        assert_eq!(export.written, 0);
        assert_eq!(export.unmapped, 1);
        assert!(sheet.writes().is_empty(), "row 5 belongs to NEW now");

        let db = db.lock();
        let old = db.get_by_invite_code("OLD").unwrap();
        assert_eq!(old.sheet_row, None);
        assert_eq!(old.confirmed_adults, Some(1), "record and response are kept");
        assert_eq!(db.get_by_invite_code("NEW").unwrap().sheet_row, Some(5));
    }

    #[tokio::test]
    async fn test_swapped_rows_keep_both_guests_mapped() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![
            roster_row(2, "G1", "Ana", "No", 0),
            roster_row(3, "G2", "Joan", "No", 0),
        ]);
        sync_from_sheet(&db, &sheet).await.unwrap();

        sheet.set_roster(vec![
            roster_row(2, "G2", "Joan", "No", 0),
            roster_row(3, "G1", "Ana", "No", 0),
        ]);
        let import = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(import.updated, 2);
        assert_eq!(import.released, 0);

        let db = db.lock();
        assert_eq!(db.get_by_invite_code("G1").unwrap().sheet_row, Some(3));
        assert_eq!(db.get_by_invite_code("G2").unwrap().sheet_row, Some(2));
    }

    #[tokio::test]
    async fn test_departed_guest_keeps_row_nobody_claimed() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![
            roster_row(2, "G1", "Ana", "No", 0),
            roster_row(3, "G2", "Joan", "No", 0),
        ]);
        sync_from_sheet(&db, &sheet).await.unwrap();

        sheet.set_roster(vec![roster_row(2, "G1", "Ana", "No", 0)]);
        let import = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(import.released, 0);
        assert_eq!(db.lock().get_by_invite_code("G2").unwrap().sheet_row, Some(3));
    }

    #[tokio::test]
    async fn test_reimport_of_identical_roster_is_unchanged() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![
            roster_row(2, "G1", "Ana", "No", 0),
            roster_row(3, "G2", "Joan", "Si", 1),
        ]);
        sync_from_sheet(&db, &sheet).await.unwrap();
        let second = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.inserted + second.updated, 0);
    }

    #[tokio::test]
    async fn test_import_skips_incomplete_and_duplicate_rows() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![
            roster_row(2, "G1", "Ana", "No", 0),
            roster_row(3, "", "No Code", "No", 0),
            roster_row(4, "G3", "", "No", 0),
            roster_row(5, "G1", "Ana again", "No", 0),
        ]);

        let import = sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(import.read, 4);
        assert_eq!(import.inserted, 1);
        assert_eq!(import.skipped, 3);

        let guest = db.lock().get_by_invite_code("G1").unwrap();
        assert_eq!(guest.sheet_row, Some(2));
        assert!(db.lock().get_by_invite_code("G3").is_err());
    }

    #[tokio::test]
    async fn test_prefilled_confirmed_adults_seeds_new_guests_only() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        let mut row = roster_row(2, "G1", "Ana", "Si", 0);
        row.confirmed_adults = Some(2);
        sheet.set_roster(vec![row.clone()]);
        sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(
            db.lock().get_by_invite_code("G1").unwrap().confirmed_adults,
            Some(2)
        );

        db.lock().record_response("G1", &response(1, 0), None).unwrap();
        row.confirmed_adults = Some(2);
        sheet.set_roster(vec![row]);
        sync_from_sheet(&db, &sheet).await.unwrap();
        assert_eq!(
            db.lock().get_by_invite_code("G1").unwrap().confirmed_adults,
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_import_read_failure_changes_nothing() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![roster_row(2, "G1", "Ana", "No", 0)]);
        sheet.fail_reads(true);

        let err = sync_from_sheet(&db, &sheet).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(db.lock().get_by_invite_code("G1").is_err());
    }

    #[tokio::test]
    async fn test_failed_write_stays_dirty() {
        let db = shared_db();
        let sheet = FakeSheet::new();
        sheet.set_roster(vec![
            roster_row(2, "G1", "Ana", "No", 0),
            roster_row(3, "G2", "Joan", "No", 0),
        ]);
        sync_from_sheet(&db, &sheet).await.unwrap();
        {
            let db = db.lock();
            db.record_response("G1", &response(1, 0), None).unwrap();
            db.record_response("G2", &response(1, 0), None).unwrap();
        }
        sheet.fail_writes_for(3);

        let export = sync_to_sheet(&db, &sheet).await.unwrap();
        assert_eq!(export.written, 1);
        assert_eq!(export.failed, 1);
        assert!(db.lock().get_by_invite_code("G1").unwrap().synced_at.is_some());
        assert!(db.lock().get_by_invite_code("G2").unwrap().synced_at.is_none());

        sheet.clear_write_failures();
        let retry = sync_to_sheet(&db, &sheet).await.unwrap();
        assert_eq!(retry.written, 1);
        assert_eq!(sheet.writes().last().map(|(row, _)| *row), Some(3));
        assert_eq!(db.lock().pending_export_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_response_during_export_stays_pending() {
        let db = shared_db();
        let sheet = Arc::new(FakeSheet::new());
        sheet.set_roster(vec![roster_row(2, "G1", "Ana", "Si", 0)]);
        sync_from_sheet(&db, sheet.as_ref()).await.unwrap();
        db.lock().record_response("G1", &response(1, 0), None).unwrap();

        let racing_db = db.clone();
        sheet.on_write(move |_| {
            racing_db
                .lock()
                .record_response("G1", &response(2, 0), None)
                .unwrap();
        });

        let export = sync_to_sheet(&db, sheet.as_ref()).await.unwrap();
        assert_eq!(export.written, 1);
        assert_eq!(export.marked, 0);
        assert_eq!(export.changed_during_export, 1);

        let guest = db.lock().get_by_invite_code("G1").unwrap();
        assert!(guest.synced_at.is_none());
        assert_eq!(guest.confirmed_adults, Some(2));
    }

    #[tokio::test]
    async fn test_unmapped_guests_are_counted_not_written() {
        let db = shared_db();
        {
            let db = db.lock();
            db.upsert_roster_fact(&RosterFact {
                invite_code: "WALKIN".to_string(),
                name: "Walk-in".to_string(),
                max_adults: 1,
                max_kids: 0,
                sheet_row: None,
                confirmed_adults: None,
            })
            .unwrap();
            db.record_response("WALKIN", &response(1, 0), None).unwrap();
        }
        let sheet = FakeSheet::new();

        let export = sync_to_sheet(&db, &sheet).await.unwrap();
        assert_eq!(export.unmapped, 1);
        assert_eq!(export.pending, 0);
        assert!(sheet.writes().is_empty());
        assert!(db.lock().get_by_invite_code("WALKIN").unwrap().synced_at.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_sheet_exports_nothing() {
        let db = shared_db();
        {
            let db = db.lock();
            db.upsert_roster_fact(&RosterFact {
                invite_code: "G1".to_string(),
                name: "Ana".to_string(),
                max_adults: 1,
                max_kids: 0,
                sheet_row: Some(2),
                confirmed_adults: None,
            })
            .unwrap();
            db.record_response("G1", &response(1, 0), None).unwrap();
        }

        let export = sync_to_sheet(&db, &FakeSheet::unconfigured()).await.unwrap();
        assert_eq!(export, ExportSummary::default());
        assert!(db.lock().get_by_invite_code("G1").unwrap().synced_at.is_none());
    }
}

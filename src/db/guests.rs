//! Guest roster and response persistence.
//!
//! Roster facts (name, capacity, sheet row) come from the spreadsheet and
//! never touch response columns or `synced_at`. Response writes always clear
//! `synced_at`, which is what queues them for export.

use std::collections::HashMap;

use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, DbError, DbGuest, ResponseFields, RosterFact, RsvpDb, UpsertOutcome};

const GUEST_COLUMNS: &str = "invite_code, name, max_adults, max_kids, confirmed_adults,
     confirmed_kids, dietary_info, message_for_us, song_request, response_country,
     response_at, response_rev, sheet_row, synced_at, created_at, updated_at";

fn map_guest(row: &Row<'_>) -> rusqlite::Result<DbGuest> {
    Ok(DbGuest {
        invite_code: row.get(0)?,
        name: row.get(1)?,
        max_adults: row.get(2)?,
        max_kids: row.get(3)?,
        confirmed_adults: row.get(4)?,
        confirmed_kids: row.get(5)?,
        dietary_info: row.get(6)?,
        message_for_us: row.get(7)?,
        song_request: row.get(8)?,
        response_country: row.get(9)?,
        response_at: row.get(10)?,
        response_rev: row.get(11)?,
        sheet_row: row.get(12)?,
        synced_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Blank free-text answers are stored as NULL.
fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl RsvpDb {
    /// Apply roster facts from the guest sheet.
    ///
    /// Inserts a new guest (already marked synced, nothing to export yet) or
    /// updates name, capacity and sheet row of an existing one. Response
    /// fields and `synced_at` of existing guests are never written here.
    pub fn upsert_roster_fact(&self, fact: &RosterFact) -> Result<UpsertOutcome, DbError> {
        let now = now_timestamp();

        let inserted = self.conn.execute(
            "INSERT INTO guests
             (invite_code, name, max_adults, max_kids, sheet_row, confirmed_adults,
              synced_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?7)
             ON CONFLICT(invite_code) DO NOTHING",
            params![
                fact.invite_code,
                fact.name,
                fact.max_adults,
                fact.max_kids,
                fact.sheet_row,
                fact.confirmed_adults,
                now,
            ],
        )?;
        if inserted == 1 {
            return Ok(UpsertOutcome::Inserted);
        }

        let updated = self.conn.execute(
            "UPDATE guests
             SET name = ?2, max_adults = ?3, max_kids = ?4, sheet_row = ?5, updated_at = ?6
             WHERE invite_code = ?1
               AND (name IS NOT ?2 OR max_adults IS NOT ?3
                    OR max_kids IS NOT ?4 OR sheet_row IS NOT ?5)",
            params![
                fact.invite_code,
                fact.name,
                fact.max_adults,
                fact.max_kids,
                fact.sheet_row,
                now,
            ],
        )?;

        Ok(if updated == 1 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        })
    }

    /// Detach guests whose sheet row now belongs to another invite.
    ///
    /// `claims` maps each imported sheet row to the invite code found there.
    /// A released guest keeps its record and responses but loses its sheet
    /// row, so export reports it as unmapped instead of overwriting the new
    /// owner's cells. Returns the released invite codes.
    pub fn release_claimed_sheet_rows(
        &self,
        claims: &HashMap<i64, String>,
    ) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT invite_code, sheet_row FROM guests WHERE sheet_row IS NOT NULL")?;
        let assigned = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let now = now_timestamp();
        let mut released = Vec::new();
        for (invite_code, sheet_row) in assigned {
            match claims.get(&sheet_row) {
                Some(owner) if *owner != invite_code => {
                    self.conn.execute(
                        "UPDATE guests SET sheet_row = NULL, updated_at = ?2 WHERE invite_code = ?1",
                        params![invite_code, now],
                    )?;
                    released.push(invite_code);
                }
                _ => {}
            }
        }
        Ok(released)
    }

    /// Record a guest's response and queue it for export.
    ///
    /// Sets `response_at`, bumps `response_rev` and clears `synced_at` in the
    /// same statement. Resubmission overwrites the previous answers.
    pub fn record_response(
        &self,
        invite_code: &str,
        fields: &ResponseFields,
        response_country: Option<&str>,
    ) -> Result<DbGuest, DbError> {
        let now = now_timestamp();
        let country = response_country.map(str::trim).filter(|c| !c.is_empty());

        let changed = self.conn.execute(
            "UPDATE guests
             SET confirmed_adults = ?2,
                 confirmed_kids = ?3,
                 dietary_info = ?4,
                 message_for_us = ?5,
                 song_request = ?6,
                 response_country = ?7,
                 response_at = ?8,
                 response_rev = response_rev + 1,
                 synced_at = NULL,
                 updated_at = ?8
             WHERE invite_code = ?1",
            params![
                invite_code,
                fields.confirmed_adults,
                fields.confirmed_kids,
                non_blank(fields.dietary_info.as_ref()),
                non_blank(fields.message_for_us.as_ref()),
                non_blank(fields.song_request.as_ref()),
                country,
                now,
            ],
        )?;

        if changed == 0 {
            return Err(DbError::GuestNotFound(invite_code.to_string()));
        }
        self.get_by_invite_code(invite_code)
    }

    /// Look up a guest by invite code.
    pub fn get_by_invite_code(&self, invite_code: &str) -> Result<DbGuest, DbError> {
        let sql = format!("SELECT {GUEST_COLUMNS} FROM guests WHERE invite_code = ?1");
        self.conn
            .query_row(&sql, params![invite_code], map_guest)
            .optional()?
            .ok_or_else(|| DbError::GuestNotFound(invite_code.to_string()))
    }

    /// Guests with an unexported response and a sheet row to write it to.
    pub fn list_pending_export(&self) -> Result<Vec<DbGuest>, DbError> {
        self.query_guests(
            "WHERE synced_at IS NULL AND sheet_row IS NOT NULL ORDER BY sheet_row",
        )
    }

    /// Guests with an unexported response but no sheet row.
    pub fn list_unmapped_pending(&self) -> Result<Vec<DbGuest>, DbError> {
        self.query_guests("WHERE synced_at IS NULL AND sheet_row IS NULL ORDER BY invite_code")
    }

    pub fn pending_export_count(&self) -> Result<usize, DbError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM guests WHERE synced_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Mark a guest's current response as written to the sheet.
    pub fn mark_synced(&self, invite_code: &str) -> Result<(), DbError> {
        let now = now_timestamp();
        let changed = self.conn.execute(
            "UPDATE guests SET synced_at = ?2, updated_at = ?2 WHERE invite_code = ?1",
            params![invite_code, now],
        )?;
        if changed == 0 {
            return Err(DbError::GuestNotFound(invite_code.to_string()));
        }
        Ok(())
    }

    /// Mark synced only if no response landed since the export read.
    ///
    /// Returns false when `response_rev` moved (or the guest is already
    /// clean), leaving the guest pending for the next export.
    pub fn mark_synced_if_unchanged(
        &self,
        invite_code: &str,
        response_rev: i64,
    ) -> Result<bool, DbError> {
        let now = now_timestamp();
        let changed = self.conn.execute(
            "UPDATE guests SET synced_at = ?3, updated_at = ?3
             WHERE invite_code = ?1 AND response_rev = ?2 AND synced_at IS NULL",
            params![invite_code, response_rev, now],
        )?;
        Ok(changed == 1)
    }

    fn query_guests(&self, clause: &str) -> Result<Vec<DbGuest>, DbError> {
        let sql = format!("SELECT {GUEST_COLUMNS} FROM guests {clause}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_guest)?;
        let mut guests = Vec::new();
        for row in rows {
            guests.push(row?);
        }
        Ok(guests)
    }
}

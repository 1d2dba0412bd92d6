//! Published schedule storage. The spreadsheet owns this table outright.

use rusqlite::params;

use super::{DbError, DbScheduleEvent, LocalizedText, ReplaceSummary, RsvpDb, ScheduleEvent};

impl RsvpDb {
    /// Replace every stored event with `events`, in one transaction.
    ///
    /// A single failed insert is logged and skipped; failing to begin or
    /// commit rolls back the delete as well.
    pub fn replace_schedule(&self, events: &[ScheduleEvent]) -> Result<ReplaceSummary, DbError> {
        self.with_transaction(|db| {
            let mut summary = ReplaceSummary {
                deleted: db.conn.execute("DELETE FROM schedule_events", [])?,
                ..ReplaceSummary::default()
            };

            for (position, event) in events.iter().enumerate() {
                let result = db.conn.execute(
                    "INSERT INTO schedule_events
                     (position, start_time, end_time, location,
                      name_es, name_en, name_ca,
                      description_es, description_en, description_ca)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        position as i64,
                        event.start_time.to_rfc3339(),
                        event.end_time.map(|t| t.to_rfc3339()),
                        event.location,
                        event.name.es,
                        event.name.en,
                        event.name.ca,
                        event.description.es,
                        event.description.en,
                        event.description.ca,
                    ],
                );
                match result {
                    Ok(_) => summary.inserted += 1,
                    Err(e) => {
                        log::warn!(
                            "Schedule: failed to insert event '{}' at {}: {}",
                            event.name.es,
                            event.start_time,
                            e
                        );
                        summary.failed += 1;
                    }
                }
            }

            Ok(summary)
        })
    }

    /// Stored events in sheet order.
    pub fn list_schedule_events(&self) -> Result<Vec<DbScheduleEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, position, start_time, end_time, location,
                    name_es, name_en, name_ca,
                    description_es, description_en, description_ca
             FROM schedule_events
             ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DbScheduleEvent {
                id: row.get(0)?,
                position: row.get(1)?,
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                location: row.get(4)?,
                name: LocalizedText {
                    es: row.get(5)?,
                    en: row.get(6)?,
                    ca: row.get(7)?,
                },
                description: LocalizedText {
                    es: row.get(8)?,
                    en: row.get(9)?,
                    ca: row.get(10)?,
                },
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

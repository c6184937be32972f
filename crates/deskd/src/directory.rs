//! SQLite-backed technician directory and ticket table.
//!
//! Schema:
//! - technicians: identity, specialization, workload counters
//! - tickets: status and assignment per ticket_id (idempotent upsert)
//!
//! All access goes through one connection behind a mutex, which also
//! serializes the read-increment-persist window used by assignment.

use desk_common::error::Result;
use desk_common::Technician;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// Technician/ticket store.
pub struct TechnicianDirectory {
    conn: Mutex<Connection>,
}

impl TechnicianDirectory {
    /// Open or create the store. Failure here aborts daemon startup.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::init(conn)
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS technicians (
                technician_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                specialization TEXT NOT NULL,
                active_status INTEGER NOT NULL DEFAULT 1,
                tickets_assigned INTEGER NOT NULL DEFAULT 0,
                pending_ticket_count INTEGER NOT NULL DEFAULT 0,
                external_account_id TEXT
            );

            CREATE TABLE IF NOT EXISTS tickets (
                ticket_id INTEGER PRIMARY KEY,
                technician_id INTEGER,
                status TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All active technicians, ordered by name. The stable order is
    /// what makes assignment tie-breaking deterministic.
    pub fn load_active(&self) -> Result<Vec<Technician>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                technician_id,
                name,
                email,
                specialization,
                active_status,
                tickets_assigned,
                pending_ticket_count,
                external_account_id
            FROM technicians
            WHERE active_status = 1
            ORDER BY name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Technician {
                technician_id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                specialization: row.get(3)?,
                active_status: row.get::<_, i64>(4)? != 0,
                tickets_assigned: row.get(5)?,
                pending_ticket_count: row.get(6)?,
                external_account_id: row.get(7)?,
            })
        })?;

        let mut technicians = Vec::new();
        for row in rows {
            technicians.push(row?);
        }
        Ok(technicians)
    }

    /// Look up one technician by id.
    pub fn get(&self, technician_id: i64) -> Result<Option<Technician>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT
                technician_id,
                name,
                email,
                specialization,
                active_status,
                tickets_assigned,
                pending_ticket_count,
                external_account_id
            FROM technicians
            WHERE technician_id = ?1
            "#,
        )?;

        let tech = stmt
            .query_row(params![technician_id], |row| {
                Ok(Technician {
                    technician_id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    specialization: row.get(3)?,
                    active_status: row.get::<_, i64>(4)? != 0,
                    tickets_assigned: row.get(5)?,
                    pending_ticket_count: row.get(6)?,
                    external_account_id: row.get(7)?,
                })
            })
            .optional()?;
        Ok(tech)
    }

    /// Insert a technician (seeding, operations tooling, tests).
    pub fn insert_technician(&self, tech: &Technician) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO technicians
                (technician_id, name, email, specialization, active_status,
                 tickets_assigned, pending_ticket_count, external_account_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                tech.technician_id,
                &tech.name,
                &tech.email,
                &tech.specialization,
                tech.active_status as i64,
                tech.tickets_assigned,
                tech.pending_ticket_count,
                tech.external_account_id,
            ],
        )?;
        Ok(())
    }

    /// Persist a technician's workload counters after assignment.
    pub fn update_counts(
        &self,
        technician_id: i64,
        tickets_assigned: i64,
        pending_ticket_count: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE technicians
            SET tickets_assigned = ?1, pending_ticket_count = ?2
            WHERE technician_id = ?3
            "#,
            params![tickets_assigned, pending_ticket_count, technician_id],
        )?;
        info!(
            "Updated technician {} counters: assigned={}, pending={}",
            technician_id, tickets_assigned, pending_ticket_count
        );
        Ok(())
    }

    /// Idempotent upsert of a ticket's status and assignment.
    /// Re-running assignment for the same ticket_id is safe.
    pub fn upsert_ticket(
        &self,
        ticket_id: i64,
        technician_id: Option<i64>,
        status: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO tickets (ticket_id, technician_id, status)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(ticket_id) DO UPDATE SET
                technician_id = excluded.technician_id,
                status = excluded.status
            "#,
            params![ticket_id, technician_id, status],
        )?;
        Ok(())
    }

    /// Read back a ticket row (status, technician_id).
    pub fn ticket_row(&self, ticket_id: i64) -> Result<Option<(String, Option<i64>)>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT status, technician_id FROM tickets WHERE ticket_id = ?1",
                params![ticket_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// Make every technician UPDATE fail while reads keep working.
    /// Test-only hook for the rollback path.
    #[cfg(test)]
    pub fn break_updates(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TRIGGER fail_tech_updates BEFORE UPDATE ON technicians
            BEGIN
                SELECT RAISE(ABORT, 'injected persistence fault');
            END;
            "#,
        )
        .unwrap();
    }
}

//! Database migrations
//!
//! The database is only a cache of data held by the server, so the upgrade
//! policy is to discard everything and start over whenever the on-disk
//! schema version doesn't match. The next full sync repopulates it.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// All cache tables, in creation order.
const TABLES: &[(&str, &str)] = &[
    (
        "patients",
        "uuid TEXT PRIMARY KEY NOT NULL,
         id TEXT,
         given_name TEXT,
         family_name TEXT,
         birthdate TEXT,
         sex TEXT,
         location_uuid TEXT",
    ),
    (
        "locations",
        "uuid TEXT PRIMARY KEY NOT NULL,
         parent_uuid TEXT",
    ),
    (
        "location_names",
        "location_uuid TEXT NOT NULL,
         locale TEXT NOT NULL,
         name TEXT NOT NULL,
         UNIQUE (location_uuid, locale)",
    ),
    (
        "concepts",
        "uuid TEXT PRIMARY KEY NOT NULL,
         xform_id INTEGER,
         concept_type TEXT",
    ),
    (
        "concept_names",
        "concept_uuid TEXT NOT NULL,
         locale TEXT NOT NULL,
         name TEXT NOT NULL,
         UNIQUE (concept_uuid, locale)",
    ),
    (
        // uuid is nullable: temporary observations authored locally after
        // submitting a form don't have one until the server confirms them.
        "observations",
        "uuid TEXT UNIQUE,
         patient_uuid TEXT NOT NULL,
         encounter_uuid TEXT,
         concept_uuid TEXT NOT NULL,
         encounter_millis INTEGER NOT NULL,
         enterer_uuid TEXT,
         value TEXT NOT NULL DEFAULT '',
         submitted INTEGER NOT NULL DEFAULT 1",
    ),
    (
        "orders",
        "uuid TEXT PRIMARY KEY NOT NULL,
         patient_uuid TEXT,
         instructions TEXT,
         start_millis INTEGER,
         stop_millis INTEGER",
    ),
    (
        "users",
        "uuid TEXT PRIMARY KEY NOT NULL,
         full_name TEXT",
    ),
    (
        "forms",
        "uuid TEXT PRIMARY KEY NOT NULL,
         name TEXT,
         version TEXT",
    ),
    (
        "chart_items",
        "chart_uuid TEXT NOT NULL,
         seq INTEGER NOT NULL,
         group_uuid TEXT NOT NULL,
         concept_uuid TEXT NOT NULL",
    ),
    (
        "sync_cursors",
        "table_name TEXT PRIMARY KEY NOT NULL,
         sync_token TEXT NOT NULL",
    ),
    (
        "sync_log",
        "full_sync_start_millis INTEGER,
         full_sync_end_millis INTEGER",
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_observations_patient
        ON observations (patient_uuid, concept_uuid, encounter_millis)",
    "CREATE INDEX IF NOT EXISTS idx_chart_items_chart ON chart_items (chart_uuid, seq)",
    "CREATE INDEX IF NOT EXISTS idx_orders_patient ON orders (patient_uuid, start_millis)",
];

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;
    if version == CURRENT_VERSION {
        return Ok(());
    }
    if version != 0 {
        tracing::warn!(
            from = version,
            to = CURRENT_VERSION,
            "Schema version changed; clearing cache"
        );
        clear(conn)?;
    }
    create_all(conn)?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

/// Get the current schema version (0 when the database is empty).
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;
    if !exists {
        return Ok(0);
    }
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn create_all(conn: &Connection) -> Result<()> {
    let tx_result: rusqlite::Result<()> = (|| {
        conn.execute_batch("BEGIN")?;
        conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)")?;
        for (name, columns) in TABLES {
            conn.execute_batch(&format!("CREATE TABLE IF NOT EXISTS {name} ({columns})"))?;
        }
        for index in INDEXES {
            conn.execute_batch(index)?;
        }
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            [CURRENT_VERSION],
        )?;
        conn.execute_batch("COMMIT")?;
        Ok(())
    })();
    if let Err(error) = tx_result {
        conn.execute_batch("ROLLBACK").ok();
        return Err(error.into());
    }
    Ok(())
}

/// Drop every cache table, including the version marker.
fn clear(conn: &Connection) -> Result<()> {
    for (name, _) in TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))?;
    }
    conn.execute_batch("DROP TABLE IF EXISTS schema_version")?;
    Ok(())
}

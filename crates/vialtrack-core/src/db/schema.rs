//! SQLite schema definition.

/// Complete database schema for vialtrack.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Suppliers
-- ============================================================================

CREATE TABLE IF NOT EXISTS suppliers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    country TEXT,
    website TEXT,
    email TEXT,
    notes TEXT,
    reliability_rating INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_suppliers_name ON suppliers(name);

-- ============================================================================
-- Compounds
-- ============================================================================

CREATE TABLE IF NOT EXISTS compounds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    common_uses TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_compounds_name ON compounds(name);

-- ============================================================================
-- Batches (purchased lots)
-- ============================================================================

CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    supplier_id INTEGER NOT NULL REFERENCES suppliers(id),
    product_name TEXT NOT NULL,
    batch_number TEXT,
    vials_count INTEGER NOT NULL CHECK (vials_count > 0),
    mg_per_vial REAL NOT NULL CHECK (mg_per_vial > 0),
    vials_remaining INTEGER NOT NULL CHECK (vials_remaining >= 0),
    total_price REAL,
    currency TEXT NOT NULL DEFAULT 'EUR',
    purchase_date TEXT,
    expiry_date TEXT,
    storage_location TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_batches_supplier ON batches(supplier_id);
CREATE INDEX IF NOT EXISTS idx_batches_purchase_date ON batches(purchase_date);

-- ============================================================================
-- Batch composition (compound content per vial)
-- ============================================================================

CREATE TABLE IF NOT EXISTS batch_composition (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
    compound_id INTEGER NOT NULL REFERENCES compounds(id) ON DELETE CASCADE,
    mg_per_vial REAL NOT NULL CHECK (mg_per_vial > 0),
    UNIQUE (batch_id, compound_id)
);

CREATE INDEX IF NOT EXISTS idx_composition_batch ON batch_composition(batch_id);
CREATE INDEX IF NOT EXISTS idx_composition_compound ON batch_composition(compound_id);

-- ============================================================================
-- Preparations (diluted dosing solutions)
-- ============================================================================

CREATE TABLE IF NOT EXISTS preparations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id INTEGER NOT NULL REFERENCES batches(id),
    vials_used INTEGER NOT NULL CHECK (vials_used > 0),
    volume_ml REAL NOT NULL CHECK (volume_ml > 0),
    volume_remaining_ml REAL NOT NULL,
    diluent TEXT NOT NULL DEFAULT 'BAC Water',
    preparation_date TEXT NOT NULL,
    expiry_date TEXT,
    storage_location TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_preparations_batch ON preparations(batch_id);
CREATE INDEX IF NOT EXISTS idx_preparations_date ON preparations(preparation_date);

-- ============================================================================
-- Protocols (dosing schedules, label/aggregation only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS protocols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    dose_ml REAL NOT NULL,
    frequency_per_day INTEGER NOT NULL DEFAULT 1,
    days_on INTEGER,
    days_off INTEGER NOT NULL DEFAULT 0,
    cycle_duration_weeks INTEGER,
    notes TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS protocol_compounds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    protocol_id INTEGER NOT NULL REFERENCES protocols(id) ON DELETE CASCADE,
    compound_id INTEGER NOT NULL REFERENCES compounds(id) ON DELETE CASCADE,
    target_dose_mcg REAL,
    UNIQUE (protocol_id, compound_id)
);

CREATE INDEX IF NOT EXISTS idx_protocol_compounds_protocol ON protocol_compounds(protocol_id);

-- ============================================================================
-- Administrations (individual dose events, soft-deletable)
-- ============================================================================

CREATE TABLE IF NOT EXISTS administrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    preparation_id INTEGER REFERENCES preparations(id),
    protocol_id INTEGER REFERENCES protocols(id),
    administered_at TEXT NOT NULL,
    dose_ml REAL NOT NULL CHECK (dose_ml > 0),
    injection_site TEXT,
    injection_method TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_administrations_preparation ON administrations(preparation_id);
CREATE INDEX IF NOT EXISTS idx_administrations_protocol ON administrations(protocol_id);
CREATE INDEX IF NOT EXISTS idx_administrations_datetime ON administrations(administered_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        // Re-applying must not fail (IF NOT EXISTS everywhere)
        conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn test_vials_remaining_cannot_go_negative() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO suppliers (name) VALUES ('Acme Labs')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO batches (supplier_id, product_name, vials_count, mg_per_vial, vials_remaining)
             VALUES (1, 'Test', 10, 5.0, -1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_composition_unique_per_batch_compound() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO suppliers (name) VALUES ('Acme Labs')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO batches (supplier_id, product_name, vials_count, mg_per_vial, vials_remaining)
             VALUES (1, 'Test', 10, 5.0, 10)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO compounds (name) VALUES ('BPC-157')", [])
            .unwrap();

        conn.execute(
            "INSERT INTO batch_composition (batch_id, compound_id, mg_per_vial) VALUES (1, 1, 5.0)",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO batch_composition (batch_id, compound_id, mg_per_vial) VALUES (1, 1, 3.0)",
            [],
        );
        assert!(duplicate.is_err());
    }

    #[test]
    fn test_batch_delete_cascades_composition() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO suppliers (name) VALUES ('Acme Labs')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO batches (supplier_id, product_name, vials_count, mg_per_vial, vials_remaining)
             VALUES (1, 'Test', 10, 5.0, 10)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO compounds (name) VALUES ('BPC-157')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO batch_composition (batch_id, compound_id, mg_per_vial) VALUES (1, 1, 5.0)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM batches WHERE id = 1", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM batch_composition", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}

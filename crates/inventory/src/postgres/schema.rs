//! Inventory schema.
//!
//! A location is stored as an `(addr, category)` column pair. Both columns
//! are NULL for an absent location, so "no location" can never be confused
//! with a real slot, and the partial unique index keeps one volume per slot.

/// Statements creating the schema if it does not exist yet.
pub const CREATE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS volumes (
        serial            TEXT PRIMARY KEY,
        location_addr     BIGINT,
        location_category TEXT,
        home_addr         BIGINT,
        home_category     TEXT,
        category          TEXT NOT NULL,
        flags             BIGINT NOT NULL DEFAULT 0,

        CONSTRAINT volumes_location_pair
            CHECK ((location_addr IS NULL) = (location_category IS NULL)),
        CONSTRAINT volumes_home_pair
            CHECK ((home_addr IS NULL) = (home_category IS NULL)),
        CONSTRAINT volumes_location_category
            CHECK (location_category IN ('transfer', 'storage', 'import-export', 'cleaning')),
        CONSTRAINT volumes_home_category
            CHECK (home_category IN ('storage', 'import-export')),
        CONSTRAINT volumes_category
            CHECK (category IN (
                'unknown', 'allocating', 'allocated', 'scratch', 'filling',
                'full', 'missing', 'damaged', 'cleaning'
            )),
        CONSTRAINT volumes_addr_range
            CHECK (location_addr >= 0 AND home_addr >= 0),
        CONSTRAINT volumes_flags_range
            CHECK (flags >= 0)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS volumes_location_key
        ON volumes (location_addr, location_category)
        WHERE location_addr IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tree (
        path   TEXT PRIMARY KEY,
        serial TEXT NOT NULL REFERENCES volumes (serial)
    )
    "#,
];

/// Statements dropping every table.
pub const DROP_SCHEMA: &[&str] = &["DROP TABLE IF EXISTS tree", "DROP TABLE IF EXISTS volumes"];

/// Name of the primary key constraint on `volumes`.
pub const VOLUMES_PKEY: &str = "volumes_pkey";

/// Name of the one-volume-per-slot index.
pub const LOCATION_KEY: &str = "volumes_location_key";

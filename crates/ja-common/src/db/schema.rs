use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{debug, info, instrument};

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("ensure_schema failed: failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("ensure_schema failed: postgres error: {0}")]
    Postgres(#[from] PgError),
}

struct TableDef {
    name: &'static str,
    sql: &'static str,
}

/// Creation order respects foreign keys. Existing tables are left untouched.
const TABLES: &[TableDef] = &[
    TableDef {
        name: "person",
        sql: "CREATE TABLE IF NOT EXISTS recruit.person (
    person_id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    surname TEXT NOT NULL,
    pnr TEXT,
    email TEXT UNIQUE,
    password TEXT,
    role_id INTEGER NOT NULL DEFAULT 2 CHECK (role_id IN (1, 2)),
    username TEXT UNIQUE
)",
    },
    TableDef {
        name: "competence",
        sql: "CREATE TABLE IF NOT EXISTS recruit.competence (
    competence_id SERIAL PRIMARY KEY
)",
    },
    TableDef {
        name: "competence_translation",
        sql: "CREATE TABLE IF NOT EXISTS recruit.competence_translation (
    competence_id INTEGER NOT NULL REFERENCES recruit.competence(competence_id),
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (competence_id, language)
)",
    },
    TableDef {
        name: "competence_profile",
        sql: "CREATE TABLE IF NOT EXISTS recruit.competence_profile (
    person_id INTEGER NOT NULL REFERENCES recruit.person(person_id),
    competence_id INTEGER NOT NULL REFERENCES recruit.competence(competence_id),
    years_of_experience DOUBLE PRECISION NOT NULL
        CHECK (years_of_experience >= 0 AND years_of_experience <= 100),
    PRIMARY KEY (person_id, competence_id)
)",
    },
    TableDef {
        name: "availability",
        sql: "CREATE TABLE IF NOT EXISTS recruit.availability (
    availability_id SERIAL PRIMARY KEY,
    person_id INTEGER NOT NULL REFERENCES recruit.person(person_id),
    from_date DATE NOT NULL,
    to_date DATE NOT NULL,
    application_status TEXT NOT NULL DEFAULT 'unhandled'
        CHECK (application_status IN ('unhandled', 'accepted', 'rejected')),
    version_number INTEGER NOT NULL DEFAULT 0 CHECK (version_number >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CHECK (from_date <= to_date)
)",
    },
];

/// Creates the `recruit` schema and any missing table in one transaction.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), SchemaError> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    tx.batch_execute("CREATE SCHEMA IF NOT EXISTS recruit").await?;
    for table in TABLES {
        tx.batch_execute(table.sql).await?;
        debug!(table = table.name, "table ensured");
    }
    tx.commit().await?;

    info!(tables = TABLES.len(), "schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_creates_missing_objects() {
        for table in TABLES {
            let upper = table.sql.to_uppercase();
            assert!(upper.starts_with("CREATE TABLE IF NOT EXISTS"), "{}", table.name);
            assert!(!upper.contains("DROP "), "{}", table.name);
            assert!(!upper.contains("ALTER "), "{}", table.name);
            assert!(table.sql.contains(&format!("recruit.{} (", table.name)));
        }
    }

    #[test]
    fn referenced_tables_are_created_first() {
        let position = |name: &str| TABLES.iter().position(|t| t.name == name).unwrap();

        assert!(position("person") < position("competence_profile"));
        assert!(position("competence") < position("competence_translation"));
        assert!(position("competence") < position("competence_profile"));
        assert!(position("person") < position("availability"));
    }
}

use deadpool_postgres::PoolError;
use tokio_postgres::Error as PgError;
use tokio_postgres::error::SqlState;

/// Low-level cause carried by every `Persistence` variant.
#[derive(Debug, thiserror::Error)]
pub enum DbFault {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("data integrity violation: {0}")]
    Integrity(String),
}

impl DbFault {
    fn has_code(&self, code: &SqlState) -> bool {
        matches!(self, DbFault::Postgres(err) if err.code() == Some(code))
    }

    pub fn is_unique_violation(&self) -> bool {
        self.has_code(&SqlState::UNIQUE_VIOLATION)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.has_code(&SqlState::FOREIGN_KEY_VIOLATION)
    }
}

/// Declares a storage error enum with a `Persistence` variant plus the given
/// domain variants. Pool and driver errors convert through `?`; public
/// operations relabel them with `during("operation_name")` before returning.
macro_rules! db_error {
    ($name:ident { $($variants:tt)* }) => {
        #[derive(Debug, thiserror::Error)]
        pub enum $name {
            #[error("{operation} failed: {source}")]
            Persistence {
                operation: &'static str,
                #[source]
                source: $crate::db::DbFault,
            },
            $($variants)*
        }

        impl $name {
            pub fn during(self, operation: &'static str) -> Self {
                #[allow(unreachable_patterns)]
                match self {
                    Self::Persistence { source, .. } => Self::Persistence { operation, source },
                    other => other,
                }
            }

            pub fn integrity(message: impl Into<String>) -> Self {
                Self::Persistence {
                    operation: "database",
                    source: $crate::db::DbFault::Integrity(message.into()),
                }
            }

            pub fn is_unique_violation(&self) -> bool {
                #[allow(unreachable_patterns)]
                match self {
                    Self::Persistence { source, .. } => source.is_unique_violation(),
                    _ => false,
                }
            }

            pub fn is_foreign_key_violation(&self) -> bool {
                #[allow(unreachable_patterns)]
                match self {
                    Self::Persistence { source, .. } => source.is_foreign_key_violation(),
                    _ => false,
                }
            }
        }

        impl From<deadpool_postgres::PoolError> for $name {
            fn from(err: deadpool_postgres::PoolError) -> Self {
                Self::Persistence {
                    operation: "database",
                    source: $crate::db::DbFault::Pool(err),
                }
            }
        }

        impl From<tokio_postgres::Error> for $name {
            fn from(err: tokio_postgres::Error) -> Self {
                Self::Persistence {
                    operation: "database",
                    source: $crate::db::DbFault::Postgres(err),
                }
            }
        }
    };
}

pub(crate) use db_error;

#[cfg(test)]
mod tests {
    use super::*;

    db_error!(LookupError {
        #[error("not found: {0}")]
        NotFound(String),
    });

    db_error!(BareError {});

    #[test]
    fn during_relabels_only_persistence_failures() {
        let err = LookupError::integrity("dangling row").during("lookup_row");
        assert_eq!(
            err.to_string(),
            "lookup_row failed: data integrity violation: dangling row"
        );

        let untouched = LookupError::NotFound("x".into()).during("lookup_row");
        assert_eq!(untouched.to_string(), "not found: x");
    }

    #[test]
    fn integrity_faults_are_not_constraint_violations() {
        let err = LookupError::integrity("dangling row");
        assert!(!err.is_unique_violation());
        assert!(!err.is_foreign_key_violation());
        assert!(!LookupError::NotFound("x".into()).is_foreign_key_violation());
    }

    #[test]
    fn enum_without_domain_variants_relabels() {
        let err = BareError::integrity("orphan").during("list_rows");
        assert!(err.to_string().starts_with("list_rows failed:"));
    }
}

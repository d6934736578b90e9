use std::fmt;

/// Classified database failure.
#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// A lookup by identifier matched no row
    NotFound { entity: String, id: String },
    /// A unique constraint rejected the write
    Duplicate { constraint: String },
    /// Connection-level failure (pool exhaustion, network, I/O)
    Connection { message: String },
    /// Query execution or decoding failure
    Query { message: String },
    /// Anything sqlx reports that doesn't fit the above
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseErrorKind::Duplicate {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::Connection {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => DatabaseErrorKind::Query {
                message: err.to_string(),
            },
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Duplicate { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DatabaseErrorKind::NotFound { entity, id } => {
                if id.is_empty() {
                    write!(f, "{} not found", entity)
                } else {
                    write!(f, "{} '{}' not found", entity, id)
                }
            }
            DatabaseErrorKind::Duplicate { constraint } => {
                write!(f, "unique constraint violated: {}", constraint)
            }
            DatabaseErrorKind::Connection { message } => {
                write!(f, "database connection error: {}", message)
            }
            DatabaseErrorKind::Query { message } => write!(f, "database query error: {}", message),
            DatabaseErrorKind::Unknown { message } => write!(f, "database error: {}", message),
        }
    }
}

impl std::error::Error for DatabaseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn display_includes_entity_and_id() {
        let err = DatabaseError::new(DatabaseErrorKind::NotFound {
            entity: "Payment".to_string(),
            id: "ws_CO_1".to_string(),
        });
        assert_eq!(err.to_string(), "Payment 'ws_CO_1' not found");
    }
}

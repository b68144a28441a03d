use crate::validation::ValidationErrors;

#[derive(thiserror::Error, Debug)]
pub enum WorkshopError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),
    #[error("no {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("user {user_id} already has an RSVP for event {event_id}")]
    AlreadyRegistered { event_id: i64, user_id: i64 },
    #[error("database query failed: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database setup failed: {0}")]
    Setup(#[from] db::DbError),
    #[error("could not check out a connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl WorkshopError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        WorkshopError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// The validation errors, if this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            WorkshopError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

pub type Result<T, E = WorkshopError> = std::result::Result<T, E>;

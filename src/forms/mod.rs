//! Request forms and the validators they run.
//!
//! A form owns the data extracted from a request, lists the validators that
//! must pass, and knows how to write itself to the database. Validation never
//! stops at the first message: every validator runs and the messages are
//! concatenated, unless one of them fails hard (for example with a 403).

pub mod plants;
pub mod users;
pub mod validators;

use diesel::SqliteConnection;

use crate::error::AppError;

/// Single rule checked against a form's data.
pub trait Validator<D> {
    /// Messages for every broken rule; `Err` aborts the whole validation.
    fn validate(&self, data: &D, conn: &mut SqliteConnection) -> Result<Vec<String>, AppError>;
}

pub trait Form {
    type Data: 'static;

    fn data(&self) -> &Self::Data;

    fn validators(&self) -> &'static [&'static dyn Validator<Self::Data>];

    /// Runs every validator in order and collects their messages.
    fn validate(&self, conn: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let mut errors = Vec::new();
        for validator in self.validators() {
            errors.extend(validator.validate(self.data(), conn)?);
        }
        Ok(errors)
    }

    /// Like [`Form::validate`], but any message becomes `AppError::Validation`.
    fn check(&self, conn: &mut SqliteConnection) -> Result<(), AppError> {
        let errors = self.validate(conn)?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

pub trait CreateForm: Form + Sized {
    type Output;

    /// Writes the (already validated) data.
    fn create(self, conn: &mut SqliteConnection) -> Result<Self::Output, AppError>;

    fn submit(self, conn: &mut SqliteConnection) -> Result<Self::Output, AppError> {
        self.check(conn)?;
        self.create(conn)
    }
}

pub trait UpdateForm: Form + Sized {
    type Target;
    type Output;

    /// Applies the (already validated) data to `target`.
    fn update(
        self,
        target: &Self::Target,
        conn: &mut SqliteConnection,
    ) -> Result<Self::Output, AppError>;

    fn submit(
        self,
        target: &Self::Target,
        conn: &mut SqliteConnection,
    ) -> Result<Self::Output, AppError> {
        self.check(conn)?;
        self.update(target, conn)
    }
}

/// Fresh in-memory database with the schema applied.
#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    use diesel::connection::SimpleConnection;
    use diesel::Connection;
    use diesel_migrations::MigrationHarness;

    let mut conn = SqliteConnection::establish(":memory:").unwrap();
    conn.batch_execute("PRAGMA foreign_keys = ON;").unwrap();
    conn.run_pending_migrations(crate::db::MIGRATIONS).unwrap();
    conn
}

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::SqliteConnection;
use serde::Deserialize;

use super::validators::{
    EmailField, EmailFormat, EmailLength, OldPasswordCorrect, PasswordConfirmField,
    PasswordCorrect, PasswordField, PasswordLength, PasswordsMatch, UserDoesNotExist, UserExists,
};
use super::{CreateForm, Form, UpdateForm, Validator};
use crate::actions;
use crate::error::AppError;
use crate::hashing::Hasher;
use crate::models::User;

/// Fields of the registration page.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Email and password, as sent to the JSON API and the login page.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeFields {
    pub old_password: String,
    pub password: String,
    pub password_confirm: String,
}

/// Password change fields together with the account being changed.
pub struct PasswordChangeData {
    pub old_password: String,
    pub password: String,
    pub password_confirm: String,
    pub user: User,
}

impl EmailField for RegisterData {
    fn email(&self) -> &str {
        &self.email
    }
}

impl PasswordField for RegisterData {
    fn password(&self) -> &str {
        &self.password
    }
}

impl PasswordConfirmField for RegisterData {
    fn password_confirm(&self) -> &str {
        &self.password_confirm
    }
}

impl EmailField for Credentials {
    fn email(&self) -> &str {
        &self.email
    }
}

impl PasswordField for Credentials {
    fn password(&self) -> &str {
        &self.password
    }
}

impl PasswordField for PasswordChangeData {
    fn password(&self) -> &str {
        &self.password
    }
}

impl PasswordConfirmField for PasswordChangeData {
    fn password_confirm(&self) -> &str {
        &self.password_confirm
    }
}

/// Inserts a regular account. Losing a race against another registration of
/// the same email yields `taken()` instead of a database error.
fn insert_account(
    conn: &mut SqliteConnection,
    email: &str,
    hashed: &str,
    taken: fn() -> AppError,
) -> Result<User, AppError> {
    match actions::insert_new_user(conn, email, hashed, false) {
        Ok(user) => {
            tracing::info!(user = %user.id, "registered user");
            Ok(user)
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Err(taken()),
        Err(err) => Err(err.into()),
    }
}

/// Registration from the HTML page.
pub struct RegisterForm {
    data: RegisterData,
    hasher: Hasher,
}

impl RegisterForm {
    pub fn new(data: RegisterData, hasher: Hasher) -> Self {
        Self { data, hasher }
    }
}

impl Form for RegisterForm {
    type Data = RegisterData;

    fn data(&self) -> &RegisterData {
        &self.data
    }

    fn validators(&self) -> &'static [&'static dyn Validator<RegisterData>] {
        &[&EmailLength, &UserExists, &PasswordLength, &PasswordsMatch]
    }
}

impl CreateForm for RegisterForm {
    type Output = User;

    fn create(self, conn: &mut SqliteConnection) -> Result<User, AppError> {
        let hashed = self.hasher.hash(&self.data.password)?;
        insert_account(conn, &self.data.email, &hashed, || {
            AppError::Validation(vec!["User with that email already exists".to_owned()])
        })
    }
}

/// Registration through the JSON API; a taken email is a 400, not a form error.
pub struct CredentialsForm {
    data: Credentials,
    hasher: Hasher,
}

impl CredentialsForm {
    pub fn new(data: Credentials, hasher: Hasher) -> Self {
        Self { data, hasher }
    }
}

impl Form for CredentialsForm {
    type Data = Credentials;

    fn data(&self) -> &Credentials {
        &self.data
    }

    fn validators(&self) -> &'static [&'static dyn Validator<Credentials>] {
        &[&EmailLength, &EmailFormat, &PasswordLength]
    }
}

impl CreateForm for CredentialsForm {
    type Output = User;

    fn create(self, conn: &mut SqliteConnection) -> Result<User, AppError> {
        let hashed = self.hasher.hash(&self.data.password)?;
        insert_account(conn, &self.data.email, &hashed, || {
            AppError::BadRequest("User with this email already exists".to_owned())
        })
    }
}

/// Login from the HTML page. It writes nothing; a valid form means the
/// caller may issue a token.
pub struct LoginForm {
    data: Credentials,
}

impl LoginForm {
    pub fn new(data: Credentials) -> Self {
        Self { data }
    }
}

impl Form for LoginForm {
    type Data = Credentials;

    fn data(&self) -> &Credentials {
        &self.data
    }

    fn validators(&self) -> &'static [&'static dyn Validator<Credentials>] {
        &[&UserDoesNotExist, &PasswordCorrect]
    }
}

pub struct PasswordChangeForm {
    data: PasswordChangeData,
    hasher: Hasher,
}

impl PasswordChangeForm {
    /// `user` is the logged-in account whose old password is checked.
    pub fn new(fields: PasswordChangeFields, user: User, hasher: Hasher) -> Self {
        Self {
            data: PasswordChangeData {
                old_password: fields.old_password,
                password: fields.password,
                password_confirm: fields.password_confirm,
                user,
            },
            hasher,
        }
    }
}

impl Form for PasswordChangeForm {
    type Data = PasswordChangeData;

    fn data(&self) -> &PasswordChangeData {
        &self.data
    }

    fn validators(&self) -> &'static [&'static dyn Validator<PasswordChangeData>] {
        &[&PasswordLength, &PasswordsMatch, &OldPasswordCorrect]
    }
}

impl UpdateForm for PasswordChangeForm {
    type Target = User;
    type Output = ();

    fn update(self, target: &User, conn: &mut SqliteConnection) -> Result<(), AppError> {
        let hashed = self.hasher.hash(&self.data.password)?;
        actions::update_user_password(conn, &target.id, &hashed)?;
        tracing::info!(user = %target.id, "changed password");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::test_connection;
    use crate::forms::validators::WRONG_PASSWORD;

    const HASHER: Hasher = Hasher::new(4);

    fn register_data(email: &str, password: &str, confirm: &str) -> RegisterData {
        RegisterData {
            email: email.into(),
            password: password.into(),
            password_confirm: confirm.into(),
        }
    }

    #[test]
    fn register_collects_every_message() {
        let mut conn = test_connection();
        let form = RegisterForm::new(register_data("short", "short", "notevenmatching"), HASHER);

        let errors = form.validate(&mut conn).unwrap();
        assert_eq!(
            errors,
            vec![
                "Email address is too short",
                "Password is too short",
                "Passwords didn't match",
            ]
        );
    }

    #[test]
    fn register_rejects_long_values() {
        let mut conn = test_connection();
        let long = "very-very-long".repeat(10);
        let form = RegisterForm::new(register_data(&long, &long, &long), HASHER);

        let errors = form.validate(&mut conn).unwrap();
        assert_eq!(errors, vec!["Email address is too long", "Password is too long"]);
    }

    #[test]
    fn register_creates_user_with_hashed_password() {
        let mut conn = test_connection();
        let form = RegisterForm::new(
            register_data("some@user.com", "some-password", "some-password"),
            HASHER,
        );

        let user = form.submit(&mut conn).unwrap();
        assert!(!user.is_superuser);
        assert!(Hasher::verify("some-password", &user.hashed_password));

        let again = RegisterForm::new(
            register_data("some@user.com", "some-password", "some-password"),
            HASHER,
        );
        match again.submit(&mut conn) {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors, vec!["User with that email already exists"])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn api_registration_of_taken_email_is_bad_request() {
        let mut conn = test_connection();
        actions::insert_new_user(&mut conn, "jon.jones@gmail.com", "whatever", false).unwrap();

        let form = CredentialsForm::new(
            Credentials {
                email: "jon.jones@gmail.com".into(),
                password: "unhashed but whatever".into(),
            },
            HASHER,
        );
        assert!(matches!(form.submit(&mut conn), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn registration_losing_a_race_reports_taken_email() {
        let mut conn = test_connection();
        let form = RegisterForm::new(
            register_data("some@user.com", "some-password", "some-password"),
            HASHER,
        );
        assert!(form.validate(&mut conn).unwrap().is_empty());

        actions::insert_new_user(&mut conn, "some@user.com", "whatever", false).unwrap();
        match form.create(&mut conn) {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors, vec!["User with that email already exists"])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn api_registration_rejects_malformed_email() {
        let mut conn = test_connection();
        let form = CredentialsForm::new(
            Credentials {
                email: "notanemail".into(),
                password: "abcdefghij".into(),
            },
            HASHER,
        );
        assert_eq!(
            form.validate(&mut conn).unwrap(),
            vec!["Email address is not valid"]
        );
    }

    #[test]
    fn login_reports_unknown_user_or_wrong_password() {
        let mut conn = test_connection();
        let hashed = HASHER.hash("different-password").unwrap();
        actions::insert_new_user(&mut conn, "some@user.com", &hashed, false).unwrap();

        let unknown = LoginForm::new(Credentials {
            email: "nobody@user.com".into(),
            password: "some-password".into(),
        });
        assert_eq!(
            unknown.validate(&mut conn).unwrap(),
            vec!["User with that email does not exist"]
        );

        let wrong = LoginForm::new(Credentials {
            email: "some@user.com".into(),
            password: "some-password".into(),
        });
        assert_eq!(wrong.validate(&mut conn).unwrap(), vec![WRONG_PASSWORD]);

        let right = LoginForm::new(Credentials {
            email: "some@user.com".into(),
            password: "different-password".into(),
        });
        assert!(right.validate(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn password_change_checks_old_password_then_updates() {
        let mut conn = test_connection();
        let hashed = HASHER.hash("pytest-auth-user").unwrap();
        let user = actions::insert_new_user(&mut conn, "pytest@auth.com", &hashed, false).unwrap();

        let rejected = PasswordChangeForm::new(
            PasswordChangeFields {
                old_password: "absolutely-wrong".into(),
                password: "shorty".into(),
                password_confirm: "dont-match".into(),
            },
            user.clone(),
            HASHER,
        );
        assert_eq!(
            rejected.validate(&mut conn).unwrap(),
            vec![
                "Password is too short",
                "Passwords didn't match",
                WRONG_PASSWORD,
            ]
        );

        let accepted = PasswordChangeForm::new(
            PasswordChangeFields {
                old_password: "pytest-auth-user".into(),
                password: "newpassword".into(),
                password_confirm: "newpassword".into(),
            },
            user.clone(),
            HASHER,
        );
        accepted.submit(&user, &mut conn).unwrap();

        let stored = actions::find_user_by_uid(&mut conn, &user.id).unwrap().unwrap();
        assert!(Hasher::verify("newpassword", &stored.hashed_password));
    }
}

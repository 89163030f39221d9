use diesel::SqliteConnection;

use super::plants::PlantData;
use super::users::PasswordChangeData;
use super::Validator;
use crate::actions;
use crate::error::AppError;
use crate::hashing::Hasher;
use crate::models::Conditions;

pub const EMAIL_MIN: usize = 8;
pub const EMAIL_MAX: usize = 127;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 123;
pub const NAME_MAX: usize = 127;

pub const WRONG_PASSWORD: &str = "Password you have entered is not correct";

pub trait EmailField {
    fn email(&self) -> &str;
}

pub trait PasswordField {
    fn password(&self) -> &str;
}

pub trait PasswordConfirmField: PasswordField {
    fn password_confirm(&self) -> &str;
}

fn messages(checks: &[(bool, &str)]) -> Vec<String> {
    checks
        .iter()
        .filter(|(failed, _)| *failed)
        .map(|(_, message)| (*message).to_owned())
        .collect()
}

pub struct EmailLength;

impl<D: EmailField> Validator<D> for EmailLength {
    fn validate(&self, data: &D, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let len = data.email().chars().count();
        Ok(messages(&[
            (len < EMAIL_MIN, "Email address is too short"),
            (len > EMAIL_MAX, "Email address is too long"),
        ]))
    }
}

/// One `@` between a non-empty local part and a dotted domain.
fn is_email_address(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
        && !address.chars().any(char::is_whitespace)
}

pub struct EmailFormat;

impl<D: EmailField> Validator<D> for EmailFormat {
    fn validate(&self, data: &D, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        Ok(messages(&[(
            !is_email_address(data.email()),
            "Email address is not valid",
        )]))
    }
}

pub struct UserExists;

impl<D: EmailField> Validator<D> for UserExists {
    fn validate(&self, data: &D, conn: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let exists = actions::find_user_by_email(conn, data.email())?.is_some();
        Ok(messages(&[(exists, "User with that email already exists")]))
    }
}

pub struct UserDoesNotExist;

impl<D: EmailField> Validator<D> for UserDoesNotExist {
    fn validate(&self, data: &D, conn: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let missing = actions::find_user_by_email(conn, data.email())?.is_none();
        Ok(messages(&[(missing, "User with that email does not exist")]))
    }
}

pub struct PasswordLength;

impl<D: PasswordField> Validator<D> for PasswordLength {
    fn validate(&self, data: &D, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let len = data.password().chars().count();
        Ok(messages(&[
            (len < PASSWORD_MIN, "Password is too short"),
            (len > PASSWORD_MAX, "Password is too long"),
        ]))
    }
}

pub struct PasswordsMatch;

impl<D: PasswordConfirmField> Validator<D> for PasswordsMatch {
    fn validate(&self, data: &D, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        Ok(messages(&[(
            data.password() != data.password_confirm(),
            "Passwords didn't match",
        )]))
    }
}

/// Compares the password with the stored hash; unknown emails are left to
/// [`UserDoesNotExist`].
pub struct PasswordCorrect;

impl<D: EmailField + PasswordField> Validator<D> for PasswordCorrect {
    fn validate(&self, data: &D, conn: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let Some(user) = actions::find_user_by_email(conn, data.email())? else {
            return Ok(Vec::new());
        };
        Ok(messages(&[(
            !Hasher::verify(data.password(), &user.hashed_password),
            WRONG_PASSWORD,
        )]))
    }
}

pub struct OldPasswordCorrect;

impl Validator<PasswordChangeData> for OldPasswordCorrect {
    fn validate(
        &self,
        data: &PasswordChangeData,
        _: &mut SqliteConnection,
    ) -> Result<Vec<String>, AppError> {
        Ok(messages(&[(
            !Hasher::verify(&data.old_password, &data.user.hashed_password),
            WRONG_PASSWORD,
        )]))
    }
}

/// Plants can only be written by a logged-in user.
pub struct Creator;

impl Validator<PlantData> for Creator {
    fn validate(&self, data: &PlantData, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        match data.creator {
            Some(_) => Ok(Vec::new()),
            None => Err(AppError::forbidden()),
        }
    }
}

pub struct NameLength;

impl Validator<PlantData> for NameLength {
    fn validate(&self, data: &PlantData, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let name = data.name.trim();
        Ok(messages(&[
            (name.is_empty(), "Name cannot be empty"),
            (name.chars().count() > NAME_MAX, "Name is too long"),
        ]))
    }
}

pub struct DescriptionPresent;

impl Validator<PlantData> for DescriptionPresent {
    fn validate(&self, data: &PlantData, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        Ok(messages(&[(
            data.description.trim().is_empty(),
            "Description cannot be empty",
        )]))
    }
}

pub struct ConditionsValid;

impl Validator<PlantData> for ConditionsValid {
    fn validate(&self, data: &PlantData, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        Ok(messages(&[
            (
                data.temperature.parse::<Conditions>().is_err(),
                "Wrong temperature value",
            ),
            (
                data.humidity.parse::<Conditions>().is_err(),
                "Wrong humidity value",
            ),
        ]))
    }
}

pub struct ImageRequired;

impl Validator<PlantData> for ImageRequired {
    fn validate(&self, data: &PlantData, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let present = data.image.as_ref().is_some_and(|image| image.is_present());
        Ok(messages(&[(!present, "Image is required")]))
    }
}

pub struct ImageFormat;

impl Validator<PlantData> for ImageFormat {
    fn validate(&self, data: &PlantData, _: &mut SqliteConnection) -> Result<Vec<String>, AppError> {
        let unsupported = data
            .image
            .as_ref()
            .is_some_and(|image| image.is_present() && !image.has_allowed_extension());
        Ok(messages(&[(unsupported, "Unsupported image format")]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_addresses_need_local_part_and_dotted_domain() {
        assert!(is_email_address("jon.jones@gmail.com"));
        assert!(is_email_address("a@b.pl"));

        assert!(!is_email_address("notanemail"));
        assert!(!is_email_address("@gmail.com"));
        assert!(!is_email_address("jon@localhost"));
        assert!(!is_email_address("jon@@gmail.com"));
        assert!(!is_email_address("jon@gmail..com"));
        assert!(!is_email_address("jon jones@gmail.com"));
    }
}

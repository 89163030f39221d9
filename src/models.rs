use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{images, plants, users};

/// Temperature and humidity levels a plant prefers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[serde(rename_all = "lowercase")]
#[diesel(sql_type = Text)]
pub enum Conditions {
    Low,
    #[default]
    Average,
    High,
}

impl Conditions {
    pub const ALL: [Conditions; 3] = [Conditions::Low, Conditions::Average, Conditions::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Conditions::Low => "low",
            Conditions::Average => "average",
            Conditions::High => "high",
        }
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conditions value: {0}")]
pub struct ParseConditionsError(String);

impl FromStr for Conditions {
    type Err = ParseConditionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Conditions::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseConditionsError(s.to_owned()))
    }
}

impl ToSql<Text, Sqlite> for Conditions {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Conditions {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(value.parse()?)
    }
}

/// Registered account.
#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub email: String,
    pub hashed_password: String,
    pub is_superuser: bool,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Whole days elapsed since the account was created.
    pub fn days_since_join(&self) -> i64 {
        (Utc::now().naive_utc() - self.created_at).num_days()
    }
}

/// Uploaded image file; `path` is relative to the static directory.
#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Identifiable)]
#[diesel(table_name = images)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub path: String,
    pub created_at: NaiveDateTime,
}

impl Image {
    pub fn url(&self) -> String {
        format!("/static/{}", self.path)
    }
}

/// Catalogued plant; `image_id` is unset when the image was removed.
#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Identifiable, Associations)]
#[diesel(belongs_to(User, foreign_key = creator_id))]
#[diesel(table_name = plants)]
pub struct Plant {
    pub id: String,
    pub name: String,
    pub description: String,
    pub temperature: Conditions,
    pub humidity: Conditions,
    pub is_accepted: bool,
    pub creator_id: String,
    pub image_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Plant {
    /// Creators and superusers may change or remove a plant.
    pub fn is_editable_by(&self, user: &User) -> bool {
        user.is_superuser || self.creator_id == user.id
    }
}

/// Editable plant columns.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = plants)]
pub struct PlantChanges {
    pub name: String,
    pub description: String,
    pub temperature: Conditions,
    pub humidity: Conditions,
}

/// A plant loaded together with its creator and image.
#[derive(Debug, Clone)]
pub struct PlantDetails {
    pub plant: Plant,
    pub creator: User,
    pub image: Option<Image>,
}

impl From<(Plant, User, Option<Image>)> for PlantDetails {
    fn from((plant, creator, image): (Plant, User, Option<Image>)) -> Self {
        Self {
            plant,
            creator,
            image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorView {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageView {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Whole plant as returned by the API and rendered on pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantModel {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub name: String,
    pub description: String,
    pub temperature: Conditions,
    pub humidity: Conditions,
    pub is_accepted: bool,
    pub creator: CreatorView,
    pub image: Option<ImageView>,
}

/// Plant in list responses; description and acceptance are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantListItem {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub name: String,
    pub temperature: Conditions,
    pub humidity: Conditions,
    pub creator: CreatorView,
    pub image: Option<ImageView>,
}

impl From<&User> for CreatorView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&Image> for ImageView {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id.clone(),
            name: image.name.clone(),
            url: image.url(),
        }
    }
}

impl From<PlantDetails> for PlantModel {
    fn from(details: PlantDetails) -> Self {
        let PlantDetails {
            plant,
            creator,
            image,
        } = details;
        Self {
            id: plant.id,
            created_at: plant.created_at,
            name: plant.name,
            description: plant.description,
            temperature: plant.temperature,
            humidity: plant.humidity,
            is_accepted: plant.is_accepted,
            creator: CreatorView::from(&creator),
            image: image.as_ref().map(ImageView::from),
        }
    }
}

impl From<PlantDetails> for PlantListItem {
    fn from(details: PlantDetails) -> Self {
        let model = PlantModel::from(details);
        Self {
            id: model.id,
            created_at: model.created_at,
            name: model.name,
            temperature: model.temperature,
            humidity: model.humidity,
            creator: model.creator,
            image: model.image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_parse_lowercase_names_only() {
        assert_eq!("low".parse::<Conditions>(), Ok(Conditions::Low));
        assert_eq!("high".parse::<Conditions>(), Ok(Conditions::High));
        assert!("High".parse::<Conditions>().is_err());
        assert!("wrong".parse::<Conditions>().is_err());
    }

    #[test]
    fn conditions_serialize_as_lowercase() {
        let json = serde_json::to_string(&Conditions::Average).unwrap();
        assert_eq!(json, "\"average\"");
        assert_eq!(Conditions::default(), Conditions::Average);
    }

    fn user(id: &str, superuser: bool) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            hashed_password: String::new(),
            is_superuser: superuser,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn only_creator_or_superuser_can_edit() {
        let plant = Plant {
            id: "p".into(),
            name: "Fern".into(),
            description: "Green".into(),
            temperature: Conditions::Low,
            humidity: Conditions::High,
            is_accepted: false,
            creator_id: "owner".into(),
            image_id: None,
            created_at: Utc::now().naive_utc(),
        };

        assert!(plant.is_editable_by(&user("owner", false)));
        assert!(!plant.is_editable_by(&user("stranger", false)));
        assert!(plant.is_editable_by(&user("admin", true)));
    }
}

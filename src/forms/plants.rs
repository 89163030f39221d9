use std::collections::HashMap;

use diesel::{Connection, SqliteConnection};
use serde::{Deserialize, Serialize};

use super::validators::{
    ConditionsValid, Creator, DescriptionPresent, ImageFormat, ImageRequired, NameLength,
};
use super::{CreateForm, Form, UpdateForm, Validator};
use crate::actions::{self, NewPlant};
use crate::error::AppError;
use crate::images::{ImageStore, StoredFile, Upload};
use crate::models::{Conditions, Image, Plant, PlantChanges, PlantDetails, User};

/// Plant fields as sent by a client; missing conditions default to `average`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantInput {
    pub name: String,
    pub description: String,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
}

impl PlantInput {
    /// Picks the plant fields out of decoded form text fields.
    pub fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            name: fields.remove("name").unwrap_or_default(),
            description: fields.remove("description").unwrap_or_default(),
            temperature: fields.remove("temperature"),
            humidity: fields.remove("humidity"),
        }
    }

    pub fn into_data(self, creator: Option<User>, image: Option<Upload>) -> PlantData {
        let default = || Conditions::default().to_string();
        PlantData {
            name: self.name,
            description: self.description,
            temperature: self.temperature.unwrap_or_else(default),
            humidity: self.humidity.unwrap_or_else(default),
            creator,
            image,
        }
    }
}

/// Raw plant values plus the acting user and optional upload.
#[derive(Debug, Clone)]
pub struct PlantData {
    pub name: String,
    pub description: String,
    pub temperature: String,
    pub humidity: String,
    pub creator: Option<User>,
    pub image: Option<Upload>,
}

impl PlantData {
    fn conditions(&self) -> Result<(Conditions, Conditions), AppError> {
        let parse = |value: &str, message: &str| {
            value
                .parse::<Conditions>()
                .map_err(|_| AppError::Validation(vec![message.to_owned()]))
        };
        Ok((
            parse(&self.temperature, "Wrong temperature value")?,
            parse(&self.humidity, "Wrong humidity value")?,
        ))
    }

    fn present_image(&self) -> Option<&Upload> {
        self.image.as_ref().filter(|image| image.is_present())
    }
}

pub struct PlantCreateForm {
    data: PlantData,
    images: ImageStore,
    require_image: bool,
}

impl PlantCreateForm {
    /// Form posted from the create page, where an image is mandatory.
    pub fn with_image(data: PlantData, images: ImageStore) -> Self {
        Self {
            data,
            images,
            require_image: true,
        }
    }

    /// JSON API creation; an image is optional.
    pub fn without_image(data: PlantData, images: ImageStore) -> Self {
        Self {
            data,
            images,
            require_image: false,
        }
    }
}

impl Form for PlantCreateForm {
    type Data = PlantData;

    fn data(&self) -> &PlantData {
        &self.data
    }

    fn validators(&self) -> &'static [&'static dyn Validator<PlantData>] {
        if self.require_image {
            &[
                &Creator,
                &NameLength,
                &DescriptionPresent,
                &ConditionsValid,
                &ImageRequired,
                &ImageFormat,
            ]
        } else {
            &[
                &Creator,
                &NameLength,
                &DescriptionPresent,
                &ConditionsValid,
                &ImageFormat,
            ]
        }
    }
}

impl CreateForm for PlantCreateForm {
    type Output = PlantDetails;

    /// New plants wait for a superuser to accept them.
    fn create(self, conn: &mut SqliteConnection) -> Result<PlantDetails, AppError> {
        let creator = self.data.creator.clone().ok_or_else(AppError::forbidden)?;
        let (temperature, humidity) = self.data.conditions()?;
        let stored = self
            .data
            .present_image()
            .map(|upload| self.images.write(upload))
            .transpose()?;

        let result = conn.transaction::<_, AppError, _>(|conn| {
            let image = stored
                .as_ref()
                .map(|file| actions::insert_new_image(conn, &file.name, &file.path))
                .transpose()?;
            let plant = actions::insert_new_plant(
                conn,
                NewPlant {
                    name: self.data.name.trim(),
                    description: self.data.description.trim(),
                    temperature,
                    humidity,
                    creator_id: &creator.id,
                    image_id: image.as_ref().map(|image| image.id.as_str()),
                    is_accepted: false,
                },
            )?;
            Ok(PlantDetails {
                plant,
                creator,
                image,
            })
        });

        match result {
            Ok(details) => {
                tracing::info!(plant = %details.plant.id, creator = %details.creator.id, "created plant");
                Ok(details)
            }
            Err(err) => {
                discard(&self.images, stored.as_ref());
                Err(err)
            }
        }
    }
}

pub struct PlantEditForm {
    data: PlantData,
    images: ImageStore,
}

impl PlantEditForm {
    pub fn new(data: PlantData, images: ImageStore) -> Self {
        Self { data, images }
    }
}

impl Form for PlantEditForm {
    type Data = PlantData;

    fn data(&self) -> &PlantData {
        &self.data
    }

    fn validators(&self) -> &'static [&'static dyn Validator<PlantData>] {
        &[
            &Creator,
            &NameLength,
            &DescriptionPresent,
            &ConditionsValid,
            &ImageFormat,
        ]
    }
}

impl UpdateForm for PlantEditForm {
    type Target = Plant;
    type Output = PlantDetails;

    /// Updates the plant fields; a new upload replaces the previous image.
    fn update(self, target: &Plant, conn: &mut SqliteConnection) -> Result<PlantDetails, AppError> {
        let (temperature, humidity) = self.data.conditions()?;
        let changes = PlantChanges {
            name: self.data.name.trim().to_owned(),
            description: self.data.description.trim().to_owned(),
            temperature,
            humidity,
        };
        let stored = self
            .data
            .present_image()
            .map(|upload| self.images.write(upload))
            .transpose()?;

        let result = conn.transaction::<_, AppError, _>(|conn| {
            actions::update_plant(conn, &target.id, &changes)?;

            let mut replaced: Option<Image> = None;
            if let Some(file) = &stored {
                let image = actions::insert_new_image(conn, &file.name, &file.path)?;
                actions::set_plant_image(conn, &target.id, Some(&image.id))?;
                if let Some(old_id) = &target.image_id {
                    replaced = actions::find_image_by_uid(conn, old_id)?;
                    actions::delete_image(conn, old_id)?;
                }
            }

            let details = actions::find_plant_details(conn, &target.id)?
                .ok_or_else(|| AppError::NotFound("Plant does not exist".to_owned()))?;
            Ok((details, replaced))
        });

        match result {
            Ok((details, replaced)) => {
                if let Some(old) = replaced {
                    self.images.discard(&old.path);
                }
                tracing::info!(plant = %details.plant.id, "edited plant");
                Ok(details)
            }
            Err(err) => {
                discard(&self.images, stored.as_ref());
                Err(err)
            }
        }
    }
}

fn discard(images: &ImageStore, stored: Option<&StoredFile>) {
    if let Some(file) = stored {
        images.discard(&file.path);
    }
}

//! Server-rendered pages.
//!
//! Templates are compiled into the binary and share the `layout` partial.
//! Any page rendered for an anonymous visitor also clears the access token
//! cookie, so a stale or forged cookie does not linger in the browser.

use handlebars::{Handlebars, TemplateError};
use serde::Serialize;
use serde_json::{Map, Value};
use warp::http::header::{HeaderValue, LOCATION, SET_COOKIE};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

use crate::error::AppError;
use crate::filters::COOKIE_NAME;
use crate::models::User;

const LAYOUT: &str = include_str!("../templates/layout.hbs");

const TEMPLATES: [(&str, &str); 10] = [
    ("plants/dashboard", include_str!("../templates/plants/dashboard.hbs")),
    ("plants/details", include_str!("../templates/plants/details.hbs")),
    ("plants/create", include_str!("../templates/plants/create.hbs")),
    ("plants/edit", include_str!("../templates/plants/edit.hbs")),
    ("users/register", include_str!("../templates/users/register.hbs")),
    ("users/login", include_str!("../templates/users/login.hbs")),
    ("users/profile", include_str!("../templates/users/profile.hbs")),
    ("users/change_password", include_str!("../templates/users/change_password.hbs")),
    ("shared/404", include_str!("../templates/shared/404.hbs")),
    ("shared/403", include_str!("../templates/shared/403.hbs")),
];

/// Logged-in user as seen by templates.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub is_superuser: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            is_superuser: user.is_superuser,
        }
    }
}

/// Values available to every template.
#[derive(Debug, Default, Serialize)]
pub struct PageContext {
    pub user: Option<UserView>,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageContext {
    pub fn new(user: Option<&User>) -> Self {
        Self {
            user: user.map(UserView::from),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> Result<Self, AppError> {
        self.extra.insert(key.to_owned(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn message(mut self, message: &str) -> Self {
        self.messages.push(message.to_owned());
        self
    }

    pub fn errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial("layout", LAYOUT)?;
        for (name, source) in TEMPLATES {
            registry.register_template_string(name, source)?;
        }
        Ok(Self { registry })
    }

    pub fn render(
        &self,
        template: &str,
        context: &PageContext,
        status: StatusCode,
    ) -> Result<Response, AppError> {
        let body = self.registry.render(template, context)?;
        let mut response = warp::reply::with_status(warp::reply::html(body), status).into_response();
        if context.user.is_none() {
            response
                .headers_mut()
                .append(SET_COOKIE, HeaderValue::from_static(CLEAR_COOKIE));
        }
        Ok(response)
    }

    pub fn not_found(&self, context: &PageContext) -> Result<Response, AppError> {
        self.render("shared/404", context, StatusCode::NOT_FOUND)
    }

    pub fn forbidden(&self, context: &PageContext) -> Result<Response, AppError> {
        self.render("shared/403", context, StatusCode::FORBIDDEN)
    }
}

const CLEAR_COOKIE: &str = "access_token=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

/// `Set-Cookie` value storing `Bearer <token>` for `max_age` seconds.
pub fn session_cookie(token: &str, max_age: u64) -> Result<HeaderValue, AppError> {
    let value = format!(
        "{COOKIE_NAME}=\"Bearer {token}\"; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax"
    );
    Ok(HeaderValue::from_str(&value)?)
}

pub fn redirect(location: &str) -> Result<Response, AppError> {
    let mut response = warp::reply::with_status(warp::reply(), StatusCode::FOUND).into_response();
    response
        .headers_mut()
        .insert(LOCATION, HeaderValue::from_str(location)?);
    Ok(response)
}

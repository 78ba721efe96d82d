//! # soon-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use askama::Template;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use soon_core::error::AppError;
use soon_core::lifecycle::ReleaseService;
use soon_core::models::{Link, ReleaseDraft};
use soon_core::traits::AuthProvider;
use soon_ui::{EmailsTemplate, IndexTemplate, LoginTemplate, ReleaseFormTemplate};
use uuid::Uuid;

use crate::error::WebError;
use crate::session::{removal_cookie, session_cookie, Operator};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub releases: Arc<ReleaseService>,
    pub auth: Box<dyn AuthProvider>,
    pub site_name: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct EmailForm {
    new_email: String,
}

type HandlerResult = Result<HttpResponse, WebError>;

/// Renders the public listing of upcoming releases.
pub async fn index(data: web::Data<AppState>, operator: Option<Operator>) -> HandlerResult {
    let releases = data.releases.list_upcoming(today()).await?;
    render(
        StatusCode::OK,
        IndexTemplate {
            site_name: &data.site_name,
            releases: &releases,
            logged_in: operator.is_some(),
        },
    )
}

pub async fn login_form(data: web::Data<AppState>) -> HandlerResult {
    render(StatusCode::OK, LoginTemplate { site_name: &data.site_name, error: None })
}

pub async fn login(data: web::Data<AppState>, form: web::Form<LoginForm>) -> HandlerResult {
    if !data.auth.verify_credentials(&form.username, &form.password).await {
        return render(
            StatusCode::UNAUTHORIZED,
            LoginTemplate { site_name: &data.site_name, error: Some("Invalid credentials") },
        );
    }

    log::info!("operator logged in");
    Ok(HttpResponse::SeeOther()
        .cookie(session_cookie(data.auth.issue_session()))
        .insert_header((header::LOCATION, "/"))
        .finish())
}

pub async fn logout() -> HttpResponse {
    HttpResponse::SeeOther()
        .cookie(removal_cookie())
        .insert_header((header::LOCATION, "/"))
        .finish()
}

pub async fn add_form(_operator: Operator, data: web::Data<AppState>) -> HandlerResult {
    render(StatusCode::OK, ReleaseFormTemplate::for_new(&data.site_name))
}

pub async fn add(_operator: Operator, data: web::Data<AppState>, body: web::Bytes) -> HandlerResult {
    let draft = parse_release_form(&body);
    match data.releases.create(draft.clone()).await {
        Ok(_) => Ok(redirect("/")),
        Err(err) => form_error(&data, "Add release", "/add".into(), draft, err),
    }
}

pub async fn change_form(_operator: Operator, data: web::Data<AppState>, path: web::Path<Uuid>) -> HandlerResult {
    let release = data.releases.get(path.into_inner()).await?;
    render(StatusCode::OK, ReleaseFormTemplate::for_edit(&data.site_name, &release))
}

pub async fn change(
    _operator: Operator,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Bytes,
) -> HandlerResult {
    let id = path.into_inner();
    let draft = parse_release_form(&body);
    match data.releases.update(id, draft.clone()).await {
        Ok(_) => Ok(redirect("/")),
        Err(err) => form_error(&data, "Edit release", format!("/change/{id}"), draft, err),
    }
}

pub async fn delete(_operator: Operator, data: web::Data<AppState>, path: web::Path<Uuid>) -> HandlerResult {
    data.releases.delete(path.into_inner()).await?;
    Ok(redirect("/"))
}

pub async fn emails(_operator: Operator, data: web::Data<AppState>) -> HandlerResult {
    let recipients = data.releases.list_recipients().await?;
    render(
        StatusCode::OK,
        EmailsTemplate { site_name: &data.site_name, recipients: &recipients, error: None },
    )
}

pub async fn add_emails(_operator: Operator, data: web::Data<AppState>, form: web::Form<EmailForm>) -> HandlerResult {
    match data.releases.add_recipients(&form.new_email).await {
        Ok(_) => Ok(redirect("/emails")),
        Err(AppError::ValidationError(msg)) => {
            let recipients = data.releases.list_recipients().await?;
            render(
                StatusCode::BAD_REQUEST,
                EmailsTemplate { site_name: &data.site_name, recipients: &recipients, error: Some(msg) },
            )
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn delete_email(_operator: Operator, data: web::Data<AppState>, path: web::Path<String>) -> HandlerResult {
    data.releases.delete_recipient(&path.into_inner()).await?;
    Ok(redirect("/emails"))
}

/// Re-renders the form for input problems; anything else is a plain error.
fn form_error(data: &AppState, heading: &str, action: String, mut draft: ReleaseDraft, err: AppError) -> HandlerResult {
    let status = match &err {
        AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        _ => return Err(err.into()),
    };
    draft
        .links
        .retain(|l| !(l.text.trim().is_empty() && l.url.trim().is_empty()));
    render(
        status,
        ReleaseFormTemplate::from_draft(&data.site_name, heading, action, draft).with_error(err.to_string()),
    )
}

/// Reads the release form. Links arrive as parallel `link_text[]` and
/// `link_url[]` fields, paired up by position.
fn parse_release_form(body: &[u8]) -> ReleaseDraft {
    let mut draft = ReleaseDraft::default();
    let mut texts = Vec::new();
    let mut urls = Vec::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "title" => draft.title = value.into_owned(),
            "type" => draft.kind = value.into_owned(),
            "release_date" => draft.release_date = value.into_owned(),
            "link_text[]" => texts.push(value.into_owned()),
            "link_url[]" => urls.push(value.into_owned()),
            _ => {}
        }
    }

    draft.links = texts
        .into_iter()
        .zip(urls)
        .map(|(text, url)| Link { text, url })
        .collect();
    draft
}

fn render<T: Template>(status: StatusCode, template: T) -> HandlerResult {
    let html = template.render()?;
    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(html))
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

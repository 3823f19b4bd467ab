//! Subscription HTTP endpoints
//!
//! Mounted under the configured subscription prefix. The bare token route
//! negotiates the output: browsers (Accept: text/html) get an info page,
//! every other client goes through the User-Agent dispatcher.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::core::CoreRegistry;
use crate::error::ConfigError;
use crate::hosts::HostStore;
use crate::models::User;
use crate::settings::Settings;
use crate::subscription::useragent::{match_user_agent, ClientHint, JsonOptIns};
use crate::subscription::{self, SubscriptionFormat};
use crate::utils::base64::encode_title;

/// Lookup of users and their usage history by subscription token. The
/// panel's database layer implements this.
pub trait UserProvider: Send + Sync {
    fn user_by_token(&self, token: &str) -> Option<User>;
    /// Per-node usage rows for the window, as ready-to-serve JSON.
    fn usage_by_token(
        &self,
        token: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Option<serde_json::Value>;
}

/// Token-indexed user records loaded from a JSON file (an object mapping
/// token to user record). Stands in for the panel database in single-binary
/// deployments.
#[derive(Default)]
pub struct FileProvider {
    users: HashMap<String, User>,
}

impl FileProvider {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let users = serde_json::from_str(&raw)?;
        Ok(FileProvider { users })
    }

    pub fn from_users(users: HashMap<String, User>) -> Self {
        FileProvider { users }
    }
}

impl UserProvider for FileProvider {
    fn user_by_token(&self, token: &str) -> Option<User> {
        self.users.get(token).cloned()
    }

    /// A file dump carries no per-node history, so usage is one aggregate row.
    fn usage_by_token(
        &self,
        token: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Option<serde_json::Value> {
        self.users.get(token).map(|u| {
            json!({
                "username": u.username,
                "used_traffic": u.used_traffic,
                "start": start,
                "end": end,
            })
        })
    }
}

pub struct AppState {
    pub provider: Arc<dyn UserProvider>,
    pub cores: Arc<CoreRegistry>,
    pub hosts: Arc<HostStore>,
}

#[derive(Deserialize, Debug, Default)]
pub struct UsageQuery {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

fn wants_html(req: &HttpRequest) -> bool {
    req.headers()
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}

fn user_agent(req: &HttpRequest) -> String {
    req.headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Response headers common to every subscription payload.
fn apply_profile_headers(resp: &mut actix_web::HttpResponseBuilder, user: &User, req: &HttpRequest) {
    let settings = Settings::current();

    let title = user
        .admin
        .as_ref()
        .and_then(|a| a.profile_title.clone())
        .unwrap_or_else(|| settings.profile_title.clone());
    let support = user
        .admin
        .as_ref()
        .and_then(|a| a.support_url.clone())
        .unwrap_or_else(|| settings.support_url.clone());

    resp.append_header((
        "content-disposition",
        format!("attachment; filename=\"{}\"", user.username),
    ));
    resp.append_header((
        "profile-web-page-url",
        req.full_url().to_string(),
    ));
    resp.append_header(("support-url", support));
    resp.append_header(("profile-title", encode_title(&title)));
    resp.append_header((
        "profile-update-interval",
        settings.profile_update_interval.to_string(),
    ));
    resp.append_header((
        "subscription-userinfo",
        subscription::user_info_header(user),
    ));
}

fn render_response(
    user: &User,
    state: &AppState,
    req: &HttpRequest,
    hint: ClientHint,
) -> HttpResponse {
    let cores = state.cores.snapshot();
    let hosts = state.hosts.hosts();
    let mut rng = rand::thread_rng();
    match subscription::render(
        user,
        &cores,
        &hosts,
        hint.format,
        hint.as_base64,
        hint.reverse,
        &mut rng,
    ) {
        Ok(payload) => {
            let mut resp = HttpResponse::Ok();
            resp.content_type(hint.media_type);
            apply_profile_headers(&mut resp, user, req);
            resp.body(payload)
        }
        Err(e) => HttpResponse::InternalServerError().body(format!("render error: {}", e)),
    }
}

fn html_page(user: &User) -> String {
    let vars = subscription::vars::format_variables(user, Utc::now().timestamp());
    let pick = |key: &str| vars.get(key).cloned().unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{username}</title></head>\n\
         <body><h1>{status} {username}</h1>\n\
         <p>Traffic: {used} / {limit}</p>\n\
         <p>Expires: {expire} ({left} left)</p>\n\
         </body></html>\n",
        username = pick("USERNAME"),
        status = pick("STATUS_EMOJI"),
        used = pick("DATA_USAGE"),
        limit = pick("DATA_LIMIT"),
        expire = pick("EXPIRE_DATE"),
        left = pick("TIME_LEFT"),
    )
}

/// `GET /{token}`
pub async fn subscription_handler(
    req: HttpRequest,
    path: web::Path<(String,)>,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let token = &path.0;
    let Some(user) = state.provider.user_by_token(token) else {
        return HttpResponse::NotFound().finish();
    };

    if wants_html(&req) {
        return HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html_page(&user));
    }

    let ua = user_agent(&req);
    let hint = match_user_agent(&ua, &JsonOptIns::from_settings());
    debug!("dispatching '{}' as {:?}", ua, hint.format);
    render_response(&user, &state, &req, hint)
}

/// `GET /{token}/info`
pub async fn info_handler(
    path: web::Path<(String,)>,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let Some(user) = state.provider.user_by_token(&path.0) else {
        return HttpResponse::NotFound().finish();
    };
    HttpResponse::Ok().json(json!({
        "username": user.username,
        "status": user.status,
        "used_traffic": user.used_traffic,
        "data_limit": user.data_limit,
        "expire": user.expire,
    }))
}

/// `GET /{token}/usage?start=..&end=..`
pub async fn usage_handler(
    path: web::Path<(String,)>,
    query: web::Query<UsageQuery>,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    match state
        .provider
        .usage_by_token(&path.0, query.start, query.end)
    {
        Some(usage) => HttpResponse::Ok().json(usage),
        None => HttpResponse::NotFound().finish(),
    }
}

/// `GET /{token}/{client_type}`
pub async fn client_type_handler(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let (token, client_type) = path.into_inner();
    let Some(user) = state.provider.user_by_token(&token) else {
        return HttpResponse::NotFound().finish();
    };
    let format = match SubscriptionFormat::from_name(&client_type) {
        Ok(format) => format,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };
    // Raw links are always served base64 framed
    let hint = ClientHint {
        format,
        media_type: format.media_type(),
        as_base64: format == SubscriptionFormat::Links,
        reverse: false,
    };
    render_response(&user, &state, &req, hint)
}

/// Register the subscription endpoints with Actix Web. The bare token route
/// also answers with a trailing slash.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/{token}", web::get().to(subscription_handler))
        .route("/{token}/", web::get().to(subscription_handler))
        .route("/{token}/info", web::get().to(info_handler))
        .route("/{token}/usage", web::get().to(usage_handler))
        .route("/{token}/{client_type}", web::get().to(client_type_handler));
}

//! # soon-api
//!
//! The web routing and orchestration layer for SoonSite.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod session;

pub use handlers::AppState;

use actix_web::web;

/// Configures the routes for the release tracker.
///
/// # Developer Note
/// Everything except `/`, `/login` and `/logout` requires an operator session;
/// the `Operator` extractor redirects to `/login` otherwise.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .service(
            web::resource("/login")
                .route(web::get().to(handlers::login_form))
                .route(web::post().to(handlers::login)),
        )
        .route("/logout", web::get().to(handlers::logout))
        .service(
            web::resource("/add")
                .route(web::get().to(handlers::add_form))
                .route(web::post().to(handlers::add)),
        )
        .service(
            web::resource("/change/{id}")
                .route(web::get().to(handlers::change_form))
                .route(web::post().to(handlers::change)),
        )
        .route("/delete/{id}", web::post().to(handlers::delete))
        .service(
            web::resource("/emails")
                .route(web::get().to(handlers::emails))
                .route(web::post().to(handlers::add_emails)),
        )
        .route("/emails/delete/{email}", web::post().to(handlers::delete_email));
}

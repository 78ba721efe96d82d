//! # SoonSite Binary
//!
//! Assembles the release tracker from settings and compile-time features,
//! then runs the HTTP front and the daily reminder scheduler side by side.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{bail, Context};
use clap::Parser;
use soon_api::middleware::{security_headers, standard_middleware};
use soon_api::{configure_routes, AppState};
use soon_auth_simple::SimpleAuthProvider;
use soon_config::{Settings, StorageBackend};
use soon_core::{DailyScheduler, Notifier, NotifierConfig, RecordStore, ReleaseService};
use soon_mail_smtp::SmtpMailTransport;

#[cfg(feature = "db-sqlite")]
use soon_db_sqlite::SqliteRecordStore;

#[cfg(feature = "store-json")]
use soon_store_json::JsonRecordStore;

#[derive(Parser)]
#[command(name = "soonsite", version, about = "Upcoming release tracker with email reminders")]
struct Cli {
    /// Settings file name, without extension
    #[arg(short, long, default_value = soon_config::DEFAULT_FILE)]
    config: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let store = open_store(&settings).await?;
    let releases = Arc::new(ReleaseService::new(store.clone()));

    let auth = SimpleAuthProvider::new(
        &settings.auth.username,
        settings.auth.password_hash.clone(),
        &settings.auth.session_secret,
        chrono::Duration::hours(settings.auth.session_ttl_hours),
    )
    .context("session secret")?;

    let transport = SmtpMailTransport::new(
        &settings.mail.smtp_host,
        settings.mail.smtp_port,
        &settings.mail.username,
        &settings.mail.password,
    )?;
    let notifier = Notifier::new(
        store,
        Arc::new(transport),
        NotifierConfig {
            from: settings.mail.sender().to_string(),
            reminder_window_days: settings.notifier.reminder_window_days,
        },
    );

    let today = chrono::Local::now().date_naive();
    releases.purge_expired(today).await?;

    let scheduler = DailyScheduler::new(releases.clone(), notifier, settings.notifier.send_at_time()?);
    actix_web::rt::spawn(scheduler.run_forever());

    let state = web::Data::new(AppState {
        releases,
        auth: Box::new(auth),
        site_name: settings.site_name.clone(),
    });

    let (host, port) = settings.bind_address();
    log::info!("{} starting on http://{host}:{port}", settings.site_name);

    HttpServer::new(move || {
        App::new()
            .wrap(standard_middleware())
            .wrap(security_headers())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await?;

    Ok(())
}

/// Opens the configured backend. Fails if it was compiled out.
async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn RecordStore>> {
    let storage = &settings.storage;
    match storage.backend {
        #[cfg(feature = "db-sqlite")]
        StorageBackend::Sqlite => {
            log::info!("using sqlite store at {}", storage.database_url);
            let store = SqliteRecordStore::new(&storage.database_url)
                .await
                .with_context(|| format!("opening {}", storage.database_url))?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "store-json")]
        StorageBackend::Json => {
            log::info!("using json store at {} and {}", storage.data_file, storage.emails_file);
            let store = JsonRecordStore::open(&storage.data_file, &storage.emails_file)
                .await
                .with_context(|| format!("opening {}", storage.data_file))?;
            Ok(Arc::new(store))
        }
        #[allow(unreachable_patterns)]
        other => bail!("storage backend {other:?} is not compiled into this build"),
    }
}

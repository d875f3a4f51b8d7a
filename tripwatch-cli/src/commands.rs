//! Command handlers.
//!
//! Every handler talks to the backend through the shared [`Session`], so
//! credentials, refresh and error normalization come from the core pipeline.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tripwatch_core::{
    ApiError, LocationUpdate, NewSavedLocation, NewTrip, NewTrustedContact, RegisterRequest,
    Resource, Resources, Session,
};

/// Everything a command needs to run.
pub struct App {
    pub session: Session,
    pub resources: Resources,
}

impl App {
    pub fn new(session: Session) -> Self {
        let resources = Resources::new(session.client().clone());
        Self { session, resources }
    }

    /// Clear the stored session when the backend rejected our credentials.
    ///
    /// `sent_credentials` is false for public commands such as `login`, whose
    /// 401 says nothing about the session currently held.
    pub async fn on_failure(&self, err: &anyhow::Error, sent_credentials: bool) {
        if !sent_credentials {
            return;
        }
        if let Some(api) = err.downcast_ref::<ApiError>() {
            if api.is_unauthorized() && self.session.is_authenticated() {
                info!("Backend rejected credentials, clearing session");
                self.session.logout().await;
            }
        }
    }

    fn require_session(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            bail!("Not logged in. Run `tripwatch login` first.");
        }
        Ok(())
    }
}

pub async fn login(app: &App, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ").await?,
    };

    app.session.login(email, &password).await?;
    println!("Logged in as {}", email);
    Ok(())
}

pub async fn register(
    app: &App,
    name: &str,
    email: &str,
    phone: &str,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ").await?,
    };

    let form = RegisterRequest::new(name, email, phone, password);
    match app.session.register(&form).await {
        Ok(()) => {
            println!("Registered and logged in as {}", email);
            Ok(())
        }
        Err(e) if e.is_conflict() => {
            bail!("An account for {} already exists: {}", email, e.message)
        }
        Err(e) => {
            print_field_errors(&e);
            Err(e.into())
        }
    }
}

pub async fn logout(app: &App) -> Result<()> {
    app.session.logout().await;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    app.require_session()?;
    let me = app.session.current_user().await?;
    print_json(&me)
}

pub async fn list(app: &App, resource: Resource) -> Result<()> {
    app.require_session()?;
    let items = app.resources.list(resource).await?;
    debug!(count = items.len(), path = resource.path(), "Listed resource");
    print_json(&items)
}

pub async fn show(app: &App, resource: Resource, id: i64) -> Result<()> {
    app.require_session()?;
    let item = app.resources.fetch(resource, id).await?;
    print_json(&item)
}

pub async fn remove(app: &App, resource: Resource, id: i64) -> Result<()> {
    app.require_session()?;
    app.resources.remove(resource, id).await?;
    println!("Removed {}", resource.item_path(id));
    Ok(())
}

pub async fn add_location(app: &App, location: NewSavedLocation) -> Result<()> {
    app.require_session()?;
    let created = app.resources.add_location(&location).await?;
    print_json(&created)
}

pub async fn add_contact(app: &App, contact: NewTrustedContact) -> Result<()> {
    app.require_session()?;
    let created = app.resources.add_contact(&contact).await?;
    print_json(&created)
}

pub async fn start_trip(app: &App, trip: NewTrip) -> Result<()> {
    app.require_session()?;
    let started = app.resources.start_trip(&trip).await?;
    print_json(&started)
}

pub async fn update_trip(app: &App, trip_id: i64, latitude: f64, longitude: f64) -> Result<()> {
    app.require_session()?;
    let update = LocationUpdate::now(latitude, longitude);
    let response = app.resources.update_location(trip_id, &update).await?;
    print_json(&response)
}

pub async fn end_trip(app: &App, trip_id: i64) -> Result<()> {
    app.require_session()?;
    let ended = app.resources.end_trip(trip_id).await?;
    print_json(&ended)
}

pub async fn acknowledge_alert(app: &App, alert_id: i64) -> Result<()> {
    app.require_session()?;
    app.resources.acknowledge_alert(alert_id).await?;
    println!("Acknowledged alert {}", alert_id);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render response")?;
    println!("{}", rendered);
    Ok(())
}

fn print_field_errors(err: &ApiError) {
    if let Some(fields) = &err.field_errors {
        for (field, message) in fields {
            eprintln!("  {}: {}", field, message);
        }
    }
}

async fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;

    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        bail!("No input given");
    }
    Ok(value)
}

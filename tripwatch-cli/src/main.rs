//! Tripwatch CLI
//!
//! Command-line client for the Tripwatch trip-safety API.
//!
//! # Usage
//!
//! ```bash
//! # Log in (prompts for the password)
//! tripwatch login --email ada@example.com
//!
//! # Show the logged-in user
//! tripwatch whoami
//!
//! # Start a trip between two saved locations and report a position
//! tripwatch trips start --from 1 --to 2
//! tripwatch trips update 5 --lat 51.5 --lon -0.12
//! ```

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tripwatch_core::{
    ApiClient, NewSavedLocation, NewTrip, NewTrustedContact, Resource, SecretStore, Session,
    create_store,
};

use crate::commands::App;
use crate::config::{CliConfig, load_config};

#[derive(Parser)]
#[command(name = "tripwatch")]
#[command(about = "Trip-safety client: sessions, saved places, contacts, trips and alerts")]
#[command(version)]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,

        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        /// Phone number used for alerts
        #[arg(long)]
        phone: String,

        /// Password (prompted for when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Manage saved locations
    Locations {
        #[command(subcommand)]
        action: LocationAction,
    },

    /// Manage trusted contacts
    Contacts {
        #[command(subcommand)]
        action: ContactAction,
    },

    /// Start, follow and end trips
    Trips {
        #[command(subcommand)]
        action: TripAction,
    },

    /// Review alerts
    Alerts {
        #[command(subcommand)]
        action: AlertAction,
    },
}

#[derive(Subcommand)]
enum LocationAction {
    List,
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        address: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand)]
enum ContactAction {
    List,
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(long)]
        phone: String,

        #[arg(short, long)]
        email: Option<String>,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand)]
enum TripAction {
    List,
    Show {
        id: i64,
    },
    /// Start a trip between two saved locations
    Start {
        /// Origin location id
        #[arg(long)]
        from: i64,

        /// Destination location id
        #[arg(long)]
        to: i64,
    },
    /// Report the current position for a trip
    Update {
        id: i64,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    End {
        id: i64,
    },
}

#[derive(Subcommand)]
enum AlertAction {
    List,
    /// Acknowledge an alert
    Ack {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);
    debug!("Loaded config from {:?}", config.config_path);

    let app = build_app(&config).await?;

    run(&app, cli.command).await
}

/// Run `command`, clearing the session if the backend rejected it.
async fn run(app: &App, command: Commands) -> Result<()> {
    let sent_credentials = command.sends_credentials();
    let result = dispatch(app, command).await;
    if let Err(e) = &result {
        app.on_failure(e, sent_credentials).await;
    }
    result
}

impl Commands {
    /// Whether the command calls the backend with the stored session.
    fn sends_credentials(&self) -> bool {
        !matches!(self, Commands::Login { .. } | Commands::Register { .. } | Commands::Logout)
    }
}

fn init_logging(config: &CliConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_app(config: &CliConfig) -> Result<App> {
    let store: Arc<dyn SecretStore> = Arc::from(create_store(config.storage, &config.data_dir));
    let client = ApiClient::new(&config.client, store).context("Failed to create API client")?;

    let session = Session::new(Arc::new(client));
    if session.restore().await {
        debug!("Restored stored session");
    }

    Ok(App::new(session))
}

async fn dispatch(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => commands::login(app, &email, password).await,
        Commands::Register {
            name,
            email,
            phone,
            password,
        } => commands::register(app, &name, &email, &phone, password).await,
        Commands::Logout => commands::logout(app).await,
        Commands::Whoami => commands::whoami(app).await,
        Commands::Locations { action } => match action {
            LocationAction::List => commands::list(app, Resource::Locations).await,
            LocationAction::Add {
                name,
                address,
                lat,
                lon,
            } => {
                let location = NewSavedLocation {
                    name,
                    address,
                    latitude: lat,
                    longitude: lon,
                };
                commands::add_location(app, location).await
            }
            LocationAction::Remove { id } => commands::remove(app, Resource::Locations, id).await,
        },
        Commands::Contacts { action } => match action {
            ContactAction::List => commands::list(app, Resource::Contacts).await,
            ContactAction::Add { name, phone, email } => {
                let contact = NewTrustedContact {
                    name,
                    phone_number: phone,
                    email,
                };
                commands::add_contact(app, contact).await
            }
            ContactAction::Remove { id } => commands::remove(app, Resource::Contacts, id).await,
        },
        Commands::Trips { action } => match action {
            TripAction::List => commands::list(app, Resource::Trips).await,
            TripAction::Show { id } => commands::show(app, Resource::Trips, id).await,
            TripAction::Start { from, to } => {
                let trip = NewTrip {
                    origin_location_id: from,
                    destination_location_id: to,
                };
                commands::start_trip(app, trip).await
            }
            TripAction::Update { id, lat, lon } => commands::update_trip(app, id, lat, lon).await,
            TripAction::End { id } => commands::end_trip(app, id).await,
        },
        Commands::Alerts { action } => match action {
            AlertAction::List => commands::list(app, Resource::Alerts).await,
            AlertAction::Ack { id } => commands::acknowledge_alert(app, id).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;
    use tripwatch_core::{ApiError, ClientConfig, CredentialPair, MemoryStore};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn logged_in_app(server: &MockServer) -> App {
        let client =
            ApiClient::new(&ClientConfig::new(server.uri()), Arc::new(MemoryStore::new())).unwrap();
        let app = App::new(Session::new(Arc::new(client)));
        app.session
            .client()
            .tokens()
            .save(&CredentialPair::new("a1", "r1"))
            .await;
        app
    }

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_trip_update_with_negative_longitude() {
        let cli = Cli::try_parse_from([
            "tripwatch", "trips", "update", "5", "--lat", "51.5", "--lon", "-0.12",
        ])
        .unwrap();

        match cli.command {
            Commands::Trips {
                action: TripAction::Update { id, lat, lon },
            } => {
                assert_eq!(id, 5);
                assert_eq!(lat, 51.5);
                assert_eq!(lon, -0.12);
            }
            _ => panic!("expected trips update"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tripwatch", "whoami", "--verbose", "--config", "/tmp/tripwatch.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tripwatch.toml")));
        assert!(matches!(cli.command, Commands::Whoami));
    }

    #[test]
    fn test_login_requires_email() {
        assert!(Cli::try_parse_from(["tripwatch", "login"]).is_err());
    }

    #[test]
    fn test_public_commands_do_not_send_credentials() {
        assert!(!parse(&["tripwatch", "login", "-e", "ada@example.com"]).sends_credentials());
        assert!(!parse(&["tripwatch", "logout"]).sends_credentials());
        assert!(parse(&["tripwatch", "whoami"]).sends_credentials());
        assert!(parse(&["tripwatch", "alerts", "ack", "9"]).sends_credentials());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "status": 401,
                "message": "Bad credentials"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = logged_in_app(&server).await;
        let command = parse(&["tripwatch", "login", "-e", "ada@example.com", "-p", "typo"]);

        let err = run(&app, command).await.unwrap_err();
        assert_eq!(err.to_string(), "Bad credentials");
        assert!(app.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_authenticated_command_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "accessToken": "a2", "refreshToken": "r2" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let app = logged_in_app(&server).await;
        let err = run(&app, parse(&["tripwatch", "whoami"])).await.unwrap_err();

        assert_eq!(err.downcast_ref::<ApiError>().map(|e| e.status), Some(401));
        assert!(!app.session.is_authenticated());
    }
}

//! portal - volunteer portal from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use portal_client::{logging, Config, Portal, Registration};
use portal_common::RecordId;

mod commands;
mod output;

use commands::EventFields;

/// portal - volunteer portal from the command line
#[derive(Parser, Debug)]
#[command(name = "portal")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (default: ./portal.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Account ===
    /// Sign in with email and password
    Login {
        email: String,

        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create a volunteer account
    Register {
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and forget the cached profile
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Send a password reset link
    ResetPassword { email: String },

    /// Set a new password for the signed-in user
    UpdatePassword {
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    // === Events ===
    /// Upcoming events with seats left
    Events,

    /// Dates of upcoming events, cancelled ones included
    Calendar,

    /// Sign up for an event
    Join {
        /// Event id
        event: RecordId,
    },

    /// Withdraw from an event
    Leave {
        /// Event id
        event: RecordId,
    },

    /// Events you signed up for
    MySignups,

    /// Hours volunteered
    MyHours,

    // === Notifications ===
    /// List notifications and mark them read
    Notifications,

    /// Number of unread notifications
    Unread,

    // === Administration ===
    /// Admin commands
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Subcommand, Debug)]
enum AdminCommands {
    /// Create an event and notify volunteers
    Add(EventFields),

    /// Change fields of an event
    Edit {
        /// Event id
        event: RecordId,

        #[command(flatten)]
        fields: EventFields,
    },

    /// Cancel an event
    Cancel {
        /// Event id
        event: RecordId,
    },

    /// Who signed up for each event
    Rosters,

    /// Volunteers and their hours
    Volunteers,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Failed to load configuration: {}. \
                 Create portal.toml or set PORTAL__BACKEND__URL and PORTAL__BACKEND__ANON_KEY.",
                e
            );
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    logging::init(level);

    let portal = match Portal::new(config) {
        Ok(portal) => portal,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&portal, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(portal: &Portal, command: Commands) -> portal_client::Result<()> {
    match command {
        Commands::Login { email, password } => commands::login(portal, &email, &password).await,
        Commands::Register {
            email,
            first_name,
            last_name,
            password,
        } => {
            let registration = Registration {
                email,
                password,
                first_name,
                last_name,
            };
            commands::register(portal, registration).await
        }
        Commands::Logout => commands::logout(portal).await,
        Commands::Whoami => commands::whoami(portal).await,
        Commands::ResetPassword { email } => commands::reset_password(portal, &email).await,
        Commands::UpdatePassword { password } => commands::update_password(portal, &password).await,
        Commands::Events => commands::events(portal).await,
        Commands::Calendar => commands::calendar(portal).await,
        Commands::Join { event } => commands::join(portal, &event).await,
        Commands::Leave { event } => commands::leave(portal, &event).await,
        Commands::MySignups => commands::my_signups(portal).await,
        Commands::MyHours => commands::my_hours(portal).await,
        Commands::Notifications => commands::notifications(portal).await,
        Commands::Unread => commands::unread(portal).await,
        Commands::Admin(admin) => match admin {
            AdminCommands::Add(fields) => commands::admin_add(portal, fields).await,
            AdminCommands::Edit { event, fields } => commands::admin_edit(portal, &event, fields).await,
            AdminCommands::Cancel { event } => commands::admin_cancel(portal, &event).await,
            AdminCommands::Rosters => commands::admin_rosters(portal).await,
            AdminCommands::Volunteers => commands::admin_volunteers(portal).await,
        },
    }
}

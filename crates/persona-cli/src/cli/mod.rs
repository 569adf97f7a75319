//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use persona_core::api::{ApiClient, ClientOptions};
use persona_core::config::{self, Config};
use persona_core::resources::Category;
use persona_core::session::AuthSession;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::session_store::{SessionStore, StoredSession};

mod commands;

#[derive(Parser)]
#[command(name = "persona")]
#[command(version)]
#[command(about = "Build and publish OpenPersona portfolios from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the API base URL
    #[arg(long, global = true, env = config::API_URL_ENV)]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Password (prompted on stdin if omitted)
        #[arg(long, env = "PERSONA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Password (prompted on stdin if omitted)
        #[arg(long, env = "PERSONA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Manage your portfolios
    Portfolios {
        #[command(subcommand)]
        command: PortfolioCommands,
    },

    /// List themes for a category (personal or business)
    Themes {
        #[arg(value_name = "CATEGORY")]
        category: Category,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum PortfolioCommands {
    /// Lists your portfolios
    List,
    /// Shows a portfolio by ID
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Shows a published portfolio by slug (no sign-in needed)
    Public {
        #[arg(value_name = "SLUG")]
        slug: String,
    },
    /// Creates a portfolio from a JSON file of form fields
    Create {
        #[arg(long)]
        category: Category,
        /// Theme ID (see `persona themes <category>`)
        #[arg(long)]
        theme: String,
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },
    /// Replaces a portfolio's content from a JSON file
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },
    /// Deletes a portfolio
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

/// Signed-out or signed-in state shared by command handlers.
pub struct AppContext {
    pub session: AuthSession,
    store: SessionStore,
    /// A stored session for this server was loaded at startup
    restored: bool,
}

impl AppContext {
    fn new(config: &Config, api_url: Option<&str>) -> Result<Self> {
        let mut options = ClientOptions::from_config(config)?;
        if let Some(url) = api_url.map(str::trim).filter(|u| !u.is_empty()) {
            options.base_url = url.trim_end_matches('/').to_string();
        }

        let client = ApiClient::new(options).context("create API client")?;
        let store = SessionStore::new(config::paths::session_path());
        let stored = store.load(client.base_url())?;
        if let Some(stored) = &stored {
            debug!(path = %store.path().display(), "loaded stored session");
            client.restore_session_cookies(&stored.cookies);
        }

        Ok(Self {
            session: AuthSession::new(client, config.endpoints.clone()),
            store,
            restored: stored.is_some(),
        })
    }

    pub fn client(&self) -> &ApiClient {
        self.session.client()
    }

    /// Persists the refresh cookie for later runs.
    ///
    /// If the server dropped the cookie, the stored session is removed too.
    pub fn persist(&self) -> Result<()> {
        let Some(cookies) = self.client().session_cookies() else {
            if self.restored && self.store.clear()? {
                debug!("refresh cookie gone, removed stored session");
            }
            return Ok(());
        };
        self.store.save(&StoredSession {
            base_url: self.client().base_url().to_string(),
            cookies,
        })
    }

    pub fn forget(&self) -> Result<bool> {
        self.store.clear()
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PERSONA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, api_url } = cli;

    if let Commands::Config { command } = &command {
        return match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        };
    }

    let config = Config::load().context("load config")?;
    let ctx = AppContext::new(&config, api_url.as_deref())?;

    let result = match command {
        Commands::Register {
            username,
            email,
            password,
        } => commands::auth::register(&ctx, &username, &email, password).await,
        Commands::Login { email, password } => {
            commands::auth::login(&ctx, &email, password).await
        }
        Commands::Logout => return commands::auth::logout(&ctx).await,
        Commands::Whoami => commands::auth::whoami(&ctx).await,
        Commands::Portfolios { command } => match command {
            PortfolioCommands::List => commands::portfolios::list(&ctx).await,
            PortfolioCommands::Show { id } => commands::portfolios::show(&ctx, &id).await,
            PortfolioCommands::Public { slug } => commands::portfolios::public(&ctx, &slug).await,
            PortfolioCommands::Create {
                category,
                theme,
                file,
            } => commands::portfolios::create(&ctx, category, &theme, &file).await,
            PortfolioCommands::Update { id, file } => {
                commands::portfolios::update(&ctx, &id, &file).await
            }
            PortfolioCommands::Delete { id } => commands::portfolios::delete(&ctx, &id).await,
        },
        Commands::Themes { category } => commands::themes::list(&ctx, category).await,
        Commands::Config { .. } => Ok(()),
    };

    // The server may rotate the refresh cookie on any call; keep the latest.
    let persisted = ctx.persist();
    if let (Err(_), Err(e)) = (&result, &persisted) {
        warn!(error = %format!("{e:#}"), "failed to save session");
    }
    result?;
    persisted
}

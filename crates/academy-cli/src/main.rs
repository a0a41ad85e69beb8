//! Academy CLI - sign in to Plasturgie-Nous Academy and browse your training

use std::sync::Arc;

use academy_core::api::{
    ApiClient, Course, Credentials, RegisterRequest, ReviewCreate, Role, User,
};
use academy_core::config::Config;
use academy_core::session::{RefreshOutcome, SessionManager};
use academy_core::storage::{KeyValueStore, open_store};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

#[derive(Parser)]
#[command(name = "academy")]
#[command(author, version, about = "Plasturgie-Nous Academy client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Username or email address
        username_or_email: String,
        /// Password (falls back to ACADEMY_PASSWORD)
        #[arg(short, long, env = "ACADEMY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Password (falls back to ACADEMY_PASSWORD)
        #[arg(short, long, env = "ACADEMY_PASSWORD", hide_env_values = true)]
        password: String,
        /// Requested role (learner, instructor, company_rep)
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
    },

    /// Sign out
    Logout,

    /// Refresh and show the signed-in user
    Whoami,

    /// Show the local session state
    Status,

    /// List courses
    Courses,

    /// Show one course
    Course { id: i64 },

    /// List events
    Events,

    /// List partner companies
    Companies {
        /// Search by name
        #[arg(short, long, conflicts_with = "city")]
        search: Option<String>,
        /// Filter by city
        #[arg(short, long)]
        city: Option<String>,
    },

    /// List services offered by partner companies
    Services,

    /// Your enrollments
    Enrollments,

    /// Your certifications
    Certifications,

    /// Your payments
    Payments,

    /// Your reviews
    Reviews,

    /// Review a course
    Review {
        course_id: i64,
        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: u8,
        #[arg(short, long, default_value = "")]
        comment: String,
    },

    /// List the platform roles
    Roles,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse(s).ok_or_else(|| {
        let known: Vec<_> = Role::ALL.iter().map(Role::as_str).collect();
        format!("unknown role '{}' (expected one of {})", s, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("academy=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    if let Commands::Config { action } = cli.command {
        return cmd_config(action, &out);
    }

    let config = Config::load()?;
    config.validate()?;
    let session = open_session(&config).await?;

    match cli.command {
        Commands::Login {
            username_or_email,
            password,
        } => cmd_login(&session, Credentials::new(username_or_email, password), &out).await,

        Commands::Register {
            first_name,
            last_name,
            username,
            email,
            password,
            role,
        } => {
            let request = RegisterRequest {
                first_name,
                last_name,
                username,
                email,
                password,
                role,
            };
            cmd_register(&session, &request, &out).await
        }

        Commands::Logout => {
            session.logout().await;
            out.message("Logged out.");
            Ok(())
        }

        Commands::Whoami => cmd_whoami(&session, &out).await,

        Commands::Status => cmd_status(&session, &config, &out),

        Commands::Courses => {
            let courses = session.api().courses().await?;
            out.list(&courses, "No courses found.", course_line)
        }

        Commands::Course { id } => {
            let course = session.api().course(id).await?;
            out.item(&course, |c| {
                let mut text = course_line(c);
                if !c.description.is_empty() {
                    text.push_str(&format!("\n\n{}", c.description));
                }
                text
            })
        }

        Commands::Events => {
            let events = session.api().events().await?;
            out.list(&events, "No upcoming events.", |e| {
                format!(
                    "  {} - {} ({}){}",
                    e.id,
                    e.title,
                    e.event_date,
                    e.location
                        .as_deref()
                        .map(|l| format!(" @ {}", l))
                        .unwrap_or_default()
                )
            })
        }

        Commands::Companies { search, city } => {
            let api = session.api();
            let companies = match (search, city) {
                (Some(query), _) => api.search_companies(&query).await?,
                (None, Some(city)) => api.companies_by_city(&city).await?,
                (None, None) => api.companies().await?,
            };
            out.list(&companies, "No companies found.", |c| {
                format!("  {} - {} ({})", c.company_id, c.name, c.city)
            })
        }

        Commands::Services => {
            let services = session.api().services().await?;
            out.list(&services, "No services found.", |s| {
                let company = s.company.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
                format!("  {} - {} [{}] by {}", s.service_id, s.name, s.category, company)
            })
        }

        Commands::Enrollments => {
            require_sign_in(&session)?;
            let enrollments = session.api().my_enrollments().await?;
            out.list(&enrollments, "No enrollments.", |e| {
                format!(
                    "  {} - course {} since {} ({:?})",
                    e.id, e.course_id, e.enrollment_date, e.status
                )
            })
        }

        Commands::Certifications => {
            require_sign_in(&session)?;
            let certifications = session.api().my_certifications().await?;
            out.list(&certifications, "No certifications.", |c| {
                format!(
                    "  {} - course {} on {} ({:?})",
                    c.id, c.course_id, c.certification_date, c.status
                )
            })
        }

        Commands::Payments => {
            require_sign_in(&session)?;
            let payments = session.api().my_payments().await?;
            out.list(&payments, "No payments.", |p| {
                format!(
                    "  {} - {:.2} via {:?} ({:?})",
                    p.id, p.amount, p.payment_method, p.status
                )
            })
        }

        Commands::Reviews => {
            require_sign_in(&session)?;
            let reviews = session.api().my_reviews().await?;
            out.list(&reviews, "No reviews.", |r| {
                format!("  {} - {}/5 {}", r.id, r.rating, r.comment)
            })
        }

        Commands::Review {
            course_id,
            rating,
            comment,
        } => {
            require_sign_in(&session)?;
            let review = ReviewCreate { rating, comment };
            session
                .api()
                .create_course_review(course_id, &review)
                .await?;
            out.message(&format!("Review posted for course {}.", course_id));
            Ok(())
        }

        Commands::Roles => {
            let roles = session.api().roles();
            out.list(roles, "", |r| format!("  {}", r))
        }

        Commands::Config { action } => cmd_config(action, &out),
    }
}

async fn open_session(config: &Config) -> anyhow::Result<SessionManager> {
    let api = ApiClient::new(&config.api).context("Failed to build API client")?;
    let store: Arc<dyn KeyValueStore> =
        open_store(&config.storage).context("Failed to open session storage")?;
    debug!(base_url = %api.base_url(), backend = %config.storage.backend, "Opening session");
    Ok(SessionManager::launch(api, store).await)
}

fn require_sign_in(session: &SessionManager) -> anyhow::Result<()> {
    if session.is_authenticated() {
        Ok(())
    } else {
        anyhow::bail!("Not signed in. Run `academy login <username-or-email>` first.")
    }
}

fn course_line(c: &Course) -> String {
    format!(
        "  {} - {} [{}] {:?}, {:.2}",
        c.course_id, c.title, c.category, c.mode, c.price
    )
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_login(
    session: &SessionManager,
    credentials: Credentials,
    out: &Output,
) -> anyhow::Result<()> {
    if credentials.username_or_email.trim().is_empty() || credentials.password.is_empty() {
        anyhow::bail!("Username/email and password are both required.");
    }

    match session.perform_login(&credentials).await {
        Ok(()) => {
            let user = session.user();
            match (out.format, user) {
                (OutputFormat::Json, Some(user)) => out.json(&user),
                (_, Some(user)) => {
                    out.message(&format!("Signed in as {} ({}).", user.username, user.role));
                    Ok(())
                }
                (_, None) => Ok(()),
            }
        }
        Err(e) if e.is_unauthorized() => {
            anyhow::bail!("Incorrect credentials. Check your username/email and password.")
        }
        Err(e) => Err(describe(e)),
    }
}

async fn cmd_register(
    session: &SessionManager,
    request: &RegisterRequest,
    out: &Output,
) -> anyhow::Result<()> {
    session.register(request).await.map_err(describe)?;
    out.message(&format!(
        "Account '{}' created. Sign in with `academy login {}`.",
        request.username, request.username
    ));
    Ok(())
}

async fn cmd_whoami(session: &SessionManager, out: &Output) -> anyhow::Result<()> {
    match session.try_refresh_user_data().await {
        Ok(RefreshOutcome::NoToken) | Ok(RefreshOutcome::LoggedOut) => {
            anyhow::bail!("Not signed in.")
        }
        Ok(outcome) => debug!(?outcome, "Refreshed"),
        // Offline: fall back to the stored profile
        Err(e) => tracing::warn!(error = %e.message(), "Could not reach the server"),
    }

    let user = session.user().context("Not signed in.")?;
    out.item(&user, user_block)
}

fn cmd_status(session: &SessionManager, config: &Config, out: &Output) -> anyhow::Result<()> {
    let snapshot = session.snapshot();
    if out.format == OutputFormat::Json {
        return out.json(&serde_json::json!({
            "phase": snapshot.phase().as_str(),
            "authenticated": snapshot.is_authenticated(),
            "has_token": snapshot.token.is_some(),
            "persisted": snapshot.persisted,
            "user": snapshot.user,
            "api_base_url": session.api().base_url(),
            "storage_backend": config.storage.backend.as_str(),
        }));
    }

    println!("Session: {}", snapshot.phase());
    if let Some(user) = &snapshot.user {
        println!("{}", user_block(user));
    }
    println!("Server: {}", session.api().base_url());
    println!("Storage: {}", config.storage.backend);
    if !snapshot.persisted {
        println!("Warning: session could not be saved to storage");
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, out: &Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            out.message(&format!("Set {} = {}", key, value));
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            out.message("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn user_block(user: &User) -> String {
    format!(
        "  ID: {}\n  Username: {}\n  Email: {}\n  Role: {}",
        user.id, user.username, user.email, user.role
    )
}

/// Turn a core error into a message with its hint
fn describe(e: academy_core::Error) -> anyhow::Error {
    match e.suggestion() {
        Some(hint) => anyhow::anyhow!("{} [{}]\n  hint: {}", e.message(), e.code(), hint),
        None => anyhow::anyhow!("{} [{}]", e.message(), e.code()),
    }
}

// ============================================================================
// Output
// ============================================================================

struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn message(&self, text: &str) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Text => println!("{}", text),
            OutputFormat::Json => println!("{}", serde_json::json!({ "message": text })),
        }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn item<T: Serialize>(&self, value: &T, text: impl Fn(&T) -> String) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => self.json(value),
            OutputFormat::Text => {
                println!("{}", text(value));
                Ok(())
            }
        }
    }

    fn list<T: Serialize>(
        &self,
        items: &[T],
        empty: &str,
        line: impl Fn(&T) -> String,
    ) -> anyhow::Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(items);
        }
        if items.is_empty() {
            self.message(empty);
        }
        for item in items {
            println!("{}", line(item));
        }
        Ok(())
    }
}

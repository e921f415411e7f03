use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feature_registry::{
    api,
    config::Settings,
    db,
    models::User,
    sample, sharing,
    store::FeatureStore,
    templates::{TemplateDir, TemplateSet},
    tree_render, workspace,
};

#[derive(Parser)]
#[command(name = "featreg")]
#[command(about = "Declarative feature registration with hypermedia links and sharing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Build the registry and report configuration errors
    Check,
    /// Print the containment hierarchy of the feature classes
    Tree,
    /// Print every named route
    Routes,
    /// Print a workspace document
    Workspace {
        /// Username to project for; anonymous when omitted
        #[arg(short, long)]
        user: Option<String>,

        /// Project the owner's view (create, edit and share templates)
        #[arg(long)]
        owner: bool,

        /// Comma-separated model uids to limit the document to
        #[arg(short, long)]
        models: Option<String>,
    },
    /// Create a user, optionally adding them to groups
    AddUser {
        username: String,

        #[arg(long)]
        staff: bool,

        /// Group to join; created when missing. Repeatable.
        #[arg(short, long = "group")]
        groups: Vec<String>,
    },
    /// Grant the share permission to the configured groups and `group`
    EnableSharing {
        #[arg(short, long)]
        group: Option<String>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "feature_registry=debug,tower_http=debug".into()),
    );

    // stdout is reserved for command output
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(settings: &Settings) -> anyhow::Result<db::Database> {
    let db = match &settings.database {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(settings: Settings, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting feature registry on port {}", port);

    let registry = sample::registry(&settings.url_prefix)?;
    let db = open_database(&settings)?;
    sharing::enable_sharing(&db, &settings, None)?;

    let security = api::SecurityConfig::from_env();
    let app = match settings.template_dir.clone() {
        Some(dir) => {
            let state = api::AppState::new(registry, db, settings, TemplateDir::new(dir));
            api::create_router(state, security)
        }
        None => {
            let state = api::AppState::new(registry, db, settings, TemplateSet::new());
            api::create_router(state, security)
        }
    };

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Feature registry listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::from_env();

    match cli.command.unwrap_or(Commands::Serve { port: 3000 }) {
        Commands::Serve { port } => serve(settings, port).await?,
        Commands::Check => {
            let registry = sample::registry(&settings.url_prefix)?;
            let generic = registry.links().iter().filter(|l| l.is_generic()).count();
            println!(
                "{} feature classes, {} links ({} generic)",
                registry.len(),
                registry.links().len(),
                generic
            );
            for options in registry.models() {
                let links: Vec<&str> = registry.links_of(options).map(|l| l.title()).collect();
                println!("  {} [{}]: {}", options.model_uid(), options.slug(), links.join(", "));
                if options.is_collection() {
                    let children: Vec<String> = registry
                        .get_valid_children(options)?
                        .iter()
                        .map(|c| c.path())
                        .collect();
                    println!("    contains: {}", children.join(", "));
                }
            }
        }
        Commands::Tree => {
            let registry = sample::registry(&settings.url_prefix)?;
            print!("{}", tree_render::render_tree(&registry.containment_tree()));
        }
        Commands::Routes => {
            let registry = sample::registry(&settings.url_prefix)?;
            for (name, template) in registry.routes().iter() {
                println!("{:<40} {}", name, template);
            }
        }
        Commands::Workspace {
            user,
            owner,
            models,
        } => {
            let registry = sample::registry(&settings.url_prefix)?;
            let user = match user {
                Some(name) => {
                    let db = open_database(&settings)?;
                    db.get_user_by_name(&name)?
                        .ok_or_else(|| anyhow::anyhow!("No user named {}", name))?
                }
                None => User::anonymous(),
            };
            let models: Option<Vec<&str>> = models
                .as_deref()
                .map(|m| m.split(',').filter(|s| !s.is_empty()).collect());
            println!(
                "{}",
                workspace::workspace_json(&registry, &settings, &user, owner, models.as_deref())?
            );
        }
        Commands::AddUser {
            username,
            staff,
            groups,
        } => {
            let db = open_database(&settings)?;
            let user = db.create_user(&username, staff)?;
            for name in &groups {
                let group = db.get_or_create_group(name)?;
                db.add_user_to_group(user.id, group.id)?;
            }
            println!("Created user {} (id {})", user.username, user.id);
        }
        Commands::EnableSharing { group } => {
            let db = open_database(&settings)?;
            let permission = sharing::enable_sharing(&db, &settings, group.as_deref())?;
            println!("Share permission {} granted", permission);
        }
    }

    Ok(())
}

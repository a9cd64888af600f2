use anyhow::Context;
use clap::{Parser, Subcommand};
use lynk_backend_runtime::{telemetry, BackendServices};
use lynk_config::load as load_config;
use lynk_database::{MessageKind, MessageRepository, NewMessage};
use lynk_gateway::{create_router, GatewayState};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "lynk-backend")]
#[command(about = "Lynk messaging backend (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server (default)
    Serve,
    /// Seed the database with test users and a short conversation
    SeedData,
    /// Dump users and messages from the database
    DumpData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedData => seed_data().await,
        Commands::DumpData => dump_data().await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Lynk backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(services.db_pool.clone(), &config);
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(lynk_backend_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn seed_data() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let alice = services
        .authenticator
        .register_user(Some("Alice"))
        .await
        .context("failed to create seed user")?;
    let bob = services
        .authenticator
        .register_user(Some("Bob"))
        .await
        .context("failed to create seed user")?;

    let alice_session = services.authenticator.issue_session(alice.id).await?;
    let bob_session = services.authenticator.issue_session(bob.id).await?;

    let repo = MessageRepository::new(services.db_pool.clone());
    for (from, to, body) in [
        (&alice, &bob, "hey, are you around?"),
        (&bob, &alice, "yes, just got online"),
        (&alice, &bob, "great, sending the file in a second"),
    ] {
        repo.create(&NewMessage {
            from_user: from.public_id.clone(),
            to_user: to.public_id.clone(),
            kind: MessageKind::Text,
            body: body.to_string(),
            attachment_url: None,
        })
        .await
        .context("failed to seed message")?;
    }

    println!("Seeded two users with a three-message conversation");
    println!("  {} token: {}", alice.public_id, alice_session.token);
    println!("  {} token: {}", bob.public_id, bob_session.token);
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let users = sqlx::query("SELECT public_id, display_name, created_at FROM users ORDER BY id ASC")
        .fetch_all(&services.db_pool)
        .await
        .context("failed to fetch users")?;

    println!("=== USERS ===");
    if users.is_empty() {
        println!("No users found in database");
    } else {
        println!("{:<30} {:<20} {:<25}", "Public ID", "Display Name", "Created At");
        for user in users {
            let public_id: String = user.get("public_id");
            let display_name: Option<String> = user.get("display_name");
            let created_at: String = user.get("created_at");
            println!(
                "{:<30} {:<20} {:<25}",
                public_id,
                display_name.as_deref().unwrap_or("NULL"),
                created_at
            );
        }
    }

    let messages = sqlx::query(
        "SELECT public_id, from_user, to_user, kind, body, attachment_url, created_at
         FROM messages ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch messages")?;

    println!();
    println!("=== MESSAGES ===");
    if messages.is_empty() {
        println!("No messages found in database");
    } else {
        println!(
            "{:<30} {:<30} {:<30} {:<10} {:<25}",
            "ID", "From", "To", "Kind", "Created At"
        );
        for message in messages {
            let public_id: String = message.get("public_id");
            let from_user: String = message.get("from_user");
            let to_user: String = message.get("to_user");
            let kind: String = message.get("kind");
            let body: String = message.get("body");
            let attachment_url: Option<String> = message.get("attachment_url");
            let created_at: String = message.get("created_at");

            println!(
                "{:<30} {:<30} {:<30} {:<10} {:<25}",
                public_id, from_user, to_user, kind, created_at
            );
            if let Some(url) = attachment_url {
                println!("    attachment: {url}");
            } else {
                println!("    body: {body}");
            }
        }
    }

    Ok(())
}

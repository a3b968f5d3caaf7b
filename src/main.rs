use std::process::ExitCode;

use tracing::{error, info};

use groupvault::auth::hash_password_blocking;
use groupvault::config::AdminConfig;
use groupvault::file::FileStorage;
use groupvault::{AppState, Config, Database, NewUser, Role, UserRepository, WebServer};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = groupvault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        groupvault::logging::init_console_only(&config.logging.level);
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> groupvault::Result<()> {
    config.validate()?;
    info!("groupvault - group file storage");

    let db = Database::open(&config.database.path).await?;
    bootstrap_admin(&db, &config.admin).await?;

    let storage = FileStorage::new(&config.files.storage_path)?;
    info!("File storage initialized at: {}", config.files.storage_path);

    let app_state = AppState::new(
        db,
        storage,
        &config.web.jwt_secret,
        config.web.jwt_access_token_expiry_secs,
        config.web.jwt_refresh_token_expiry_days,
    )
    .with_max_request_body(config.files.max_request_body_bytes());

    let server = WebServer::new(&config.web, app_state)?;
    info!("Web server configured on {}", server.addr());
    server.run().await?;
    Ok(())
}

/// Create the configured admin account unless the username is taken.
async fn bootstrap_admin(db: &Database, admin: &AdminConfig) -> groupvault::Result<()> {
    let (Some(username), Some(password)) = (&admin.username, &admin.password) else {
        return Ok(());
    };

    let repo = UserRepository::new(db.pool());
    if repo.username_exists(username).await? {
        return Ok(());
    }

    let hash = hash_password_blocking(password.clone())
        .await
        .map_err(|e| groupvault::VaultError::Config(format!("admin password: {e}")))?;
    let user = repo
        .create(&NewUser::new(username, hash, username).with_role(Role::Admin))
        .await?;
    info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
    Ok(())
}

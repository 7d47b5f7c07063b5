use crate::{
    api,
    auth::{
        Argon2Verifier, AuthConfig, Authenticator, ClaimTypes, MemoryStore, PgStore, Rs256Codec,
        StoreProvider,
    },
    cli::telemetry,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSource {
    Postgres { dsn: String },
    UsersFile { path: PathBuf },
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub store: StoreSource,
    pub signing_key: PathBuf,
    pub key_id: String,
    pub issuer: String,
    pub audience: String,
    pub token_ttl_seconds: i64,
    pub call_timeout: Option<Duration>,
    pub claim_types: ClaimTypes,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key or principal store cannot be loaded, or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let key = tokio::fs::read(&args.signing_key)
        .await
        .with_context(|| format!("failed to read signing key {}", args.signing_key.display()))?;
    let codec = Rs256Codec::from_private_key_pem_or_der(
        &key,
        args.key_id,
        args.issuer,
        args.audience,
    )
    .context("invalid signing key")?;
    let jwks = codec.jwks();

    let stores: Arc<dyn StoreProvider> = match &args.store {
        StoreSource::Postgres { dsn } => Arc::new(PgStore::connect(dsn).await?),
        StoreSource::UsersFile { path } => Arc::new(MemoryStore::from_file(path)?),
    };

    let config = AuthConfig::new()
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_claim_types(args.claim_types)
        .with_call_timeout(args.call_timeout);

    let auth = Arc::new(Authenticator::new(
        config,
        stores,
        Arc::new(Argon2Verifier::default()),
        Arc::new(codec),
    ));

    let result = api::new(args.port, auth, jwks).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let store = match &args.store {
        StoreSource::Postgres { dsn } => format!("postgres {}", redact_dsn(dsn)),
        StoreSource::UsersFile { path } => format!("file {}", path.display()),
    };
    let call_timeout = args
        .call_timeout
        .map_or_else(|| "none".to_string(), |t| format!("{}s", t.as_secs()));
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("store", store),
        ("signing_key", args.signing_key.display().to_string()),
        ("key_id", args.key_id.clone()),
        ("issuer", args.issuer.clone()),
        ("audience", args.audience.clone()),
        ("token_ttl", format!("{}s", args.token_ttl_seconds)),
        ("call_timeout", call_timeout),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    let short_hash = short_commit(crate::GIT_COMMIT_HASH);
    BANNER.replace(
        "{VERSION}",
        &format!(" - {} - {}", env!("CARGO_PKG_VERSION"), short_hash),
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

const BANNER: &str = r"
  +---+---+
  |   |   |
  +---+---+  T E S S E R A {VERSION}
  |   |   |
  +---+---+";

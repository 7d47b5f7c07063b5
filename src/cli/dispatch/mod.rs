use crate::auth::ClaimTypes;
use crate::cli::actions::{hash_password, server, Action};
use crate::cli::commands;
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::server::NAME, sub)) => server_args(sub).map(Action::Server),
        Some((commands::hash_password::NAME, sub)) => {
            let password = sub
                .get_one::<String>("password")
                .cloned()
                .context("missing required argument: --password")?;
            Ok(Action::HashPassword(hash_password::Args {
                password: SecretString::from(password),
            }))
        }
        Some((other, _)) => Err(anyhow!("unknown subcommand: {other}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

fn server_args(matches: &clap::ArgMatches) -> Result<server::Args> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let store = match (
        matches.get_one::<String>("dsn"),
        matches.get_one::<String>("users-file"),
    ) {
        (Some(dsn), None) => server::StoreSource::Postgres { dsn: dsn.clone() },
        (None, Some(path)) => server::StoreSource::UsersFile {
            path: PathBuf::from(path),
        },
        _ => return Err(anyhow!("exactly one of --dsn or --users-file is required")),
    };

    let required = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .cloned()
            .with_context(|| format!("missing required argument: --{name}"))
    };

    let call_timeout = matches
        .get_one::<u64>("call-timeout")
        .copied()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    Ok(server::Args {
        port,
        store,
        signing_key: PathBuf::from(required("signing-key")?),
        key_id: required("key-id")?,
        issuer: required("issuer")?,
        audience: required("audience")?,
        token_ttl_seconds: matches.get_one::<i64>("token-ttl").copied().unwrap_or(3600),
        call_timeout,
        claim_types: ClaimTypes {
            id: required("claim-type-id")?,
            username: required("claim-type-username")?,
            email: required("claim-type-email")?,
            stamp: required("claim-type-stamp")?,
            role: required("claim-type-role")?,
        },
    })
}

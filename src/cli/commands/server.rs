use clap::{Arg, ArgGroup, Command};

use crate::auth::config::MAX_TOKEN_TTL_SECONDS;

pub const NAME: &str = "server";

#[must_use]
pub fn command() -> Command {
    Command::new(NAME)
        .about("Serve the token endpoints over HTTP")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TESSERA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("PostgreSQL connection string for the principal store")
                .env("TESSERA_DSN"),
        )
        .arg(
            Arg::new("users-file")
                .long("users-file")
                .help("JSON file seeding an in-memory principal store")
                .env("TESSERA_USERS_FILE"),
        )
        .group(
            ArgGroup::new("store")
                .args(["dsn", "users-file"])
                .required(true)
                .multiple(false),
        )
        .arg(
            Arg::new("signing-key")
                .long("signing-key")
                .help("Path to the RSA private key (PEM or DER) tokens are signed with")
                .env("TESSERA_SIGNING_KEY")
                .required(true),
        )
        .arg(
            Arg::new("key-id")
                .long("key-id")
                .help("Key id published in token headers and the JWK set")
                .default_value("tessera-1")
                .env("TESSERA_KEY_ID"),
        )
        .arg(
            Arg::new("issuer")
                .long("issuer")
                .help("Token issuer (iss)")
                .env("TESSERA_ISSUER")
                .required(true),
        )
        .arg(
            Arg::new("audience")
                .long("audience")
                .help("Token audience (aud)")
                .env("TESSERA_AUDIENCE")
                .required(true),
        )
        .arg(
            Arg::new("token-ttl")
                .long("token-ttl")
                .help("Token lifetime in seconds")
                .default_value("3600")
                .env("TESSERA_TOKEN_TTL")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new("call-timeout")
                .long("call-timeout")
                .help("Deadline in seconds for each authenticate, refresh or validate call (0 disables)")
                .default_value("10")
                .env("TESSERA_CALL_TIMEOUT")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("claim-type-id")
                .long("claim-type-id")
                .help("Claim type carrying the principal id")
                .default_value("sub")
                .env("TESSERA_CLAIM_TYPE_ID"),
        )
        .arg(
            Arg::new("claim-type-username")
                .long("claim-type-username")
                .help("Claim type carrying the username")
                .default_value("name")
                .env("TESSERA_CLAIM_TYPE_USERNAME"),
        )
        .arg(
            Arg::new("claim-type-email")
                .long("claim-type-email")
                .help("Claim type carrying the email")
                .default_value("email")
                .env("TESSERA_CLAIM_TYPE_EMAIL"),
        )
        .arg(
            Arg::new("claim-type-stamp")
                .long("claim-type-stamp")
                .help("Claim type carrying the stamp suffix")
                .default_value("stamp")
                .env("TESSERA_CLAIM_TYPE_STAMP"),
        )
        .arg(
            Arg::new("claim-type-role")
                .long("claim-type-role")
                .help("Claim type carrying each role")
                .default_value("role")
                .env("TESSERA_CLAIM_TYPE_ROLE"),
        )
}

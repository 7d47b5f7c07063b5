use clap::{Arg, Command};

pub const NAME: &str = "hash-password";

#[must_use]
pub fn command() -> Command {
    Command::new(NAME)
        .about("Print an Argon2id PHC hash for a password")
        .arg(
            Arg::new("password")
                .long("password")
                .help("Password to hash")
                .env("TESSERA_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
}

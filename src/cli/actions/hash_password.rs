use crate::auth::Argon2Verifier;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub password: SecretString,
}

/// Print a PHC string suitable for a principal's `password_hash`.
/// # Errors
/// Returns an error if hashing fails.
pub fn execute(args: &Args) -> Result<()> {
    let hash = Argon2Verifier::default().hash(&args.password)?;
    println!("{hash}");
    Ok(())
}

use std::io::BufRead;

use anyhow::{bail, Context};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "hash-password",
    about = "Print an Argon2 hash for use as auth.password_hash"
)]
struct Opt {
    /// The password to hash. Read from the first line of stdin when omitted.
    password: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let password = match opt.password {
        Some(password) => password,
        None => std::io::stdin()
            .lock()
            .lines()
            .next()
            .transpose()
            .context("read password from stdin")?
            .unwrap_or_default(),
    };
    if password.is_empty() {
        bail!("refusing to hash an empty password");
    }

    let hash = soon_auth_simple::hash_password(&password)
        .map_err(|e| anyhow::anyhow!("hash password: {e}"))?;
    println!("{hash}");
    Ok(())
}

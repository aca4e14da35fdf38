use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use hushzone_api::auth::passwords::PasswordService;
use hushzone_api::auth::validate;

#[derive(Parser, Debug)]
#[command(name = "create_account", about = "Provision a Hushzone account")]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this account.
    #[arg(long)]
    password: String,

    /// Optional display username.
    #[arg(long)]
    username: Option<String>,

    /// Create the account with the email-verified flag cleared, blocking
    /// password sign-in until an operator flips it.
    #[arg(long)]
    unverified: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();

    if !validate::valid_email(&email) {
        writeln!(io::stderr(), "error: '{email}' is not a valid email address")?;
        std::process::exit(1);
    }

    if !validate::strong_password(&args.password) {
        writeln!(
            io::stderr(),
            "error: password must be at least 8 characters with lower, upper, digit and symbol"
        )?;
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let password_service = PasswordService::new()
        .map_err(|err| io::Error::other(format!("argon2 init failed: {err}")))?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| io::Error::other(format!("password hash failed: {err}")))?;

    let result = sqlx::query_scalar::<_, uuid::Uuid>(
        "INSERT INTO users (email, username, password_hash, email_verified) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&email)
    .bind(args.username.as_deref())
    .bind(&password_hash)
    .bind(!args.unverified)
    .fetch_one(&pool)
    .await;

    match result {
        Ok(account_id) => {
            println!("Created account '{email}' with id {account_id}");
            Ok(())
        }
        Err(err) => {
            writeln!(io::stderr(), "error: failed to create account: {err}")?;
            std::process::exit(1);
        }
    }
}

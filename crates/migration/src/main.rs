use config::{Config, Environment, File};
use sea_orm_migration::prelude::*;
use std::env;

/// Resolves the database URL the same way the server does: `config.yaml`
/// first, then `DATABASE_URL` from the environment.
fn configured_database_url() -> Option<String> {
    Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()
        .ok()?
        .get_string("database_url")
        .ok()
}

#[tokio::main]
async fn main() {
    // The migration CLI only reads DATABASE_URL (or -u)
    if env::var("DATABASE_URL").is_err() {
        match configured_database_url() {
            Some(url) => env::set_var("DATABASE_URL", url),
            None => eprintln!("No database_url in config.yaml; pass -u or set DATABASE_URL"),
        }
    }
    cli::run_cli(migration::Migrator).await;
}

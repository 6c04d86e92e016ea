use clap::Parser;
use ileq::changelog::Changelog;
use ileq::cli;
use ileq::db;
use ileq::migrations;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // install global collector configured based on RUST_LOG env var.
    tracing_subscriber::fmt::init();

    let cli = cli::CLI::parse();

    let db = db::conn(db::Config {
        app_name: Some(&cli.app_name),
        credentials: cli.credentials()?,
        database: &cli.database,
        host: &cli.host,
        port: cli.port,
    })
    .await?;

    match cli.command {
        cli::Command::Run => migrations::run(&db).await?,
        cli::Command::Status => {
            for entry in Changelog::new(&db).entries().await? {
                println!(
                    "{}\t{}\t{}",
                    entry.timestamp.try_to_rfc3339_string()?,
                    entry.change_id,
                    entry.author
                )
            }
        }
    }

    Ok(())
}

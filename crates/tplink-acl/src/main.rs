mod cli;
mod handlers;
mod utils;

use clap::Parser;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pure JSON
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Command::Version) {
        println!("tplink-acl {}", env!("CARGO_PKG_VERSION"));
        println!("tplink-acl-core {}", tplink_acl_core::VERSION);
        return;
    }

    let client = match utils::build_client(&cli) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Status => handlers::handle_status(&client).await,
        Command::Blocked => handlers::handle_blocked(&client).await,
        Command::Connected => handlers::handle_connected(&client).await,
        Command::Block { mac } => handlers::handle_block(&client, &mac).await,
        Command::Unblock { mac } => handlers::handle_unblock(&client, &mac).await,
        Command::Led { state } => handlers::handle_led(&client, state).await,
        Command::Logout => handlers::handle_logout(&client).await,
        Command::Version => {}
    }
}

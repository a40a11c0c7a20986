use std::io::IsTerminal;

use tplink_acl_core::{Error, RouterClient, RouterConfig};

use crate::cli::Cli;

/// Environment variable holding the router admin password.
pub const PASSWORD_ENV: &str = "TPLINK_PASSWORD";

/// Where the admin password comes from.
#[derive(Debug, PartialEq, Eq)]
pub enum PasswordSource {
    /// `TPLINK_PASSWORD` was set and non-empty.
    Env(String),
    /// `--password-stdin`: first line of standard input.
    Stdin,
    /// Hidden prompt on the terminal.
    Prompt,
}

impl PasswordSource {
    /// Picks a source: the environment wins over `--password-stdin`, and
    /// prompting needs a terminal.
    pub fn choose(
        env_password: Option<String>,
        password_stdin: bool,
        interactive: bool,
    ) -> Result<Self, String> {
        match env_password.filter(|p| !p.is_empty()) {
            Some(password) => Ok(PasswordSource::Env(password)),
            None if password_stdin => Ok(PasswordSource::Stdin),
            None if interactive => Ok(PasswordSource::Prompt),
            None => Err(format!(
                "No admin password. Set {} or pass --password-stdin when input is piped.",
                PASSWORD_ENV
            )),
        }
    }

    pub fn read(self, host: &str) -> Result<String, String> {
        match self {
            PasswordSource::Env(password) => Ok(password),
            PasswordSource::Stdin => {
                let mut line = String::new();
                std::io::stdin()
                    .read_line(&mut line)
                    .map_err(|e| format!("Could not read the password from stdin: {}", e))?;
                Ok(strip_line_ending(&line).to_string())
            }
            PasswordSource::Prompt => {
                eprint!("Admin password for {}: ", host);
                rpassword::read_password().map_err(|e| format!("Could not read the password: {}", e))
            }
        }
    }
}

/// Drops the newline `read_line` keeps; spaces belong to the password.
fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Build a client from CLI options, reading the admin password.
pub fn build_client(cli: &Cli) -> Result<RouterClient, String> {
    let source = PasswordSource::choose(
        std::env::var(PASSWORD_ENV).ok(),
        cli.password_stdin,
        std::io::stdin().is_terminal(),
    )?;
    let password = source.read(&cli.host)?;

    let config = RouterConfig::new(cli.host.clone(), password).with_timeout(cli.timeout);
    Ok(RouterClient::new(config))
}

/// Print a value as a single line of JSON.
pub fn print_json(value: &serde_json::Value) {
    println!("{}", value);
}

/// Print an error and exit with status 1.
pub fn exit_with_error(context: &str, err: &Error) -> ! {
    tracing::error!(error = %err, "{}", context);
    eprintln!("Error: {}: {}", context, err);
    if err.is_authentication() {
        eprintln!("Hint: check the router admin password ({}).", PASSWORD_ENV);
    }
    std::process::exit(1);
}

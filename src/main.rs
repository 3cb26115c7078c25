//! OISP CLI - command-line client for the Open IoT Service Platform

use console::{style, Term};
use dialoguer::{Input, Password};
use oisp_client::cli::{Cli, Commands};
use oisp_client::{
    logging, Account, Client, ClientConfig, Config, DeviceFilter, NewDevice, OispError, Result,
};
use tracing::debug;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

/// Main application entry point
fn run() -> i32 {
    let cli = Cli::parse_args();
    logging::init_tracing(cli.verbose);

    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            let _ = Term::stderr().write_line(&format!("{} {err}", style("Error:").red().bold()));
            err.exit_code()
        }
    }
}

fn out(line: &str) -> Result<()> {
    Term::stdout().write_line(line)?;
    Ok(())
}

fn prompt_error(err: dialoguer::Error) -> OispError {
    OispError::InvalidArgument(format!("prompt failed: {err}"))
}

/// Execute the requested command
fn execute(cli: Cli) -> Result<()> {
    debug!(version = env!("CARGO_PKG_VERSION"), "oisp cli starting");

    let mut config = Config::load_or_default()?;
    let mut overrides = ClientConfig::default();
    if let Some(api_url) = cli.api_url {
        overrides.api_url = api_url;
    }
    overrides.verify_certs = !cli.insecure;
    config.client.merge(&overrides);

    match cli.command {
        Commands::Health => handle_health(config.client),
        Commands::Login { username, password } => handle_login(config, username, password),
        Commands::Logout => handle_logout(config),
        Commands::Whoami => handle_whoami(&config),
        Commands::Accounts => handle_accounts(&config),
        Commands::Devices {
            account,
            status,
            limit,
        } => handle_devices(&config, &account, status, limit),
        Commands::CreateDevice {
            account,
            device_id,
            name,
            gateway_id,
            tags,
        } => handle_create_device(&config, &account, device_id, name, gateway_id, tags),
        Commands::DeleteDevice { account, device_id } => {
            handle_delete_device(&config, &account, &device_id)
        }
        Commands::Activate {
            account,
            device_id,
            code,
        } => handle_activate(&config, &account, &device_id, code.as_deref()),
        Commands::Catalog { account, full } => handle_catalog(&config, &account, full),
        Commands::Version => handle_version(),
    }
}

/// Build a session from the saved user token
fn session(config: &Config) -> Result<Client> {
    if !config.auth.is_authenticated() {
        return Err(OispError::Authentication(
            "not logged in, run 'oisp login' first".to_string(),
        ));
    }
    if config.auth.is_expired() {
        return Err(OispError::Authentication(
            "saved token expired, run 'oisp login' again".to_string(),
        ));
    }
    Client::with_token(config.client.clone(), &config.auth.token)
}

/// Find an account of the session by id or name
fn find_account(client: &Client, key: &str) -> Result<Account> {
    client
        .get_accounts()?
        .iter()
        .find(|a| a.id == key || a.name == key)
        .cloned()
        .ok_or_else(|| OispError::InvalidArgument(format!("no account with id or name '{key}'")))
}

/// Handle health command
fn handle_health(config: ClientConfig) -> Result<()> {
    let mut client = Client::new(config)?;
    let info = client.get_server_info()?;
    let healthy = info.is_healthy.unwrap_or(false);
    out(&format!(
        "{} {} ({})",
        if healthy {
            style("✓").green()
        } else {
            style("✗").red()
        },
        info.name.as_deref().unwrap_or("unknown service"),
        client.config().api_url
    ))?;
    if let Some(build) = &info.build {
        out(&format!("  build: {build}"))?;
    }
    if let Some(date) = &info.date {
        out(&format!("  date: {date}"))?;
    }
    Ok(())
}

/// Handle login command
fn handle_login(mut config: Config, username: Option<String>, password: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(prompt_error)?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .map_err(prompt_error)?,
    };

    let mut client = Client::new(config.client.clone())?;
    client.auth(&username, &password)?;
    let token = client.get_user_token(None)?;

    config.auth.username = username;
    config.auth.token = token.value;
    config.save()?;

    out(&format!(
        "{} Logged in as {}",
        style("✓").green(),
        config.auth.username
    ))
}

/// Handle logout command
fn handle_logout(mut config: Config) -> Result<()> {
    config.auth.clear();
    config.save()?;
    out(&format!("{} Logged out", style("✓").green()))
}

/// Handle whoami command
fn handle_whoami(config: &Config) -> Result<()> {
    let mut client = session(config)?;
    let user = client.get_user(None)?;
    out(&format!(
        "{} ({})",
        user.email.as_deref().unwrap_or(&config.auth.username),
        user.user_id
    ))?;
    if let Some(token) = client.user_token() {
        out(&format!("  token expires: {}", token.expires_at))?;
    }
    Ok(())
}

/// Handle accounts command
fn handle_accounts(config: &Config) -> Result<()> {
    let client = session(config)?;
    for account in client.get_accounts()? {
        out(&format!(
            "{}  {}  {}",
            style(&account.id).dim(),
            account.name,
            account.role
        ))?;
    }
    Ok(())
}

/// Handle devices command
fn handle_devices(
    config: &Config,
    account: &str,
    status: Option<String>,
    limit: Option<u32>,
) -> Result<()> {
    let mut client = session(config)?;
    let account = find_account(&client, account)?;
    let filter = DeviceFilter {
        status,
        limit,
        ..DeviceFilter::default()
    };
    for device in account.get_devices(&mut client, &filter)? {
        out(&format!(
            "{}  {}  {}",
            device.device_id,
            device.name.as_deref().unwrap_or("-"),
            device.status.as_deref().unwrap_or("-")
        ))?;
    }
    Ok(())
}

/// Handle create-device command
fn handle_create_device(
    config: &Config,
    account: &str,
    device_id: String,
    name: String,
    gateway_id: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let mut client = session(config)?;
    let account = find_account(&client, account)?;
    let mut new = NewDevice::new(device_id, name);
    if let Some(gateway_id) = gateway_id {
        new.gateway_id = gateway_id;
    }
    new.tags = tags;

    let device = account.create_device(&mut client, &new)?;
    out(&format!(
        "{} Created device {} in {}",
        style("✓").green(),
        device.device_id,
        account.name
    ))
}

/// Handle delete-device command
fn handle_delete_device(config: &Config, account: &str, device_id: &str) -> Result<()> {
    let mut client = session(config)?;
    let account = find_account(&client, account)?;
    let device = account.get_device(&mut client, device_id)?;
    device.delete(&mut client)?;
    out(&format!("{} Deleted device {device_id}", style("✓").green()))
}

/// Handle activate command
fn handle_activate(config: &Config, account: &str, device_id: &str, code: Option<&str>) -> Result<()> {
    let mut client = session(config)?;
    let account = find_account(&client, account)?;
    let mut device = account.get_device(&mut client, device_id)?;
    let token = device.activate(&mut client, code)?;
    out(&format!("{} Activated device {device_id}", style("✓").green()))?;
    out(&token)
}

/// Handle catalog command
fn handle_catalog(config: &Config, account: &str, full: bool) -> Result<()> {
    let mut client = session(config)?;
    let account = find_account(&client, account)?;
    for component_type in account.get_component_types_catalog(&mut client, full)? {
        let mut line = component_type.id.clone();
        if let Some(data_type) = &component_type.data_type {
            line.push_str(&format!("  {data_type}"));
        }
        if let Some(unit) = &component_type.measure_unit {
            line.push_str(&format!("  [{unit}]"));
        }
        out(&line)?;
    }
    Ok(())
}

/// Handle version command
fn handle_version() -> Result<()> {
    out(&format!("OISP CLI v{}", env!("CARGO_PKG_VERSION")))
}

//! Command parsing and the handlers behind each subcommand.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use enkaji_core::{
    AdminConsole, ApiError, Config, Credential, GuardDecision, LoginCredentials,
    PaginationParams, Resource, LOGIN_PATH,
};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Login {
        email: Option<String>,
    },
    Logout,
    WhoAmI,
    Stats,
    List {
        resource: Resource,
        page: Option<u32>,
        search: Option<String>,
    },
    Get {
        resource: Resource,
        id: String,
    },
    Delete {
        resource: Resource,
        id: String,
    },
    SetOrderStatus {
        id: String,
        status: String,
    },
    Visit {
        path: String,
    },
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let Some(name) = args.next() else {
            return Ok(Command::Help);
        };

        let command = match name {
            "help" | "-h" | "--help" => Command::Help,
            "login" => Command::Login {
                email: args.next().map(str::to_string),
            },
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "stats" | "dashboard" => Command::Stats,
            "list" => {
                let resource = parse_resource(args.next())?;
                let page = args
                    .next()
                    .map(|p| p.parse::<u32>().context("Page must be a positive number"))
                    .transpose()?;
                let search = args.next().map(str::to_string);
                Command::List {
                    resource,
                    page,
                    search,
                }
            }
            "get" | "delete" => {
                let resource = parse_resource(args.next())?;
                let id = required(args.next(), "id")?;
                if name == "get" {
                    Command::Get { resource, id }
                } else {
                    Command::Delete { resource, id }
                }
            }
            "order-status" => Command::SetOrderStatus {
                id: required(args.next(), "order id")?,
                status: required(args.next(), "status")?,
            },
            "visit" => Command::Visit {
                path: required(args.next(), "path")?,
            },
            other => bail!("Unknown command: {}", other),
        };

        Ok(command)
    }
}

fn parse_resource(arg: Option<&str>) -> Result<Resource> {
    let names: Vec<&str> = Resource::ALL.iter().map(Resource::name).collect();
    let arg = arg.ok_or_else(|| anyhow!("Missing resource (one of: {})", names.join(", ")))?;
    Resource::parse(arg)
        .ok_or_else(|| anyhow!("Unknown resource '{}' (one of: {})", arg, names.join(", ")))
}

fn required(arg: Option<&str>, what: &str) -> Result<String> {
    arg.map(str::to_string)
        .ok_or_else(|| anyhow!("Missing {}", what))
}

pub fn print_usage() {
    println!("Usage: enkaji-admin <command> [args]");
    println!();
    println!("Commands:");
    println!("  login [email]                    Sign in as an administrator");
    println!("  logout                           Sign out and forget the session");
    println!("  whoami                           Show the signed-in administrator");
    println!("  stats                            Dashboard counters");
    println!("  list <resource> [page] [search]  List products, orders, users or reviews");
    println!("  get <resource> <id>              Show a single record");
    println!("  delete <resource> <id>           Delete a record");
    println!("  order-status <id> <status>       Change an order's status");
    println!("  visit <path>                     Check whether a view is reachable");
    println!();
    println!("Environment:");
    println!("  ENKAJI_API_URL     Backend base URL");
    println!("  ENKAJI_EMAIL       Default login email");
    println!("  ENKAJI_PASSWORD    Login password (skips the prompt)");
    println!("  RUST_LOG           Log filter, e.g. enkaji_core=debug");
}

pub async fn run(console: &AdminConsole, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Help => {
            print_usage();
            Ok(())
        }
        Command::Login { email } => login(console, config, email).await,
        Command::Logout => {
            console.logout().await;
            println!("Signed out.");
            Ok(())
        }
        Command::WhoAmI => {
            whoami(console);
            Ok(())
        }
        Command::Stats => {
            if !enter(console, "/dashboard") {
                return Ok(());
            }
            let stats = console.admin().dashboard_stats().await.map_err(api_failure)?;
            println!("Users:              {}", stats.total_users);
            println!("Products:           {}", stats.total_products);
            println!("  out of stock:     {}", stats.out_of_stock_products);
            println!("Orders:             {}", stats.total_orders);
            println!("  pending:          {}", stats.pending_orders);
            println!("  completed:        {}", stats.completed_orders);
            println!("  cancelled:        {}", stats.cancelled_orders);
            println!("Revenue:            {:.2}", stats.total_revenue);
            Ok(())
        }
        Command::List {
            resource,
            page,
            search,
        } => {
            if !enter(console, &resource.view_path()) {
                return Ok(());
            }
            let params = PaginationParams {
                page,
                search,
                ..Default::default()
            };
            let page = console
                .admin()
                .list(resource, &params)
                .await
                .map_err(api_failure)?;
            for record in &page.data {
                println!("{}", summarize(record));
            }
            println!(
                "-- page {} of {} ({} {})",
                page.page,
                page.total_pages.max(1),
                page.total,
                resource.name()
            );
            Ok(())
        }
        Command::Get { resource, id } => {
            if !enter(console, &format!("{}/{}", resource.view_path(), id)) {
                return Ok(());
            }
            let record = console
                .admin()
                .get(resource, &id)
                .await
                .map_err(api_failure)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Delete { resource, id } => {
            if !enter(console, &resource.view_path()) {
                return Ok(());
            }
            console
                .admin()
                .delete(resource, &id)
                .await
                .map_err(api_failure)?;
            println!("Deleted {} {}", resource.name(), id);
            Ok(())
        }
        Command::SetOrderStatus { id, status } => {
            if !enter(console, &format!("{}/{}", Resource::Orders.view_path(), id)) {
                return Ok(());
            }
            console
                .admin()
                .update_order_status(&id, &status)
                .await
                .map_err(api_failure)?;
            println!("Order {} is now {}", id, status);
            Ok(())
        }
        Command::Visit { path } => {
            match console.guard().visit(&path) {
                GuardDecision::Render => println!("{} renders", path),
                GuardDecision::Redirect(to) => println!("{} redirects to {}", path, to),
            }
            Ok(())
        }
    }
}

/// Run the route guard for a view. Prints the login hint when it redirects.
fn enter(console: &AdminConsole, path: &str) -> bool {
    match console.guard().visit(path) {
        GuardDecision::Render => true,
        GuardDecision::Redirect(to) => {
            debug!(from = %path, to = %to, "Guard redirected");
            if to == LOGIN_PATH {
                eprintln!("Not signed in. Run `enkaji-admin login` first.");
            }
            false
        }
    }
}

fn api_failure(err: ApiError) -> anyhow::Error {
    if err.is_session_expired() {
        anyhow!("Session expired. Please log in again with `enkaji-admin login`.")
    } else {
        anyhow::Error::new(err)
    }
}

/// One line per record: id plus whichever label field the resource has.
fn summarize(record: &Value) -> String {
    let id = record
        .get("_id")
        .or_else(|| record.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("?");
    let label = ["name", "fullName", "orderNumber", "title", "emailAddress", "status"]
        .iter()
        .find_map(|key| record.get(*key).and_then(Value::as_str))
        .unwrap_or("");
    format!("{:<26} {}", id, label)
}

async fn login(console: &AdminConsole, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email
        .or_else(|| std::env::var("ENKAJI_EMAIL").ok())
        .filter(|e| !e.trim().is_empty())
    {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };

    let password = resolve_password()?;

    match console
        .login(&LoginCredentials::new(email.clone(), password))
        .await
    {
        Ok(landing) => {
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }

            let session = console.session();
            let name = session
                .identity()
                .map(|identity| identity.display_name().to_string())
                .unwrap_or_default();
            println!("Welcome, {}.", name);
            println!("Landing on {}", landing);
            Ok(())
        }
        Err(e) => Err(anyhow!(e)),
    }
}

/// `ENKAJI_PASSWORD` when set, otherwise a hidden prompt.
fn resolve_password() -> Result<String> {
    if let Ok(password) = std::env::var("ENKAJI_PASSWORD") {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last_email) {
        (false, _) => Ok(input.to_string()),
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Email is required"),
    }
}

fn whoami(console: &AdminConsole) {
    let session = console.session();
    let Some(identity) = session.identity() else {
        println!("Not signed in.");
        return;
    };

    println!("{} <{}>", identity.display_name(), identity.email_address);
    let carrier = match session.credential() {
        Some(Credential::Bearer { .. }) => "bearer token",
        Some(Credential::Cookie) => "session cookie",
        None => "none",
    };
    println!("Credential: {}", carrier);
    if let Some(at) = session.established_at() {
        println!("Signed in:  {}", at.format("%Y-%m-%d %H:%M UTC"));
    }
}

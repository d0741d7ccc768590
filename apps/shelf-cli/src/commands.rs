//! Subcommand implementations.
//!
//! Catalog commands read from the live view rather than querying the store
//! directly, so `list` prints exactly what a screen would render.

use std::time::Duration;

use dialoguer::{Confirm, Password};
use serde::Serialize;
use tokio::sync::watch;

use shelf_client::{CatalogView, ClientConfig, RegisterOutcome, ShelfClient};
use shelf_core::{ErrorKind, NewProduct, Product, ProductPatch};

use crate::error::{CliError, CliResult};
use crate::Commands;

/// How long to wait for the first snapshot.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn dispatch(client: &ShelfClient, command: Commands, json: bool) -> CliResult<()> {
    match command {
        Commands::Register { email, password } => register(client, &email, password, json).await,
        Commands::Login { email, password } => login(client, &email, password, json).await,
        Commands::Logout => {
            client.session().logout().await;
            println!("Signed out.");
            Ok(())
        }
        Commands::Whoami => whoami(client, json),
        Commands::Add {
            name,
            price,
            description,
        } => {
            let product = client
                .catalog()
                .add(&NewProduct::new(name, price, description))
                .await?;
            print_product(&product, json)
        }
        Commands::List => list(client, json).await,
        Commands::Show { id } => {
            let product = client.catalog().get(&id).await?;
            print_product(&product, json)
        }
        Commands::Edit {
            id,
            name,
            price,
            description,
        } => edit(client, &id, name, price, description).await,
        Commands::Delete { id, yes } => delete(client, &id, yes).await,
        Commands::Watch => watch_catalog(client, json).await,
        Commands::Config => show_config(client.config(), json),
    }
}

// =============================================================================
// Session
// =============================================================================

async fn register(
    client: &ShelfClient,
    email: &str,
    password: Option<String>,
    json: bool,
) -> CliResult<()> {
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()?,
    };

    match client.session().register(email, &password).await? {
        RegisterOutcome::SignedIn(session) => {
            if json {
                return print_json(&session);
            }
            println!("Account created. Signed in as {} ({}).", session.email, session.uid);
        }
        RegisterOutcome::AccountCreated { user_id } => {
            if json {
                return print_json(&serde_json::json!({ "userId": user_id }));
            }
            println!("Account created. Sign in with `shelf login {email}`.");
        }
    }
    Ok(())
}

async fn login(
    client: &ShelfClient,
    email: &str,
    password: Option<String>,
    json: bool,
) -> CliResult<()> {
    let password = match password {
        Some(password) => password,
        None => Password::new().with_prompt("Password").interact()?,
    };

    let session = client.session().login(email, &password).await?;
    if json {
        return print_json(&session);
    }
    println!("Signed in as {}.", session.email);
    Ok(())
}

fn whoami(client: &ShelfClient, json: bool) -> CliResult<()> {
    let state = client.session().state();
    if json {
        return print_json(&state);
    }

    match state.session() {
        Some(session) => println!("{} ({})", session.email, session.uid),
        None => println!("Not signed in."),
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

async fn list(client: &ShelfClient, json: bool) -> CliResult<()> {
    let mut rx = client.catalog().watch();
    let view = settled(&mut rx).await?;

    if let Some(error) = view.error {
        return Err(error.into());
    }
    if json {
        return print_json(&view.products);
    }

    if view.products.is_empty() {
        println!("No products yet.");
    }
    for product in &view.products {
        println!("{}", product_line(product));
    }
    Ok(())
}

async fn edit(
    client: &ShelfClient,
    id: &str,
    name: Option<String>,
    price: Option<String>,
    description: Option<String>,
) -> CliResult<()> {
    let mut patch = ProductPatch::default();
    if let Some(name) = name {
        patch = patch.name(name);
    }
    if let Some(price) = price {
        patch = patch.price(price);
    }
    if let Some(description) = description {
        patch = patch.description(description);
    }

    if patch.is_empty() {
        return Err(CliError::invalid_input(
            "nothing to change; pass --name, --price or --description",
        ));
    }

    client.catalog().update(id, &patch).await?;
    println!("Updated {id}.");
    Ok(())
}

async fn delete(client: &ShelfClient, id: &str, yes: bool) -> CliResult<()> {
    let product = client.catalog().get(id).await?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete \"{}\"?", product.name))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    client.catalog().remove(id).await?;
    println!("Deleted \"{}\".", product.name);
    Ok(())
}

async fn watch_catalog(client: &ShelfClient, json: bool) -> CliResult<()> {
    let mut rx = client.catalog().watch();
    if rx.borrow().owner_id.is_none() {
        return Err(CliError::new(ErrorKind::Unauthenticated, "sign in to watch"));
    }

    loop {
        let view = rx.borrow_and_update().clone();
        if !view.loading {
            print_view(&view, json)?;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                return Ok(());
            }
        }
    }
}

/// Waits for the first snapshot (or error) of the current owner.
async fn settled(rx: &mut watch::Receiver<CatalogView>) -> CliResult<CatalogView> {
    if rx.borrow().owner_id.is_none() {
        return Err(CliError::new(ErrorKind::Unauthenticated, "sign in first"));
    }

    let view = tokio::time::timeout(SNAPSHOT_TIMEOUT, rx.wait_for(|v| !v.loading))
        .await
        .map_err(|_| CliError::new(ErrorKind::Unavailable, "timed out waiting for products"))?
        .map_err(|_| CliError::new(ErrorKind::Internal, "catalog closed"))?
        .clone();

    Ok(view)
}

// =============================================================================
// Config
// =============================================================================

pub fn show_config(config: &ClientConfig, json: bool) -> CliResult<()> {
    if json {
        return print_json(config);
    }

    let database = if config.is_in_memory() {
        "(in memory)".to_string()
    } else {
        config
            .database_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|e| format!("<{e}>"))
    };
    let storage = config
        .storage_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|e| format!("<{e}>"));

    println!("namespace:       {}", config.namespace());
    println!("database:        {database}");
    println!("session storage: {storage}");
    println!("auto-login:      {}", config.session.auto_login_after_register);
    println!(
        "hashing:         argon2id m={}KiB t={} p={}",
        config.hashing.memory_kib, config.hashing.iterations, config.hashing.parallelism
    );
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn product_line(product: &Product) -> String {
    format!(
        "{}  {:<30}  {:>10.2}  {}",
        product.id, product.name, product.price, product.description
    )
}

fn print_product(product: &Product, json: bool) -> CliResult<()> {
    if json {
        return print_json(product);
    }

    println!("id:          {}", product.id);
    println!("name:        {}", product.name);
    println!("price:       {:.2}", product.price);
    println!("description: {}", product.description);
    println!("created:     {}", product.created_at.to_rfc3339());
    println!("updated:     {}", product.updated_at.to_rfc3339());
    Ok(())
}

fn print_view(view: &CatalogView, json: bool) -> CliResult<()> {
    if json {
        return print_json(view);
    }

    println!("--- {} product(s)", view.products.len());
    for product in &view.products {
        println!("{}", product_line(product));
    }
    if let Some(error) = &view.error {
        println!("!!! {} ({})", error.message, error.kind);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(ErrorKind::Internal, e.to_string()))?;
    println!("{text}");
    Ok(())
}

//! Account tooling command handlers

use std::io::BufRead;

use crate::config::Config;
use crate::domain::User;
use crate::forms::CreateUserForm;
use crate::services::{AccountError, AccountService};
use crate::state::SharedState;

async fn accounts(config: &Config) -> anyhow::Result<SharedState> {
    SharedState::new(config.clone()).await
}

fn print_user(user: &User) {
    println!("{} <{}>", user.username, user.email);
    println!(
        "  ID: {} | Name: {} | Status: {}",
        user.id,
        user.full_name(),
        user.status
    );
    println!(
        "  Joined: {} | Last login: {}",
        user.date_joined,
        user.last_login.as_deref().unwrap_or("never")
    );
}

pub async fn cmd_users_list(config: &Config, include_inactive: bool) -> anyhow::Result<()> {
    let state = accounts(config).await?;
    let users = state.accounts.list_users(include_inactive).await?;

    if users.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    println!("Accounts ({} total)", users.len());
    println!("{:-<60}", "");
    for user in &users {
        print_user(user);
    }

    Ok(())
}

pub async fn cmd_users_show(config: &Config, username: &str) -> anyhow::Result<()> {
    let state = accounts(config).await?;

    match state.accounts.find_any(username).await? {
        Some(user) => print_user(&user),
        None => println!("No account named '{username}'"),
    }

    Ok(())
}

pub async fn cmd_users_create(
    config: &Config,
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
) -> anyhow::Result<()> {
    let password = match std::env::var("ACCOUNTS_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            println!("Password:");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let form = CreateUserForm {
        username: username.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        password1: password.clone(),
        password2: password,
    };

    let state = accounts(config).await?;
    match state.accounts.register(&form).await {
        Ok(user) => {
            println!("✓ Created account:");
            print_user(&user);
            Ok(())
        }
        Err(AccountError::Validation(errors)) => {
            anyhow::bail!("Invalid account details: {errors}")
        }
        Err(e) => Err(e.into()),
    }
}

//! Auth command handlers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use persona_core::api::mask_token;

use super::describe;
use crate::cli::AppContext;

fn read_password(provided: Option<String>) -> Result<String> {
    let password = match provided {
        Some(p) => p,
        None => {
            print!("Password: ");
            io::stdout().flush()?;
            let mut input = String::new();
            io::stdin().lock().read_line(&mut input)?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}

pub async fn register(
    ctx: &AppContext,
    username: &str,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = read_password(password)?;
    let response = ctx
        .session
        .register(username, email, &password)
        .await
        .map_err(describe)
        .context("registration failed")?;

    let name = response
        .user
        .as_ref()
        .map_or(username, |u| u.display_name());
    println!("✓ Registered and signed in as {name}");
    Ok(())
}

pub async fn login(ctx: &AppContext, email: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let response = ctx
        .session
        .login(email, &password)
        .await
        .map_err(describe)
        .context("login failed")?;

    let name = response.user.as_ref().map_or(email, |u| u.display_name());
    match &response.access_token {
        Some(token) => println!("✓ Signed in as {name} (token: {})", mask_token(token)),
        None => println!("✓ Signed in as {name}"),
    }
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    let had_session = ctx.session.restore().await.is_some();
    if had_session {
        ctx.session.logout().await;
    }

    if ctx.forget()? || had_session {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub async fn whoami(ctx: &AppContext) -> Result<()> {
    match ctx.session.restore().await {
        Some(user) => {
            println!("{}", user.display_name());
            if let Some(email) = &user.email {
                println!("  email: {email}");
            }
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

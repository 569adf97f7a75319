//! Portfolio command handlers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use persona_core::resources::{Category, portfolios, public_path};
use serde_json::{Map, Value};

use super::describe;
use crate::cli::AppContext;

fn read_form(path: &Path) -> Result<Map<String, Value>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str::<Value>(&contents)
        .with_context(|| format!("Failed to parse {} as JSON", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} must contain a JSON object", path.display()),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render JSON")?
    );
    Ok(())
}

pub async fn list(ctx: &AppContext) -> Result<()> {
    let list = portfolios::mine(ctx.client())
        .await
        .map_err(describe)
        .context("Failed to load portfolios")?;

    if list.is_empty() {
        println!("No portfolios yet. Create one with `persona portfolios create`.");
        return Ok(());
    }

    for portfolio in list {
        let category = portfolio.category.map_or("-", Category::as_str);
        let link = portfolio
            .slug
            .as_deref()
            .map(public_path)
            .unwrap_or_default();
        println!(
            "{:<26} {:<9} {:<30} {link}",
            portfolio.id.as_deref().unwrap_or("-"),
            category,
            portfolio.display_title(),
        );
    }
    Ok(())
}

pub async fn show(ctx: &AppContext, id: &str) -> Result<()> {
    let portfolio = portfolios::by_id(ctx.client(), id)
        .await
        .map_err(describe)
        .context("Failed to load portfolio")?;
    match portfolio {
        Some(value) => print_json(&value),
        None => anyhow::bail!("Portfolio {id} not found"),
    }
}

pub async fn public(ctx: &AppContext, slug: &str) -> Result<()> {
    let portfolio = portfolios::by_slug(ctx.client(), slug)
        .await
        .map_err(describe)
        .context("Portfolio not found")?;
    match portfolio {
        Some(value) => print_json(&value),
        None => anyhow::bail!("Portfolio not found"),
    }
}

pub async fn create(ctx: &AppContext, category: Category, theme: &str, file: &Path) -> Result<()> {
    let form = read_form(file)?;
    let json = portfolios::create(ctx.client(), category, theme, form)
        .await
        .map_err(describe)
        .context("Failed to create portfolio")?;

    let created = persona_core::resources::unwrap_data(&json, "portfolio")
        .map(portfolios::Portfolio::from_value);
    match created.and_then(|p| p.slug) {
        Some(slug) => println!("✓ Portfolio created: {}", public_path(&slug)),
        None => println!("✓ Portfolio created"),
    }
    Ok(())
}

pub async fn update(ctx: &AppContext, id: &str, file: &Path) -> Result<()> {
    let form = read_form(file)?;
    portfolios::update(ctx.client(), id, Value::Object(form))
        .await
        .map_err(describe)
        .context("Failed to update portfolio")?;
    println!("✓ Portfolio updated");
    Ok(())
}

pub async fn delete(ctx: &AppContext, id: &str) -> Result<()> {
    portfolios::delete(ctx.client(), id)
        .await
        .map_err(describe)
        .context("Failed to delete portfolio")?;
    println!("✓ Portfolio deleted");
    Ok(())
}

use anyhow::Result;
use persona_core::resources::{Category, themes};

use crate::cli::AppContext;

pub async fn list(ctx: &AppContext, category: Category) -> Result<()> {
    for theme in themes::by_category_or_fallback(ctx.client(), category).await {
        match &theme.description {
            Some(description) => println!("{:<22} {} - {description}", theme.id, theme.name),
            None => println!("{:<22} {}", theme.id, theme.name),
        }
    }
    Ok(())
}

use std::io::Write;

use tracing::instrument;

use super::{Session, apply_image, list_filters, not_found, parse_id};
use crate::cli::{MenuCommand, MenuItemArgs};
use crate::screens::ActionOutcome;
use crate::screens::menu::{MenuItemDraft, MenuScreen};

#[instrument(skip_all)]
pub(super) async fn run<W: Write>(
    session: &Session,
    out: &mut W,
    command: MenuCommand,
) -> anyhow::Result<ActionOutcome> {
    let mut screen = MenuScreen::new(session.oneshot());

    match command {
        MenuCommand::List(args) => {
            let outcome = screen.reload().await;
            if outcome.is_done() {
                let (search, category) = list_filters(&args);
                screen.set_search(search);
                screen.set_category(category);
                session.renderer.print_menu(out, &screen.visible())?;
            }
            Ok(outcome)
        }
        MenuCommand::Categories => {
            let outcome = screen.reload().await;
            if outcome.is_done() {
                session.renderer.print_lines(out, &screen.categories())?;
            }
            Ok(outcome)
        }
        MenuCommand::Add(fields) => {
            screen.open_add();
            if let Some(draft) = screen.form_mut().draft_mut() {
                fill_draft(draft, fields).await?;
            }
            Ok(screen.submit().await)
        }
        MenuCommand::Edit { id, fields } => {
            let id = parse_id(&id);
            let loaded = screen.reload().await;
            if !loaded.is_done() {
                return Ok(loaded);
            }
            if !screen.open_edit(&id) {
                return Ok(not_found(session, "Menu item", &id));
            }
            if let Some(draft) = screen.form_mut().draft_mut() {
                fill_draft(draft, fields).await?;
            }
            Ok(screen.submit().await)
        }
        MenuCommand::Toggle { id } => {
            let id = parse_id(&id);
            let loaded = screen.reload().await;
            if !loaded.is_done() {
                return Ok(loaded);
            }
            Ok(screen.toggle_availability(&id).await)
        }
        MenuCommand::Delete { id } => Ok(screen.delete(&parse_id(&id)).await),
    }
}

/// Only the flags that were given replace draft fields.
async fn fill_draft(draft: &mut MenuItemDraft, fields: MenuItemArgs) -> anyhow::Result<()> {
    if let Some(name) = fields.name {
        draft.name = name;
    }
    if let Some(category) = fields.category {
        draft.category = category;
    }
    if let Some(price) = fields.price {
        draft.price = price;
    }
    if let Some(description) = fields.description {
        draft.description = description;
    }
    if let Some(dietary) = fields.dietary {
        draft.dietary = dietary;
    }
    if let Some(cuisine) = fields.cuisine {
        draft.cuisine = cuisine;
    }
    if let Some(chef_special) = fields.chef_special {
        draft.chef_special = chef_special;
    }
    if let Some(available) = fields.available {
        draft.available = available;
    }
    apply_image(&mut draft.image, fields.image).await
}

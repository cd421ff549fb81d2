use std::io::Write;

use tracing::instrument;

use super::{Session, apply_image, list_filters, not_found, parse_id};
use crate::cli::{RestaurantArgs, RestaurantsCommand};
use crate::screens::ActionOutcome;
use crate::screens::restaurants::{RestaurantDraft, RestaurantsScreen};

#[instrument(skip_all)]
pub(super) async fn run<W: Write>(
    session: &Session,
    out: &mut W,
    command: RestaurantsCommand,
) -> anyhow::Result<ActionOutcome> {
    let mut screen = RestaurantsScreen::new(session.oneshot());

    match command {
        RestaurantsCommand::List(args) => {
            let outcome = screen.reload().await;
            if outcome.is_done() {
                let (search, status) = list_filters(&args);
                screen.set_search(search);
                screen.set_status(status);
                let visible = screen.visible();
                session
                    .renderer
                    .print_restaurants(out, &visible, screen.counts())?;
            }
            Ok(outcome)
        }
        RestaurantsCommand::Show { id } => {
            let id = parse_id(&id);
            let outcome = screen.reload().await;
            if !outcome.is_done() {
                return Ok(outcome);
            }
            match screen.details(&id) {
                Some(restaurant) => {
                    session.renderer.print_restaurant_info(out, &restaurant)?;
                    Ok(ActionOutcome::Done)
                }
                None => Ok(not_found(session, "Restaurant", &id)),
            }
        }
        RestaurantsCommand::Add(fields) => {
            screen.open_add();
            if let Some(draft) = screen.form_mut().draft_mut() {
                fill_draft(draft, fields).await?;
            }
            Ok(screen.submit().await)
        }
        RestaurantsCommand::Edit { id, fields } => {
            let id = parse_id(&id);
            let loaded = screen.reload().await;
            if !loaded.is_done() {
                return Ok(loaded);
            }
            if !screen.open_edit(&id) {
                return Ok(not_found(session, "Restaurant", &id));
            }
            if let Some(draft) = screen.form_mut().draft_mut() {
                fill_draft(draft, fields).await?;
            }
            Ok(screen.submit().await)
        }
        RestaurantsCommand::Toggle { id } => {
            let id = parse_id(&id);
            let loaded = screen.reload().await;
            if !loaded.is_done() {
                return Ok(loaded);
            }
            Ok(screen.toggle_status(&id).await)
        }
    }
}

async fn fill_draft(draft: &mut RestaurantDraft, fields: RestaurantArgs) -> anyhow::Result<()> {
    if let Some(name) = fields.name {
        draft.name = name;
    }
    if let Some(cuisine) = fields.cuisine {
        draft.cuisine = cuisine;
    }
    if let Some(address) = fields.address {
        draft.address = address;
    }
    if let Some(phone) = fields.phone {
        draft.phone = phone;
    }
    if let Some(description) = fields.description {
        draft.description = description;
    }
    if let Some(admin_id) = fields.admin_id {
        draft.admin_id = admin_id;
    }
    if let Some(password) = fields.admin_password {
        draft.admin_password = password;
    }
    if let Some(rating) = fields.rating {
        draft.rating = rating;
    }
    apply_image(&mut draft.image, fields.image).await
}

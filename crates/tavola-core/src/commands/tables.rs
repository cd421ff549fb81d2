use std::io::Write;

use anyhow::Context;
use tracing::instrument;

use super::{Session, list_filters, parse_id};
use crate::api::UploadFile;
use crate::cli::{TableArgs, TablesCommand};
use crate::screens::ActionOutcome;
use crate::screens::tables::{TableDraft, TablesScreen};

#[instrument(skip_all)]
pub(super) async fn run<W: Write>(
    session: &Session,
    out: &mut W,
    command: TablesCommand,
) -> anyhow::Result<ActionOutcome> {
    let mut screen = TablesScreen::new(session.oneshot());

    match command {
        TablesCommand::List(args) => {
            let outcome = screen.reload().await;
            if outcome.is_done() {
                let (search, status) = list_filters(&args);
                screen.set_search(search);
                screen.set_status(status);
                let visible = screen.visible();
                session.renderer.print_tables(out, &visible, screen.assets())?;
            }
            Ok(outcome)
        }
        TablesCommand::Add(fields) => {
            screen.open_add();
            if let Some(draft) = screen.form_mut().draft_mut() {
                fill_draft(draft, fields);
            }
            Ok(screen.submit().await)
        }
        TablesCommand::Delete { id } => Ok(screen.delete(&parse_id(&id)).await),
        TablesCommand::Upload { id, files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let file = UploadFile::from_path(path)
                    .await
                    .with_context(|| format!("cannot upload {}", path.display()))?;
                uploads.push(file);
            }
            Ok(screen.upload_images(&parse_id(&id), uploads).await)
        }
        TablesCommand::DeleteImage { table, image } => Ok(screen
            .delete_image(&parse_id(&table), &parse_id(&image))
            .await),
    }
}

fn fill_draft(draft: &mut TableDraft, fields: TableArgs) {
    if let Some(number) = fields.table_number {
        draft.table_number = number;
    }
    if let Some(capacity) = fields.capacity {
        draft.capacity = capacity;
    }
    if let Some(kind) = fields.kind {
        draft.kind = kind;
    }
    if let Some(features) = fields.features {
        draft.features = features;
    }
    if let Some(x) = fields.x_position {
        draft.x_position = x;
    }
    if let Some(y) = fields.y_position {
        draft.y_position = y;
    }
}

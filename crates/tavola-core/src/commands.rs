mod menu;
mod restaurants;
mod tables;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tavola_shared::EntityId;
use tracing::{debug, info, instrument};

use crate::api::{ApiClient, Credentials, HttpApiClient, HttpUploadChannel, UploadChannel};
use crate::cli::{Command, ImageArgs, ListArgs, WatchArgs, WatchTarget};
use crate::config::Config;
use crate::form::ImageSource;
use crate::notify::{AutoConfirm, ConfirmPrompt, NotificationLog, StdinConfirm};
use crate::render::Renderer;
use crate::screens::menu::MenuScreen;
use crate::screens::restaurants::RestaurantsScreen;
use crate::screens::tables::TablesScreen;
use crate::screens::{ActionOutcome, ScreenContext};

const WATCH_POLL: Duration = Duration::from_millis(250);

/// Everything one CLI invocation needs: the screen collaborators, the
/// notices they produced and how to print.
pub struct Session {
    pub ctx: ScreenContext,
    pub log: NotificationLog,
    pub renderer: Renderer,
}

impl Session {
    /// Real HTTP collaborators built from `cfg`.
    #[instrument(skip(cfg))]
    pub fn connect(cfg: &Config, assume_yes: bool) -> anyhow::Result<Self> {
        let credentials = match cfg.api.token.as_deref() {
            Some(token) => Credentials::bearer(token),
            None => Credentials::anonymous(),
        };
        let client = HttpApiClient::new(&cfg.api, credentials)
            .with_context(|| format!("failed to set up API client for {}", cfg.api.base_url))?;
        let uploads = HttpUploadChannel::new(client.clone());

        let confirm: Arc<dyn ConfirmPrompt> = if assume_yes {
            Arc::new(AutoConfirm(true))
        } else {
            Arc::new(StdinConfirm)
        };
        info!(base_url = %cfg.api.base_url, "connected session");

        Ok(Self::new(
            Arc::new(client),
            Arc::new(uploads),
            confirm,
            cfg.api.asset_host(),
            cfg.refresh.period(),
            Renderer::detect(),
        ))
    }

    pub fn new(
        api: Arc<dyn ApiClient>,
        uploads: Arc<dyn UploadChannel>,
        confirm: Arc<dyn ConfirmPrompt>,
        assets: String,
        refresh: Option<Duration>,
        renderer: Renderer,
    ) -> Self {
        let log = NotificationLog::new();
        let ctx = ScreenContext::new(api, uploads, Arc::new(log.clone()), confirm)
            .with_assets(assets)
            .with_refresh(refresh);
        Self { ctx, log, renderer }
    }

    /// One-shot commands never keep a background refresh running.
    fn oneshot(&self) -> ScreenContext {
        self.ctx.clone().with_refresh(None)
    }

    /// Prints and forgets the notices collected so far.
    pub fn flush_notices<W: Write>(&self, err: &mut W) -> anyhow::Result<()> {
        self.renderer.print_notifications(err, &self.log.drain())
    }
}

#[instrument(skip(session, out, command))]
pub async fn dispatch<W: Write>(
    session: &Session,
    out: &mut W,
    command: Command,
) -> anyhow::Result<ActionOutcome> {
    debug!("dispatching command");
    match command {
        Command::Menu(cmd) => menu::run(session, out, cmd).await,
        Command::Tables(cmd) => tables::run(session, out, cmd).await,
        Command::Restaurants(cmd) => restaurants::run(session, out, cmd).await,
        Command::Watch(args) => watch(session, out, args).await,
    }
}

/// Mounts one screen with a background refresh and re-renders its list
/// whenever the snapshot changes, until Ctrl-C.
#[instrument(skip(session, out))]
async fn watch<W: Write>(
    session: &Session,
    out: &mut W,
    args: WatchArgs,
) -> anyhow::Result<ActionOutcome> {
    let period = args
        .every
        .map(Duration::from_secs)
        .or(session.ctx.refresh)
        .unwrap_or(Duration::from_secs(60));
    let ctx = session.ctx.clone().with_refresh(Some(period));
    info!(screen = ?args.target, ?period, "watching");

    match args.target {
        WatchTarget::Menu => {
            let mut screen = MenuScreen::new(ctx);
            screen.set_search(&args.list.search);
            screen.set_category(&args.list.category);
            watch_loop(session, out, &mut screen).await
        }
        WatchTarget::Tables => {
            let mut screen = TablesScreen::new(ctx);
            screen.set_search(&args.list.search);
            screen.set_status(&args.list.category);
            watch_loop(session, out, &mut screen).await
        }
        WatchTarget::Restaurants => {
            let mut screen = RestaurantsScreen::new(ctx);
            screen.set_search(&args.list.search);
            screen.set_status(&args.list.category);
            watch_loop(session, out, &mut screen).await
        }
    }
}

/// A screen whose list can be kept on display.
trait Watched {
    async fn mount(&mut self) -> ActionOutcome;
    fn unmount(&mut self);
    fn version(&self) -> u64;
    fn render<W: Write>(&mut self, renderer: &Renderer, out: &mut W) -> anyhow::Result<()>;
}

impl Watched for MenuScreen {
    async fn mount(&mut self) -> ActionOutcome {
        MenuScreen::mount(self).await
    }

    fn unmount(&mut self) {
        MenuScreen::unmount(self)
    }

    fn version(&self) -> u64 {
        self.items().version()
    }

    fn render<W: Write>(&mut self, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
        let visible = self.visible();
        renderer.print_menu(out, &visible)
    }
}

impl Watched for TablesScreen {
    async fn mount(&mut self) -> ActionOutcome {
        TablesScreen::mount(self).await
    }

    fn unmount(&mut self) {
        TablesScreen::unmount(self)
    }

    fn version(&self) -> u64 {
        self.tables().version()
    }

    fn render<W: Write>(&mut self, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
        let visible = self.visible();
        let assets = self.assets().to_string();
        renderer.print_tables(out, &visible, &assets)
    }
}

impl Watched for RestaurantsScreen {
    async fn mount(&mut self) -> ActionOutcome {
        RestaurantsScreen::mount(self).await
    }

    fn unmount(&mut self) {
        RestaurantsScreen::unmount(self)
    }

    fn version(&self) -> u64 {
        self.restaurants().version()
    }

    fn render<W: Write>(&mut self, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
        let visible = self.visible();
        let counts = self.counts();
        renderer.print_restaurants(out, &visible, counts)
    }
}

async fn watch_loop<S, W>(session: &Session, out: &mut W, screen: &mut S) -> anyhow::Result<ActionOutcome>
where
    S: Watched,
    W: Write,
{
    let outcome = screen.mount().await;
    let mut shown = screen.version();
    screen.render(&session.renderer, out)?;
    out.flush()?;

    let mut stderr = io::stderr().lock();
    session.flush_notices(&mut stderr)?;
    drop(stderr);

    let mut poll = tokio::time::interval(WATCH_POLL);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("interrupted; unmounting");
                break;
            }
            _ = poll.tick() => {
                let version = screen.version();
                if version != shown {
                    shown = version;
                    writeln!(out)?;
                    screen.render(&session.renderer, out)?;
                    out.flush()?;
                }
                let mut stderr = io::stderr().lock();
                session.flush_notices(&mut stderr)?;
            }
        }
    }

    screen.unmount();
    Ok(outcome)
}

pub(crate) fn parse_id(raw: &str) -> EntityId {
    EntityId::from(raw.trim())
}

/// Last of URL or file wins; clap already rejects passing both at once.
pub(crate) async fn apply_image(target: &mut ImageSource, args: ImageArgs) -> anyhow::Result<()> {
    if let Some(url) = args.image_url {
        *target = ImageSource::from_existing(Some(&url));
    }
    if let Some(path) = args.image_file {
        *target = ImageSource::embed_file(&path).await?;
    }
    Ok(())
}

pub(crate) fn list_filters(args: &ListArgs) -> (&str, &str) {
    (args.search.as_str(), args.category.as_str())
}

pub(crate) fn not_found(session: &Session, what: &str, id: &EntityId) -> ActionOutcome {
    session
        .ctx
        .notifier
        .notify(&format!("{what} {id} not found"), crate::notify::Level::Error);
    ActionOutcome::Blocked
}

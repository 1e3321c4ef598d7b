use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use inspect_model::{
    list_categories, Action, Effect, Inspection, Marker, PageStep, Pin, PinId, Plan, PlanId,
    PlanUpload, SourceRef, SurfaceBounds,
};
use plan_engine::{default_engine, OpenSource, PlanEngine, RenderedSurface};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use storage::{Settings, SessionSnapshot, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "siteinspect")]
#[command(about = "Annotate site plans with numbered inspection pins")]
pub struct Cli {
    /// Directory holding the session and settings files.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Settings file (defaults to settings.toml in the data directory).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log state changes to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List issue categories and their marker colors.
    Categories,
    /// Manage plan documents.
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Place and edit pins.
    #[command(subcommand)]
    Pin(PinCommand),
    /// Print marker pixel positions for a page of the active plan.
    Markers {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[command(flatten)]
        surface: SurfaceArgs,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum PlanCommand {
    /// Register plan documents; the first one becomes active if none is.
    Add {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// List registered plans.
    List,
    /// Make a plan the active one.
    Use { id: u64 },
    /// Remove a plan that has no pins.
    Remove { id: u64 },
}

#[derive(Debug, Subcommand)]
enum PinCommand {
    /// Place a pin by clicking a page surface of the active plan.
    Place {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Pointer x in surface pixels.
        #[arg(long)]
        px: f64,
        /// Pointer y in surface pixels.
        #[arg(long)]
        py: f64,
        #[command(flatten)]
        surface: SurfaceArgs,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change a pin's category.
    Category { id: u64, name: String },
    /// Replace a pin's description.
    Describe { id: u64, text: String },
    /// Print one pin.
    Show { id: u64 },
    /// List pins, optionally filtered to a plan and page.
    List {
        #[arg(long)]
        plan: Option<u64>,
        #[arg(long, requires = "plan")]
        page: Option<u32>,
    },
    /// Delete a pin. Other pins keep their numbers.
    Remove { id: u64 },
}

#[derive(Debug, Args)]
struct SurfaceArgs {
    /// Zoom in percent; stepped and clamped like the plan view.
    #[arg(long, default_value_t = 100)]
    zoom: u16,
    /// Explicit surface size in pixels (e.g. 200x400) instead of the
    /// rendered page size.
    #[arg(long, value_name = "WxH", value_parser = parse_surface)]
    surface: Option<(f64, f64)>,
}

#[derive(Debug, Serialize)]
struct PlanOutput<'a> {
    id: u64,
    name: &'a str,
    source: &'a str,
    uploaded_at: DateTime<Utc>,
    page_count: Option<u32>,
    active: bool,
}

#[derive(Debug, Serialize)]
struct PinOutput<'a> {
    id: u64,
    number: u32,
    plan: u64,
    page: u32,
    x: f64,
    y: f64,
    category: &'static str,
    description: &'a str,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a Pin> for PinOutput<'a> {
    fn from(pin: &'a Pin) -> Self {
        Self {
            id: pin.id().0,
            number: pin.number(),
            plan: pin.plan_id().0,
            page: pin.page(),
            x: pin.position().x,
            y: pin.position().y,
            category: pin.category.name(),
            description: &pin.description,
            created_at: pin.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MarkersOutput {
    plan: u64,
    page: u32,
    zoom_percent: u16,
    width: f64,
    height: f64,
    markers: Vec<Marker>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if let Commands::Categories = cli.command {
        return print_json(&list_categories());
    }

    let mut session = Session::open(cli.data_dir.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Commands::Plan(command) => run_plan(&mut session, command),
        Commands::Pin(command) => run_pin(&mut session, command),
        Commands::Markers { page, surface } => run_markers(&mut session, page, &surface),
        Commands::Categories | Commands::Version => Ok(()),
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// A loaded inspection bound to the storage it came from.
struct Session {
    storage: Storage,
    inspection: Inspection,
}

impl Session {
    fn open(data_dir: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let default_dir = storage::resolve_data_dir(data_dir, |key| std::env::var(key).ok())?;
        let settings_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Storage::with_root(&default_dir).settings_path());

        if config.is_some() && !settings_path.exists() {
            bail!("settings file does not exist: {}", settings_path.display());
        }

        let settings = Settings::load(Some(settings_path.as_path()))
            .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

        let root = data_dir.map(Path::to_path_buf).or(settings.data_dir).unwrap_or(default_dir);
        let storage = Storage::with_root(root);
        let snapshot = storage.load_session().context("failed to load session")?;

        tracing::debug!(root = %storage.root().display(), "opened session");
        let inspection = snapshot.into_inspection(settings.zoom)?;
        Ok(Self { storage, inspection })
    }

    fn save(&self) -> Result<()> {
        self.storage
            .save_session(&SessionSnapshot::capture(&self.inspection))
            .context("failed to save session")?;
        Ok(())
    }

    fn apply(&mut self, action: Action) -> Result<Effect> {
        Ok(self.inspection.apply(action)?)
    }

    fn active_plan(&self) -> Result<&Plan> {
        self.inspection
            .active_plan()
            .context("no active plan; register one with `siteinspect plan add`")
    }

    fn pin(&self, id: u64) -> Result<&Pin> {
        Ok(self.inspection.pins().get(PinId(id))?)
    }

    /// Opens the active plan, reports its page count to the inspection if it
    /// was not known yet, and moves to `page`.
    fn show_page(&mut self, page: u32) -> Result<RenderedPage> {
        let plan = self.active_plan()?.clone();
        let mut engine = default_engine();
        let handle = engine
            .open(OpenSource::from(&plan.source))
            .with_context(|| format!("failed to open PDF {}", plan.source.as_str()))?;

        let page_count = engine.page_count(handle)?;
        if plan.page_count != Some(page_count) {
            self.apply(Action::ResolvePageCount { plan: plan.id, page_count })?;
        }

        self.apply(Action::TurnPage(PageStep::To(page)))?;
        let current = self.inspection.view_state().current_page;
        if current != page {
            bail!("page {page} out of range (page_count={page_count})");
        }

        Ok(RenderedPage { plan: plan.id, engine, handle })
    }

    /// Steps the zoom toward `percent` until it arrives or hits a limit.
    fn zoom_to(&mut self, percent: u16) -> Result<u16> {
        loop {
            let current = self.inspection.view_state().zoom_percent;
            let action = match current.cmp(&percent) {
                std::cmp::Ordering::Less => Action::ZoomIn,
                std::cmp::Ordering::Greater => Action::ZoomOut,
                std::cmp::Ordering::Equal => return Ok(current),
            };

            self.apply(action)?;
            let next = self.inspection.view_state().zoom_percent;
            let crossed = (current < percent) != (next < percent) && next != percent;
            if next == current || crossed {
                return Ok(next);
            }
        }
    }

    fn surface(&mut self, page: &RenderedPage, args: &SurfaceArgs) -> Result<SurfaceBounds> {
        let zoom = self.zoom_to(args.zoom)?;
        if let Some((width, height)) = args.surface {
            return Ok(SurfaceBounds::sized(width, height));
        }

        let current = self.inspection.view_state().current_page;
        let surface: RenderedSurface = page
            .engine
            .render_surface(page.handle, current, f32::from(zoom) / 100.0)
            .context("failed to render page surface")?;

        Ok(surface.bounds_at(0.0, 0.0))
    }
}

struct RenderedPage {
    plan: PlanId,
    engine: plan_engine::LopdfEngine,
    handle: plan_engine::DocumentHandle,
}

fn run_plan(session: &mut Session, command: PlanCommand) -> Result<()> {
    match command {
        PlanCommand::Add { files } => {
            let mut engine = default_engine();
            let mut uploads = Vec::with_capacity(files.len());
            let mut page_counts = Vec::with_capacity(files.len());

            for file in &files {
                ensure_pdf_exists(file)?;
                let path = file
                    .canonicalize()
                    .with_context(|| format!("failed to resolve {}", file.display()))?;
                let handle = engine
                    .open(OpenSource::from(path.as_path()))
                    .with_context(|| format!("failed to open PDF {}", file.display()))?;
                page_counts.push(engine.page_count(handle)?);
                engine.close(handle)?;

                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                uploads.push(PlanUpload::new(name, SourceRef::new(path.display().to_string())));
            }

            let Effect::PlansRegistered(ids) = session.apply(Action::RegisterPlans(uploads))?
            else {
                bail!("plan registration produced no plans");
            };
            for (&plan, page_count) in ids.iter().zip(page_counts) {
                session.apply(Action::ResolvePageCount { plan, page_count })?;
            }

            session.save()?;
            let plans: Vec<_> = ids
                .iter()
                .filter_map(|id| session.inspection.plans().get(*id))
                .map(|plan| plan_output(&session.inspection, plan))
                .collect();
            print_json(&plans)
        }
        PlanCommand::List => {
            let plans: Vec<_> = session
                .inspection
                .plans()
                .all()
                .iter()
                .map(|plan| plan_output(&session.inspection, plan))
                .collect();
            print_json(&plans)
        }
        PlanCommand::Use { id } => {
            session.apply(Action::OpenPlanList)?;
            session.apply(Action::PickPlan(PlanId(id)))?;
            session.save()?;
            let plan = session.active_plan()?;
            print_json(&plan_output(&session.inspection, plan))
        }
        PlanCommand::Remove { id } => {
            session.apply(Action::OpenPlanList)?;
            session.apply(Action::RemovePlan(PlanId(id)))?;
            session.save()?;
            println!("removed plan {id}");
            Ok(())
        }
    }
}

fn run_pin(session: &mut Session, command: PinCommand) -> Result<()> {
    match command {
        PinCommand::Place { page, px, py, surface, category, description } => {
            let rendered = session.show_page(page)?;
            let bounds = session.surface(&rendered, &surface)?;

            session.apply(Action::TogglePlacement)?;
            let Effect::PinCreated(pin) =
                session.apply(Action::ClickSurface { pointer_x: px, pointer_y: py, bounds })?
            else {
                bail!("click did not place a pin");
            };

            if let Some(name) = category {
                session.apply(Action::SetCategory(name))?;
            }
            if let Some(text) = description {
                session.apply(Action::SetDescription(text))?;
            }
            session.apply(Action::Save)?;
            session.save()?;

            print_json(&PinOutput::from(session.pin(pin.0)?))
        }
        PinCommand::Category { id, name } => {
            edit_pin(session, id, Action::SetCategory(name))?;
            print_json(&PinOutput::from(session.pin(id)?))
        }
        PinCommand::Describe { id, text } => {
            edit_pin(session, id, Action::SetDescription(text))?;
            print_json(&PinOutput::from(session.pin(id)?))
        }
        PinCommand::Show { id } => print_json(&PinOutput::from(session.pin(id)?)),
        PinCommand::List { plan, page } => {
            let pins = session.inspection.pins();
            let selected: Vec<PinOutput<'_>> = match (plan, page) {
                (Some(plan), Some(page)) => {
                    pins.query_by_plan_and_page(PlanId(plan), page).map(PinOutput::from).collect()
                }
                (Some(plan), None) => pins
                    .all()
                    .iter()
                    .filter(|pin| pin.plan_id() == PlanId(plan))
                    .map(PinOutput::from)
                    .collect(),
                _ => pins.all().iter().map(PinOutput::from).collect(),
            };
            print_json(&selected)
        }
        PinCommand::Remove { id } => {
            session.apply(Action::SelectPin(PinId(id)))?;
            session.apply(Action::DeletePin)?;
            session.save()?;
            println!("removed pin {id}");
            Ok(())
        }
    }
}

/// Opens the editor on a pin, applies one edit and saves.
fn edit_pin(session: &mut Session, id: u64, edit: Action) -> Result<()> {
    session.apply(Action::SelectPin(PinId(id)))?;
    session.apply(edit)?;
    session.apply(Action::Save)?;
    session.save()
}

fn run_markers(session: &mut Session, page: u32, args: &SurfaceArgs) -> Result<()> {
    let rendered = session.show_page(page)?;
    let bounds = session.surface(&rendered, args)?;
    let state = session.inspection.view_state();

    let output = MarkersOutput {
        plan: rendered.plan.0,
        page: state.current_page,
        zoom_percent: state.zoom_percent,
        width: bounds.width,
        height: bounds.height,
        markers: session.inspection.markers(bounds),
    };
    print_json(&output)
}

fn plan_output<'a>(inspection: &Inspection, plan: &'a Plan) -> PlanOutput<'a> {
    PlanOutput {
        id: plan.id.0,
        name: &plan.name,
        source: plan.source.as_str(),
        uploaded_at: plan.uploaded_at,
        page_count: plan.page_count,
        active: inspection.plans().active_id() == Some(plan.id),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn parse_surface(value: &str) -> Result<(f64, f64), String> {
    let (width, height) =
        value.split_once(['x', 'X']).ok_or_else(|| format!("expected WxH, got {value:?}"))?;

    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|size| *size > 0.0)
            .ok_or_else(|| format!("invalid surface size {value:?}"))
    };

    Ok((parse(width)?, parse(height)?))
}

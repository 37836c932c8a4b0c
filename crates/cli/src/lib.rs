use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use takeoff_core::{
    export_line_items_csv, export_measurements_csv, CsvExportConfig, ScriptedPrompter,
    SessionEvent, TakeoffSession,
};
use takeoff_model::{
    qa_report, summarize, CalibrationScale, CostItemRequest, CostLineItem, DisplayScale,
    DocumentId, DocumentPoint, LineItemId, LineItemStatus, Measurement, MeasurementId,
    MeasurementKind, Preferences, Tool, ViewPoint, MAX_DISPLAY_PRECISION,
};
use takeoff_storage::{JsonStore, LineItemStore, MeasurementStore, Storage};

#[derive(Debug, Parser)]
#[command(name = "takeoff")]
#[command(about = "Blueprint takeoff measurements and cost tracking")]
pub struct Cli {
    /// Data directory (defaults to TAKEOFF_DATA_DIR, then the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Capture and save a measurement from document-space points.
    Measure(MeasureArgs),
    /// List saved measurements as JSON.
    List {
        #[arg(long)]
        doc: u64,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Print quantity totals per page and unit.
    Summary {
        #[arg(long)]
        doc: u64,
    },
    /// Print the shapes drawn for a page at a zoom level.
    Render {
        #[arg(long)]
        doc: u64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Zoom in percent, 100 = actual size
        #[arg(long, default_value_t = 100)]
        zoom: u16,
        #[arg(long, value_name = "ID")]
        highlight: Option<MeasurementId>,
    },
    /// Delete a measurement and unlink its line item.
    Delete {
        #[arg(long, value_name = "ID")]
        id: MeasurementId,
    },
    /// Record the actual cost of a line item.
    Actual {
        #[arg(long, value_name = "ID")]
        item: LineItemId,
        #[arg(long)]
        amount: f64,
    },
    /// Print the estimate vs actual QA report.
    Qa {
        #[arg(long)]
        doc: u64,
    },
    /// Export measurements (or line items) as CSV.
    Export {
        #[arg(long)]
        doc: u64,
        #[arg(long)]
        line_items: bool,
        /// Only export measurements on this page; repeat for more pages
        #[arg(long = "page", value_name = "PAGE", conflicts_with = "line_items")]
        pages: Vec<u32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show or change preferences.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Set {
        /// Decimal places in labels and exports
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=MAX_DISPLAY_PRECISION as i64))]
        precision: Option<u8>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
}

#[derive(Debug, Args)]
struct MeasureArgs {
    #[arg(value_enum)]
    kind: KindArg,
    #[arg(long)]
    doc: u64,
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Known scale in pixels per foot
    #[arg(long, conflicts_with = "calibrate")]
    scale: Option<f64>,
    /// Two reference points spanning a known distance
    #[arg(long, num_args = 2, value_names = ["START", "END"], requires = "feet")]
    calibrate: Option<Vec<DocumentPoint>>,
    /// Real-world length of the calibration reference, in feet
    #[arg(long)]
    feet: Option<String>,
    /// Document-space point as X,Y; repeat for each click
    #[arg(long = "point", value_name = "X,Y", allow_hyphen_values = true, required = true)]
    points: Vec<DocumentPoint>,
    /// Note text
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    item_category: Option<String>,
    #[arg(long)]
    unit_cost: Option<f64>,
    #[arg(long, value_enum)]
    status: Option<StatusArg>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Linear,
    Area,
    Count,
    Note,
}

impl From<KindArg> for MeasurementKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Linear => MeasurementKind::Linear,
            KindArg::Area => MeasurementKind::Area,
            KindArg::Count => MeasurementKind::Count,
            KindArg::Note => MeasurementKind::Note,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Draft,
    Final,
}

impl From<StatusArg> for LineItemStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Draft => LineItemStatus::Draft,
            StatusArg::Final => LineItemStatus::Final,
        }
    }
}

#[derive(Debug, Serialize)]
struct MeasureOutput {
    measurement: Measurement,
    line_item: Option<CostLineItem>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let storage = Storage::resolve(cli.data_dir).context("failed to resolve data directory")?;
    tracing::debug!(root = %storage.root().display(), "using data directory");

    match cli.command {
        Commands::Measure(args) => run_measure(&storage, args),
        Commands::List { doc, page } => {
            let store = storage.takeoff_store();
            let measurements = match page {
                Some(page) => store.load(DocumentId(doc), page)?,
                None => store.load_document(DocumentId(doc))?,
            };
            print_json(&measurements)
        }
        Commands::Summary { doc } => {
            let measurements = storage.takeoff_store().load_document(DocumentId(doc))?;
            print_json(&summarize(&measurements))
        }
        Commands::Render { doc, page, zoom, highlight } => {
            let preferences = storage.load_preferences()?;
            let mut session = TakeoffSession::new(storage.takeoff_store(), DocumentId(doc), page)?
                .with_preferences(&preferences);
            session.set_zoom(DisplayScale::from_percent(zoom));
            session.set_highlight(highlight);
            print_json(&session.render()?)
        }
        Commands::Delete { id } => {
            storage
                .takeoff_store()
                .delete(id)
                .with_context(|| format!("failed to delete measurement {id}"))?;
            println!("deleted:{id}");
            Ok(())
        }
        Commands::Actual { item, amount } => {
            let updated = storage
                .takeoff_store()
                .record_actual(item, amount)
                .with_context(|| format!("failed to record actual cost for line item {item}"))?;
            print_json(&updated)
        }
        Commands::Qa { doc } => {
            let items = storage.takeoff_store().line_items(DocumentId(doc))?;
            print_json(&qa_report(&items))
        }
        Commands::Export { doc, line_items, pages, output } => {
            run_export(&storage, DocumentId(doc), line_items, pages, output)
        }
        Commands::Config { action } => run_config(&storage, action),
        Commands::Version => Ok(()),
    }
}

fn run_measure(storage: &Storage, args: MeasureArgs) -> Result<()> {
    let kind = MeasurementKind::from(args.kind);
    let preferences = storage.load_preferences()?;
    let mut session =
        TakeoffSession::<JsonStore>::new(storage.takeoff_store(), DocumentId(args.doc), args.page)?
            .with_preferences(&preferences);

    if let Some(scale) = args.scale {
        session.set_calibration(CalibrationScale::new(scale).context("invalid --scale")?);
    }

    if let (Some(reference), Some(feet)) = (&args.calibrate, &args.feet) {
        let mut prompter = ScriptedPrompter::default();
        prompter.distances.push_back(feet.clone());
        session.select_tool(Tool::Scale)?;
        for point in reference {
            session.click(view_point(*point), &mut prompter).context("calibration failed")?;
        }
    }

    check_point_count(kind, args.points.len())?;

    let mut prompter = ScriptedPrompter::default();
    if let Some(label) = args.label {
        prompter.labels.push_back(label);
    }
    if args.item_category.is_some() || args.unit_cost.is_some() {
        prompter.cost_items.push_back(CostItemRequest {
            category: args.item_category.unwrap_or_else(|| preferences.default_category.clone()),
            description: args.description,
            unit_cost: args.unit_cost.unwrap_or(0.0),
            status: args.status.map_or(preferences.default_status, LineItemStatus::from),
        });
    }

    session
        .select_tool(Tool::from(kind))
        .with_context(|| format!("cannot measure {kind}"))?;

    let mut event = SessionEvent::Ignored;
    for point in &args.points {
        event = session.click(view_point(*point), &mut prompter)?;
    }
    if matches!(kind, MeasurementKind::Area | MeasurementKind::Count) {
        event = session.double_click(&mut prompter)?;
    }

    match event {
        SessionEvent::Saved { measurement, line_item } => {
            print_json(&MeasureOutput { measurement, line_item })
        }
        SessionEvent::Discarded { vertices } => {
            anyhow::bail!("area needs at least 3 vertices, got {vertices}; nothing was saved")
        }
        other => anyhow::bail!("measurement was not completed ({other:?})"),
    }
}

fn check_point_count(kind: MeasurementKind, count: usize) -> Result<()> {
    let expected = match kind {
        MeasurementKind::Linear => 2,
        MeasurementKind::Note => 1,
        MeasurementKind::Area | MeasurementKind::Count => return Ok(()),
    };
    if count != expected {
        anyhow::bail!("{kind} measurements take exactly {expected} point(s), got {count}");
    }
    Ok(())
}

/// Points on the command line are already in document space
fn view_point(point: DocumentPoint) -> ViewPoint {
    ViewPoint::new(point.x, point.y)
}

fn run_export(
    storage: &Storage,
    document_id: DocumentId,
    line_items: bool,
    pages: Vec<u32>,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = storage.takeoff_store();
    let config = CsvExportConfig {
        precision: storage.load_preferences()?.display_precision,
        page_filter: (!pages.is_empty()).then_some(pages),
        ..CsvExportConfig::default()
    };

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    if line_items {
        export_line_items_csv(writer, &store.line_items(document_id)?, &config)?;
    } else {
        export_measurements_csv(writer, &store.load_document(document_id)?, &config)?;
    }

    if let Some(path) = output {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_config(storage: &Storage, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print_json(&storage.load_preferences()?),
        ConfigAction::Set { precision, category, status } => {
            let current = storage.load_preferences()?;
            let updated = Preferences {
                display_precision: precision.map_or(current.display_precision, usize::from),
                default_category: category.unwrap_or(current.default_category),
                default_status: status.map_or(current.default_status, LineItemStatus::from),
            };
            storage.save_preferences(&updated).context("failed to save preferences")?;
            print_json(&updated)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

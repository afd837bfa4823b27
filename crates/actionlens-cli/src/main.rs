mod tracing_setup;

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use actionlens_contracts::catalog::{find_sample, ActionCatalog, SAMPLE_IMAGES};
use actionlens_contracts::events::{now_utc_iso, EventKind, EventWriter};
use actionlens_contracts::predictions::HealthStatus;
use actionlens_contracts::results::{render_results, ResultRow, ResultsView};
use actionlens_contracts::session::{
    parse_command, write_summary, SessionCommand, SessionSummary, SESSION_HELP_COMMANDS,
};
use actionlens_engine::{
    load_upload, ClientConfig, HttpPredictionClient, ReanalyzeOutcome, SelectOutcome,
    WorkflowController, WorkflowPhase, WorkflowState,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::tracing_setup::{init_subscriber, Verbosity};

#[derive(Debug, Parser)]
#[command(
    name = "actionlens",
    version,
    about = "Upload a photo, get the human action it shows"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Prediction service base URL (default: $ACTIONLENS_API_BASE or http://localhost:8000).
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Request timeout in seconds (default: $ACTIONLENS_REQUEST_TIMEOUT or 60).
    #[arg(long, global = true)]
    timeout: Option<f64>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    Predict(PredictArgs),
    Session(SessionArgs),
    Actions(ActionsArgs),
    Health,
}

#[derive(Debug, Parser)]
struct PredictArgs {
    image: PathBuf,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    /// Directory for `events.jsonl` and `summary.json`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ActionsArgs {
    #[arg(long)]
    search: Option<String>,
    /// Ask the service instead of the built-in catalog.
    #[arg(long)]
    remote: bool,
}

/// Extra time on top of the request timeout for preview work and scheduling.
const SETTLE_GRACE: Duration = Duration::from_secs(5);
const SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("actionlens error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.global.verbose, cli.global.quiet));
    let config = ClientConfig::resolve(cli.global.endpoint.as_deref(), cli.global.timeout)?;
    debug!(endpoint = %config.endpoint, timeout = ?config.timeout, "client configured");

    match cli.command {
        Command::Predict(args) => run_predict(args, config),
        Command::Session(args) => run_session(args, config),
        Command::Actions(args) => run_actions(args, config),
        Command::Health => run_health(config),
    }
}

fn run_predict(args: PredictArgs, config: ClientConfig) -> Result<i32> {
    let settle_budget = config.timeout + SETTLE_GRACE;
    let client = HttpPredictionClient::new(config)?;
    let events = args.events.clone().map(EventWriter::for_new_session);
    if let Some(events) = events.as_ref() {
        events.emit(EventKind::SessionStarted, session_payload("predict", client.config()))?;
    }
    let controller = WorkflowController::new(Arc::new(client), events.clone());

    let upload = load_upload(&args.image)?;
    match controller.select_file(upload) {
        SelectOutcome::Rejected(err) => {
            if args.json {
                print_json(&json!({ "success": false, "error": err.to_string(), "kind": err.kind() }))?;
            } else {
                eprintln!("{err}");
            }
            return Ok(2);
        }
        SelectOutcome::WorkerUnavailable(message) => bail!(message),
        SelectOutcome::Started { .. } | SelectOutcome::Queued { .. } => {}
    }

    let state = controller
        .wait_until_settled(settle_budget)
        .with_context(|| {
            format!(
                "prediction did not finish within {}s",
                settle_budget.as_secs()
            )
        })?;
    if let Some(events) = events.as_ref() {
        let stats = controller.stats();
        events.emit(
            EventKind::SessionFinished,
            to_payload(json!({ "requests": stats.requests, "failures": stats.failures })),
        )?;
    }

    if let Some(message) = state.error_message.as_deref() {
        if args.json {
            print_json(&json!({ "success": false, "error": message }))?;
        } else {
            eprintln!("{message}");
        }
        return Ok(1);
    }

    let view = render_results(&state.predictions, ActionCatalog::global());
    if args.json {
        print_json(&results_json(&state, &view))?;
    } else {
        print!("{}", format_results(&view));
    }
    Ok(0)
}

fn run_session(args: SessionArgs, config: ClientConfig) -> Result<i32> {
    let client = Arc::new(HttpPredictionClient::new(config)?);
    let events = match args.out.as_ref() {
        Some(out) => {
            fs::create_dir_all(out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            Some(EventWriter::for_new_session(out.join("events.jsonl")))
        }
        None => None,
    };
    if let Some(events) = events.as_ref() {
        events.emit(EventKind::SessionStarted, session_payload("session", client.config()))?;
    }
    let started_at = now_utc_iso();
    let controller = WorkflowController::new(client.clone(), events.clone());
    spawn_state_printer(controller.subscribe())?;

    println!(
        "ActionLens session on {}. Type /help for commands.",
        controller.endpoint()
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(&line) {
            SessionCommand::Noop => {}
            SessionCommand::Open { path } => open_path(&controller, Path::new(&path)),
            SessionCommand::Reanalyze => match controller.reanalyze() {
                ReanalyzeOutcome::NoFile => println!("No image selected. Use /open <path> first."),
                ReanalyzeOutcome::Busy => println!("Still analyzing. Try again when it finishes."),
                ReanalyzeOutcome::WorkerUnavailable(message) => println!("Error: {message}"),
                ReanalyzeOutcome::Started { .. } | ReanalyzeOutcome::Queued { .. } => {}
            },
            SessionCommand::Clear => controller.clear(),
            SessionCommand::Status => println!("{}", status_line(&controller.snapshot())),
            SessionCommand::Actions { query } => {
                print!("{}", format_catalog(ActionCatalog::global(), query.as_deref()));
            }
            SessionCommand::Samples => {
                for sample in SAMPLE_IMAGES {
                    println!("{:<14} {}", sample.action, sample.alt);
                }
            }
            SessionCommand::Sample { action } => open_sample(&controller, &client, &action),
            SessionCommand::Health => match client.health() {
                Ok(health) => println!("{}", format_health(&health)),
                Err(err) => println!("Health check failed: {err:#}"),
            },
            SessionCommand::Help => println!("Commands: {}", SESSION_HELP_COMMANDS.join(" ")),
            SessionCommand::Quit => break,
            SessionCommand::MissingArgument { command } => {
                println!("/{command} requires an argument");
            }
            SessionCommand::Unknown { command } => {
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }

    let last = match controller.wait_until_settled(SHUTDOWN_WAIT) {
        Some(state) => state,
        None => {
            warn!("leaving session with a request still outstanding");
            controller.snapshot()
        }
    };
    if let (Some(out), Some(events)) = (args.out.as_ref(), events.as_ref()) {
        finish_session(out, events, &controller, &last, started_at)?;
        info!(out = %out.display(), "session summary written");
    }
    Ok(0)
}

/// Writes `summary.json` under `out` and closes the journal.
fn finish_session(
    out: &Path,
    events: &EventWriter,
    controller: &WorkflowController,
    last: &WorkflowState,
    started_at: String,
) -> Result<()> {
    let stats = controller.stats();
    let summary = SessionSummary {
        session_id: events.session_id().to_string(),
        started_at,
        finished_at: now_utc_iso(),
        uploads: stats.uploads,
        rejected_uploads: stats.rejected_uploads,
        requests: stats.requests,
        successes: stats.successes,
        failures: stats.failures,
        last_headline: last.predictions.top().map(|item| item.action.clone()),
    };
    let mut extra = Map::new();
    extra.insert(
        "stale_responses".to_string(),
        Value::from(stats.stale_responses),
    );
    extra.insert(
        "endpoint".to_string(),
        Value::String(controller.endpoint().to_string()),
    );
    write_summary(&out.join("summary.json"), &summary, Some(&extra))?;
    events.emit(
        EventKind::SessionFinished,
        to_payload(json!({ "requests": stats.requests, "failures": stats.failures })),
    )?;
    Ok(())
}

fn run_actions(args: ActionsArgs, config: ClientConfig) -> Result<i32> {
    if !args.remote {
        print!(
            "{}",
            format_catalog(ActionCatalog::global(), args.search.as_deref())
        );
        return Ok(0);
    }

    let client = HttpPredictionClient::new(config)?;
    let needle = args
        .search
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .unwrap_or_default();
    let actions = client.remote_actions()?;
    let catalog = ActionCatalog::global();
    for action in actions
        .iter()
        .filter(|action| needle.is_empty() || action.to_lowercase().contains(&needle))
    {
        println!(
            "{} {:<22} {}",
            catalog.glyph_for(action),
            action,
            catalog.label_for(action)
        );
    }
    Ok(0)
}

fn run_health(config: ClientConfig) -> Result<i32> {
    let client = HttpPredictionClient::new(config)?;
    let health = client.health()?;
    println!("{}", format_health(&health));
    Ok(if health.status == "healthy" { 0 } else { 1 })
}

fn open_path(controller: &WorkflowController, path: &Path) {
    match load_upload(path) {
        Ok(upload) => report_select(controller.select_file(upload)),
        Err(err) => println!("Error: {err:#}"),
    }
}

fn open_sample(controller: &WorkflowController, client: &HttpPredictionClient, action: &str) {
    let Some(sample) = find_sample(action) else {
        println!("No sample for {action}. Use /samples to list them.");
        return;
    };
    match client.fetch_sample(sample) {
        Ok(upload) => report_select(controller.select_file(Some(upload))),
        Err(err) => println!("Error: could not download sample: {err:#}"),
    }
}

/// The printer thread reports state changes; this adds what a snapshot
/// cannot say.
fn report_select(outcome: SelectOutcome) {
    match outcome {
        SelectOutcome::Queued { .. } => {
            println!("Queued. The outstanding request finishes first and its result is dropped.");
        }
        SelectOutcome::WorkerUnavailable(message) => println!("Error: {message}"),
        SelectOutcome::Rejected(_) | SelectOutcome::Started { .. } => {}
    }
}

fn spawn_state_printer(updates: mpsc::Receiver<WorkflowState>) -> Result<()> {
    thread::Builder::new()
        .name("actionlens-printer".to_string())
        .spawn(move || {
            let catalog = ActionCatalog::global();
            let mut last: Option<WorkflowState> = None;
            for state in updates {
                if let Some(text) = describe_transition(last.as_ref(), &state, catalog) {
                    println!("{text}");
                }
                last = Some(state);
            }
        })
        .context("failed to spawn state printer")?;
    Ok(())
}

fn describe_transition(
    previous: Option<&WorkflowState>,
    next: &WorkflowState,
    catalog: &ActionCatalog,
) -> Option<String> {
    let previous = previous?;
    if previous == next {
        return None;
    }
    if next.upload_error != previous.upload_error {
        if let Some(message) = next.upload_error.as_deref() {
            return Some(format!("{message} (current request continues)"));
        }
    }
    match next.phase() {
        WorkflowPhase::Previewing => Some(format!("Analyzing {}...", file_label(next))),
        WorkflowPhase::Requesting => {
            let preview = next.preview.as_ref()?;
            let size = preview
                .dimensions
                .map(|(width, height)| format!("{width}x{height}, "))
                .unwrap_or_default();
            Some(format!(
                "Preview ready ({size}sha256 {}). Waiting for the prediction server...",
                preview.short_fingerprint()
            ))
        }
        WorkflowPhase::Succeeded => {
            let rendered = format_results(&render_results(&next.predictions, catalog));
            Some(rendered.trim_end().to_string())
        }
        WorkflowPhase::Failed => next
            .error_message
            .as_ref()
            .map(|message| format!("Error: {message}")),
        WorkflowPhase::Idle => {
            if previous.phase() == WorkflowPhase::Idle {
                None
            } else if next.file.is_some() {
                Some("No predictions returned.".to_string())
            } else {
                Some("Cleared.".to_string())
            }
        }
    }
}

fn file_label(state: &WorkflowState) -> String {
    state
        .file
        .as_ref()
        .map(|file| format!("{} ({} bytes)", file.name, file.size()))
        .unwrap_or_else(|| "upload".to_string())
}

fn status_line(state: &WorkflowState) -> String {
    let mut parts = vec![format!("phase={}", state.phase().as_str())];
    if let Some(file) = state.file.as_ref() {
        parts.push(format!("file={}", file.name));
    }
    if let Some(preview) = state.preview.as_ref() {
        parts.push(format!("sha256={}", preview.short_fingerprint()));
    }
    if let Some(top) = state.predictions.top() {
        parts.push(format!("top={} ({:.1}%)", top.action, top.confidence));
    }
    if let Some(message) = state.error_message.as_deref() {
        parts.push(format!("error={message:?}"));
    }
    parts.join(" ")
}

fn format_results(view: &ResultsView) -> String {
    let Some(headline) = view.headline.as_ref() else {
        return "No predictions returned.\n".to_string();
    };
    let mut out = format!(
        "Top prediction: {} {} {} ({} confidence)\n",
        headline.glyph,
        headline.label,
        headline.confidence_text(),
        headline.band.as_str()
    );
    for row in &view.ranked {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out
}

fn format_row(row: &ResultRow) -> String {
    format!(
        "  {}. {} {:<24} {:>6}",
        row.rank,
        row.glyph,
        row.label,
        row.confidence_text()
    )
}

fn format_catalog(catalog: &ActionCatalog, query: Option<&str>) -> String {
    let matches = catalog.search(query.unwrap_or_default());
    if matches.is_empty() {
        return format!(
            "No actions match {:?}.\n",
            query.unwrap_or_default().trim()
        );
    }
    let mut out = String::new();
    for spec in &matches {
        out.push_str(&format!("{} {:<22} {}\n", spec.glyph, spec.name, spec.label));
    }
    out.push_str(&format!("{} of {} actions\n", matches.len(), catalog.len()));
    out
}

fn format_health(health: &HealthStatus) -> String {
    let mut text = format!(
        "status={} model_loaded={} num_classes={}",
        health.status, health.model_loaded, health.num_classes
    );
    if let Some(path) = health.model_path.as_deref() {
        text.push_str(&format!(" model_path={path}"));
    }
    text
}

fn results_json(state: &WorkflowState, view: &ResultsView) -> Value {
    json!({
        "success": true,
        "file": state.file.as_ref().map(|file| file.name.clone()),
        "fingerprint": state.preview.as_ref().map(|preview| preview.fingerprint.clone()),
        "dimensions": state
            .preview
            .as_ref()
            .and_then(|preview| preview.dimensions)
            .map(|(width, height)| json!([width, height])),
        "headline": view.headline,
        "ranked": view.ranked,
        "predictions": state.predictions,
    })
}

fn session_payload(mode: &str, config: &ClientConfig) -> Map<String, Value> {
    to_payload(json!({
        "mode": mode,
        "endpoint": config.endpoint,
        "timeout_seconds": config.timeout.as_secs_f64(),
    }))
}

fn to_payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

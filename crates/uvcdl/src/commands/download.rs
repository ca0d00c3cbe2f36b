//! The `download` command: resolve the time range, run the pipeline, and
//! render the run summary.

use std::io::IsTerminal;
use std::time::Duration;

use bytesize::ByteSize;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use uvcdl_core::{
    DownloadEvent, DownloadResult, DownloadStatus, Pipeline, PlannedSegment, RunRequest,
    RunSummary, TimeRange,
};

use crate::cli::{DownloadArgs, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Palette};
use crate::timezone;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Cause")]
    cause: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "File")]
    file: String,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Cause")]
    cause: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Path")]
    path: String,
}

fn local(t: DateTime<Utc>, tz: Tz) -> String {
    t.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn size(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| "-".into(), |b| ByteSize::b(b).to_string())
}

fn status_label(status: &DownloadStatus, palette: Palette) -> String {
    match status {
        DownloadStatus::Success => palette.success("downloaded"),
        DownloadStatus::Skipped(reason) => palette.warning(&format!("skipped: {reason}")),
        DownloadStatus::Failed(reason) => palette.failure(&format!("failed: {reason}")),
    }
}

fn result_row(r: &DownloadResult, tz: Tz, palette: Palette) -> ResultRow {
    let bytes = if r.bytes > 0 {
        Some(r.bytes)
    } else {
        r.segment.size_hint
    };
    ResultRow {
        start: local(r.segment.start, tz),
        end: local(r.segment.end, tz),
        cause: r.segment.cause.to_string(),
        size: size(bytes),
        status: status_label(&r.status, palette),
        file: r
            .local_path
            .as_deref()
            .and_then(|p| p.file_name())
            .map_or_else(|| "-".into(), |n| n.to_string_lossy().into_owned()),
    }
}

fn plan_row(p: &PlannedSegment, tz: Tz) -> PlanRow {
    PlanRow {
        start: local(p.segment.start, tz),
        end: local(p.segment.end, tz),
        cause: p.segment.cause.to_string(),
        size: size(p.segment.size_hint),
        path: p.path.display().to_string(),
    }
}

// ── Progress ────────────────────────────────────────────────────────

/// Progress bar fed by the download manager's event channel.
struct Progress {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl Progress {
    fn spawn(mut events: broadcast::Receiver<DownloadEvent>) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));

        let handle = bar.clone();
        let task = tokio::spawn(async move {
            let mut written = 0_u64;
            loop {
                match events.recv().await {
                    Ok(event) => apply_event(&handle, &mut written, event),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { bar, task }
    }

    fn finish(self) {
        self.task.abort();
        self.bar.finish_and_clear();
    }
}

fn apply_event(bar: &ProgressBar, written: &mut u64, event: DownloadEvent) {
    match event {
        DownloadEvent::Planned { total } => {
            bar.set_length(u64::try_from(total).unwrap_or(u64::MAX));
        }
        DownloadEvent::Progress { bytes, .. } => {
            *written = written.saturating_add(bytes);
            bar.set_message(ByteSize::b(*written).to_string());
        }
        DownloadEvent::Retrying {
            segment,
            attempt,
            delay,
            error,
        } => {
            let delay = Duration::from_millis(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
            bar.println(format!(
                "  retrying {segment} in {} (attempt {attempt} failed: {error})",
                humantime::format_duration(delay)
            ));
        }
        DownloadEvent::Finished { segment, status, .. } => {
            if let DownloadStatus::Failed(reason) = status {
                bar.println(format!("  ✗ {segment}: {reason}"));
            }
            bar.inc(1);
        }
        DownloadEvent::Started { .. } => {}
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn render_summary(
    summary: &RunSummary,
    format: OutputFormat,
    tz: Tz,
    palette: Palette,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(summary)?),
        OutputFormat::Plain if summary.dry_run => Ok(summary
            .planned
            .iter()
            .map(|p| p.path.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Plain => Ok(summary
            .results
            .iter()
            .filter_map(|r| r.local_path.as_ref())
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")),
        OutputFormat::Table => Ok(render_table(summary, tz, palette)),
    }
}

fn render_table(summary: &RunSummary, tz: Tz, palette: Palette) -> String {
    let camera = &summary.camera.display_name;
    let range = format!(
        "{} .. {} {}",
        local(summary.range.start(), tz),
        local(summary.range.end(), tz),
        tz.name()
    );

    if summary.dry_run {
        let rows: Vec<PlanRow> = summary.planned.iter().map(|p| plan_row(p, tz)).collect();
        let hinted: u64 = summary.planned.iter().filter_map(|p| p.segment.size_hint).sum();
        let mut out = output::render_table(&rows);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!(
            "{} {camera}: {} recordings would be downloaded ({}) for {range}",
            palette.warning("dry run"),
            summary.planned.len(),
            ByteSize::b(hinted),
        ));
        return out;
    }

    let rows: Vec<ResultRow> = summary
        .results
        .iter()
        .map(|r| result_row(r, tz, palette))
        .collect();
    let mut out = output::render_table(&rows);
    if !out.is_empty() {
        out.push('\n');
    }

    let counts = format!(
        "{} downloaded, {} failed, {} skipped",
        summary.succeeded(),
        summary.failed(),
        summary.skipped()
    );
    let counts = if summary.is_success() {
        palette.success(&counts)
    } else {
        palette.failure(&counts)
    };
    let elapsed = Duration::from_secs(summary.elapsed.as_secs());
    out.push_str(&format!(
        "{camera}: {counts} {}",
        palette.dim(&format!(
            "({} in {}, {range})",
            ByteSize::b(summary.total_bytes()),
            humantime::format_duration(elapsed)
        ))
    ));

    for (result, reason) in summary.failures() {
        out.push_str(&format!(
            "\n  {} {}: {reason}",
            palette.failure("✗"),
            result.segment_id()
        ));
    }
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DownloadArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = uvcdl_config::load_config()?;

    // Times are validated before any credential lookup or prompt.
    let tz_name = args
        .timezone
        .clone()
        .unwrap_or_else(|| cfg.defaults.timezone.clone());
    let tz = timezone::resolve_timezone(&tz_name)?;
    let start = timezone::parse_local("start-time", &args.start, tz)?;
    let end = timezone::parse_local("end-time", &args.end, tz)?;
    let range = TimeRange::new(start, end)?;

    let (profile_name, controller) = config::controller_config(global, &cfg)?;
    let download = config::download_config(&args, &cfg);
    info!(
        camera = %args.camera,
        %start,
        %end,
        timezone = tz.name(),
        output_dir = %download.output_dir.display(),
        max_connections = download.max_connections,
        "starting run"
    );

    let pipeline = Pipeline::connect(&controller, download)?;
    let request = RunRequest {
        camera_name: args.camera.clone(),
        range,
        dry_run: args.dry_run,
    };

    let show_progress = !args.no_progress
        && !args.dry_run
        && !global.quiet
        && std::io::stderr().is_terminal();
    let progress = show_progress.then(|| Progress::spawn(pipeline.subscribe()));

    let cancel = CancellationToken::new();
    let interrupt = super::cancel_on_interrupt(cancel.clone());
    let result = pipeline.run(&request, &cancel).await;
    interrupt.abort();
    if let Some(progress) = progress {
        progress.finish();
    }

    let summary = result.map_err(|e| CliError::from(e).for_profile(&profile_name))?;

    let palette = Palette::new(global.color);
    let out = render_summary(&summary, global.format, tz, palette)?;
    output::print_output(&out, global.quiet);

    if cancel.is_cancelled() {
        return Err(CliError::Cancelled);
    }
    if !summary.is_success() {
        return Err(CliError::PartialFailure {
            failed: summary.failed(),
            total: summary.results.len(),
        });
    }
    Ok(())
}

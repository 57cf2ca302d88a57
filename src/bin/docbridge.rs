//! CLI binary for docbridge.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConverterConfig`, runs one conversion per input and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docbridge::{
    copy_atomic, ConversionOutcome, ConversionProgressCallback, Converter, ConverterConfig,
    DocBridgeError, Format, FormatRegistry, ProgressCallback, SofficeEngine,
};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all inputs, plus a log line per
/// engine hop. Requests may finish out of order when `--max-engines > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, request: &str, source: Format, target: Format) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(request),
            dim(&format!("{source} → {target}"))
        ));
    }

    fn on_hop_start(&self, request: &str, hop: usize, target: Format) {
        self.bar.set_message(format!("{request}: hop {hop} → {target}"));
    }

    fn on_hop_complete(&self, _request: &str, hop: usize, target: Format, verified: bool) {
        let mark = if verified { green("✓") } else { red("✗") };
        self.bar.println(format!(
            "    {mark} hop {hop} → {target}  {}",
            dim(if verified { "artifact found" } else { "no artifact" })
        ));
    }

    fn on_conversion_complete(&self, request: &str, error: Option<&str>) {
        if let Some(e) = error {
            self.bar.println(format!("    {} {}: {}", red("✗"), request, dim(e)));
        }
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Word to PDF
  docbridge report.docx --to pdf

  # Word to PowerPoint, copying the result next to the input
  docbridge notes.docx --to pptx -o notes.pptx

  # Several files at once, two engine instances with separate profiles
  docbridge *.pdf --to docx -o converted/ --max-engines 2 \
      --engine-arg '-env:UserInstallation=file:///tmp/lo-$$'

  # Show the conversion table
  docbridge --formats

  # Delete staged uploads and outputs older than a day
  docbridge --sweep 86400

SUPPORTED CONVERSIONS:
  docx → pdf, pptx   (pptx falls back to docx → pdf → pptx)
  pdf  → docx, pptx
  pptx → pdf

ENVIRONMENT VARIABLES:
  DOCBRIDGE_ENGINE        Path to soffice (default: soffice on PATH)
  DOCBRIDGE_UPLOAD_DIR    Staging directory for inputs (default: uploads)
  DOCBRIDGE_OUTPUT_DIR    Directory the engine writes into (default: outputs)
  RUST_LOG                Override log filtering (e.g. docbridge=debug)
"#;

/// Convert office documents between docx, pdf and pptx via headless LibreOffice.
#[derive(Parser, Debug)]
#[command(
    name = "docbridge",
    version,
    about = "Convert office documents between docx, pdf and pptx via headless LibreOffice",
    long_about = "Convert office documents between docx, pdf and pptx using a headless \
LibreOffice engine. Success is judged by the artifact the engine leaves behind, never by its \
exit code; docx → pptx falls back to a docx → pdf → pptx bridge when the direct route fails.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Documents to convert (.docx, .pdf, .pptx).
    #[arg(required_unless_present_any = ["formats", "sweep", "check"])]
    inputs: Vec<PathBuf>,

    /// Target format: docx, pdf or pptx.
    #[arg(short, long, env = "DOCBRIDGE_TARGET", required_unless_present_any = ["formats", "sweep", "check"])]
    to: Option<String>,

    /// Copy results here: a file for a single input, a directory otherwise.
    #[arg(short, long, env = "DOCBRIDGE_OUTPUT")]
    output: Option<PathBuf>,

    /// Conversion engine executable.
    #[arg(long, env = "DOCBRIDGE_ENGINE", default_value = "soffice")]
    engine: PathBuf,

    /// Extra engine argument placed before --headless (repeatable).
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Staging directory for inputs.
    #[arg(long, env = "DOCBRIDGE_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory the engine writes into.
    #[arg(long, env = "DOCBRIDGE_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Maximum simultaneously running engine processes.
    #[arg(long, env = "DOCBRIDGE_MAX_ENGINES", default_value_t = 1)]
    max_engines: usize,

    /// Per-invocation engine timeout in seconds.
    #[arg(long, env = "DOCBRIDGE_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Keep the intermediate file of a bridged conversion.
    #[arg(long, env = "DOCBRIDGE_KEEP_INTERMEDIATES")]
    keep_intermediates: bool,

    /// Accept zero-byte engine output as a successful conversion.
    #[arg(long, env = "DOCBRIDGE_ALLOW_EMPTY")]
    allow_empty: bool,

    /// Print results as JSON.
    #[arg(long, env = "DOCBRIDGE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCBRIDGE_NO_PROGRESS")]
    no_progress: bool,

    /// Print the conversion table and exit.
    #[arg(long)]
    formats: bool,

    /// Check that the engine can be launched and exit.
    #[arg(long)]
    check: bool,

    /// Delete staged and converted files older than this many seconds, then exit.
    #[arg(long, value_name = "SECS")]
    sweep: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCBRIDGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCBRIDGE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers what INFO logs would say; keep them quiet
    // unless asked.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inputs.is_empty();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Table mode ───────────────────────────────────────────────────────
    if cli.formats {
        print_formats(FormatRegistry::standard(), cli.json)?;
        return Ok(());
    }

    // ── Engine check ─────────────────────────────────────────────────────
    if cli.check {
        let engine = SofficeEngine::new(&cli.engine, cli.engine_args.clone(), cli.timeout);
        if engine.health_check().await {
            println!("{} engine '{}' is available", green("✔"), cli.engine.display());
            return Ok(());
        }
        anyhow::bail!("engine '{}' could not be launched", cli.engine.display());
    }

    let mut builder = ConverterConfig::builder()
        .engine_path(&cli.engine)
        .upload_dir(&cli.upload_dir)
        .output_dir(&cli.output_dir)
        .max_concurrent_engines(cli.max_engines)
        .engine_timeout_secs(cli.timeout)
        .reject_empty_artifacts(!cli.allow_empty)
        .keep_intermediates(cli.keep_intermediates);
    for arg in &cli.engine_args {
        builder = builder.engine_arg(arg);
    }

    // ── Sweep mode ───────────────────────────────────────────────────────
    if let Some(secs) = cli.sweep {
        let config = builder.build().context("Invalid configuration")?;
        let converter = Converter::new(config);
        let report = converter
            .store()
            .sweep(Duration::from_secs(secs))
            .await
            .context("Sweep failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else if !cli.quiet {
            eprintln!(
                "{} removed {} files  {}",
                green("✔"),
                bold(&report.removed.len().to_string()),
                dim(&format!("({} kept, {} failed)", report.kept, report.failed))
            );
        }
        return Ok(());
    }

    // ── Conversion ───────────────────────────────────────────────────────
    let target = cli.to.clone().unwrap_or_default();
    let progress = if show_progress {
        Some(CliProgressCallback::new(cli.inputs.len()))
    } else {
        None
    };
    if let Some(ref cb) = progress {
        builder = builder.progress_callback(Arc::clone(cb) as ProgressCallback);
    }

    let config = builder.build().context("Invalid configuration")?;
    let concurrency = config.max_concurrent_engines;
    let converter = Arc::new(Converter::new(config));
    converter
        .prepare()
        .await
        .context("Failed to create artifact directories")?;

    let multi = cli.inputs.len() > 1;
    let mut results: Vec<(usize, PathBuf, Result<ConversionOutcome, DocBridgeError>)> =
        stream::iter(cli.inputs.iter().cloned().enumerate().map(|(idx, input)| {
            let converter = Arc::clone(&converter);
            let target = target.clone();
            async move {
                let result = converter.convert_file(&input, &target).await;
                (idx, input, result)
            }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;
    // Report (and number duplicate names) in command-line order.
    results.sort_by_key(|(idx, _, _)| *idx);

    if let Some(ref cb) = progress {
        cb.finish();
    }

    // ── Copy out ─────────────────────────────────────────────────────────
    let destinations = match &cli.output {
        Some(out) => {
            let names: Vec<Option<&str>> = results
                .iter()
                .map(|(_, _, r)| r.as_ref().ok().map(|o| o.download_name.as_str()))
                .collect();
            plan_destinations(out, &names, multi)
        }
        None => vec![None; results.len()],
    };

    let outcomes: Vec<Option<&ConversionOutcome>> =
        results.iter().map(|(_, _, r)| r.as_ref().ok()).collect();
    let deliveries = deliver(&outcomes, destinations).await;

    // ── Report ───────────────────────────────────────────────────────────
    let failed = results
        .iter()
        .zip(&deliveries)
        .filter(|((_, _, r), d)| r.is_err() || matches!(d, Delivery::Failed { .. }))
        .count();

    if cli.json {
        let items: Vec<_> = results
            .iter()
            .zip(&deliveries)
            .map(|((_, input, result), delivery)| match (result, delivery) {
                (Ok(outcome), Delivery::Failed { dest, error }) => json!({
                    "input": input,
                    "ok": false,
                    "outcome": outcome,
                    "error": {
                        "code": "copy_failed",
                        "message": format!("Failed to copy result to {}: {error}", dest.display()),
                        "client_error": false,
                    },
                }),
                (Ok(outcome), delivery) => {
                    let delivered_to = match delivery {
                        Delivery::Copied(dest) => Some(dest),
                        _ => None,
                    };
                    let headers: BTreeMap<String, String> = outcome
                        .headers()
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect();
                    json!({
                        "input": input,
                        "ok": true,
                        "outcome": outcome,
                        "headers": headers,
                        "delivered_to": delivered_to,
                    })
                }
                (Err(e), _) => json!({
                    "input": input,
                    "ok": false,
                    "error": {
                        "code": e.reason_code(),
                        "message": e.to_string(),
                        "client_error": e.is_client_error(),
                    },
                }),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&items).context("Failed to serialise results")?
        );
    } else {
        for ((_, input, result), delivery) in results.iter().zip(&deliveries) {
            match (result, delivery) {
                (Ok(_), Delivery::Failed { dest, error }) => {
                    eprintln!(
                        "{} {}  {}  {}",
                        red("✘"),
                        input.display(),
                        red(&format!("converted, but copying to {} failed: {error}", dest.display())),
                        dim("[copy_failed]"),
                    );
                }
                (Ok(outcome), delivery) => {
                    // The artifact path goes to stdout so it can be piped.
                    let shown = match delivery {
                        Delivery::Copied(dest) => dest.as_path(),
                        _ => outcome.artifact.as_path(),
                    };
                    println!("{}", shown.display());
                    if !cli.quiet {
                        eprintln!(
                            "{} {}  →  {}  {}",
                            green("✔"),
                            input.display(),
                            bold(&outcome.download_name),
                            dim(&format!(
                                "{:?}, {} hop(s), {}ms",
                                outcome.route,
                                outcome.engine_invocations(),
                                outcome.duration_ms
                            )),
                        );
                    }
                }
                (Err(e), _) => {
                    eprintln!(
                        "{} {}  {}  {}",
                        red("✘"),
                        input.display(),
                        red(&e.to_string()),
                        dim(&format!("[{}]", e.reason_code())),
                    );
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", results.len());
    }
    Ok(())
}

/// What happened to a result after conversion.
enum Delivery {
    /// No `-o`, or the conversion failed: the artifact stays in the output dir.
    InPlace,
    Copied(PathBuf),
    Failed { dest: PathBuf, error: DocBridgeError },
}

/// Copy each successful result to its planned destination. A failed copy is
/// recorded against its input and does not stop the others.
async fn deliver(
    outcomes: &[Option<&ConversionOutcome>],
    destinations: Vec<Option<PathBuf>>,
) -> Vec<Delivery> {
    let mut deliveries = Vec::with_capacity(outcomes.len());
    for (outcome, dest) in outcomes.iter().zip(destinations) {
        let delivery = match (outcome, dest) {
            (Some(outcome), Some(dest)) => match copy_atomic(&outcome.artifact, &dest).await {
                Ok(()) => Delivery::Copied(dest),
                Err(error) => Delivery::Failed { dest, error },
            },
            _ => Delivery::InPlace,
        };
        deliveries.push(delivery);
    }
    deliveries
}

/// Resolve where a result is copied: into `out` when it is (or must be) a
/// directory, otherwise to `out` itself.
fn destination(out: &Path, download_name: &str, multi: bool) -> PathBuf {
    if multi || out.is_dir() {
        out.join(download_name)
    } else {
        out.to_path_buf()
    }
}

/// Destinations for every result, in order. Names repeated within one run
/// are numbered `report (2).pdf`, `report (3).pdf`, … so no copy overwrites
/// another. `None` entries (failed conversions) stay `None`.
fn plan_destinations(out: &Path, names: &[Option<&str>], multi: bool) -> Vec<Option<PathBuf>> {
    let mut taken = HashSet::new();
    names
        .iter()
        .map(|name| {
            let name = (*name)?;
            let mut dest = destination(out, name, multi);
            let mut n = 2;
            while taken.contains(&dest) {
                dest = dest.with_file_name(numbered(name, n));
                n += 1;
            }
            taken.insert(dest.clone());
            Some(dest)
        })
        .collect()
}

fn numbered(name: &str, n: usize) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    }
}

/// Print the registry's direct edges and bridges.
fn print_formats(registry: &FormatRegistry, as_json: bool) -> Result<()> {
    if as_json {
        let edges: Vec<_> = registry
            .edges()
            .into_iter()
            .map(|(s, t)| json!({ "source": s, "target": t }))
            .collect();
        let bridges: Vec<_> = registry
            .bridges()
            .into_iter()
            .map(|(s, t, via)| json!({ "source": s, "target": t, "via": via }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "edges": edges, "bridges": bridges }))
                .context("Failed to serialise registry")?
        );
        return Ok(());
    }

    println!("{}", bold("Direct conversions"));
    for (s, t) in registry.edges() {
        println!("  {s:<5} → {t}");
    }
    println!("{}", bold("Fallback bridges"));
    for (s, t, via) in registry.bridges() {
        println!("  {s:<5} → {t}  {}", dim(&format!("via {via}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_basic_invocation() {
        let cli = Cli::try_parse_from(["docbridge", "report.docx", "--to", "pdf"]).unwrap();
        assert_eq!(cli.inputs, vec![PathBuf::from("report.docx")]);
        assert_eq!(cli.to.as_deref(), Some("pdf"));
        assert_eq!(cli.max_engines, 1);
    }

    #[test]
    fn cli_formats_needs_no_inputs() {
        let cli = Cli::try_parse_from(["docbridge", "--formats"]).unwrap();
        assert!(cli.formats);
        assert!(cli.inputs.is_empty());
    }

    #[test]
    fn cli_engine_args_accept_hyphens() {
        let cli = Cli::try_parse_from([
            "docbridge",
            "a.pdf",
            "--to",
            "docx",
            "--engine-arg",
            "-env:UserInstallation=file:///tmp/lo",
        ])
        .unwrap();
        assert_eq!(cli.engine_args, vec!["-env:UserInstallation=file:///tmp/lo"]);
    }

    #[test]
    fn repeated_names_are_numbered() {
        let out = Path::new("converted");
        let dests = plan_destinations(
            out,
            &[Some("report.pdf"), None, Some("report.pdf"), Some("notes.pdf"), Some("report.pdf")],
            true,
        );
        assert_eq!(
            dests,
            vec![
                Some(PathBuf::from("converted/report.pdf")),
                None,
                Some(PathBuf::from("converted/report (2).pdf")),
                Some(PathBuf::from("converted/notes.pdf")),
                Some(PathBuf::from("converted/report (3).pdf")),
            ]
        );
    }

    fn outcome_for(artifact: PathBuf) -> ConversionOutcome {
        ConversionOutcome {
            artifact,
            download_name: "report.pdf".into(),
            media_type: Format::Pdf.media_type().into(),
            source: Format::Docx,
            target: Format::Pdf,
            route: docbridge::RouteTaken::Direct,
            attempts: Vec::new(),
            duration_ms: 1,
        }
    }

    #[tokio::test]
    async fn duplicate_names_survive_copy_out() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a_report.pdf");
        let b = dir.path().join("b_report.pdf");
        std::fs::write(&a, b"A").unwrap();
        std::fs::write(&b, b"B").unwrap();
        let out = dir.path().join("out");

        let (oa, ob) = (outcome_for(a), outcome_for(b));
        let dests = plan_destinations(&out, &[Some("report.pdf"), Some("report.pdf")], true);
        let deliveries = deliver(&[Some(&oa), Some(&ob)], dests).await;

        assert!(deliveries.iter().all(|d| matches!(d, Delivery::Copied(_))));
        assert_eq!(std::fs::read(out.join("report.pdf")).unwrap(), b"A");
        assert_eq!(std::fs::read(out.join("report (2).pdf")).unwrap(), b"B");
    }

    #[tokio::test]
    async fn copy_failure_is_recorded_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a_report.pdf");
        std::fs::write(&a, b"A").unwrap();
        // `-o` names a regular file although several inputs need a directory.
        let out = dir.path().join("out2");
        std::fs::write(&out, b"not a dir").unwrap();

        let oa = outcome_for(a);
        let dests = vec![Some(out.join("report.pdf")), None];
        let deliveries = deliver(&[Some(&oa), None], dests).await;

        assert_eq!(deliveries.len(), 2);
        assert!(matches!(
            &deliveries[0],
            Delivery::Failed { error, .. } if error.reason_code() == "artifact_io"
        ));
        assert!(matches!(deliveries[1], Delivery::InPlace));
    }

    #[test]
    fn numbered_keeps_extension() {
        assert_eq!(numbered("report.pdf", 2), "report (2).pdf");
        assert_eq!(numbered("notes.v2.pptx", 3), "notes.v2 (3).pptx");
        assert_eq!(numbered("README", 2), "README (2)");
    }

    #[test]
    fn destination_for_single_file() {
        let d = destination(Path::new("/tmp/does-not-exist/out.pdf"), "report.pdf", false);
        assert_eq!(d, PathBuf::from("/tmp/does-not-exist/out.pdf"));
        let d = destination(Path::new("converted"), "report.pdf", true);
        assert_eq!(d, PathBuf::from("converted/report.pdf"));
    }
}

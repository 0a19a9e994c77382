use crate::{
    api::{Backend, ClassificationResult, HttpBackend},
    config::Config,
    job::{JobClient, JobSession},
    observer::{ConsoleObserver, JobObserver, PlainObserver},
    poll_policy::PollPolicy,
    report::{artifact_name, render_text, JobSummary},
    request::{ClassificationRequest, InputSource},
    settings::load_settings,
    upload::upload_csv,
    util::{ensure_dir, now_rfc3339, read_keywords},
};
use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "keyword-client")]
#[command(about = "Upload keywords, run a classification job and collect the results")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./keyword-client.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Backend API base URL, e.g. http://localhost:5000/api.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check backend and model availability.
    Doctor {},
    /// Show the default threshold, categories and instructions.
    Settings {},
    /// Validate and upload a CSV; prints the server-side path.
    Upload {
        #[arg(long)]
        input: PathBuf,
    },
    /// Submit a job, follow it to the end and fetch results.
    Run(RunArgs),
    /// Print one progress snapshot.
    Status {
        #[arg(long)]
        job_id: String,
    },
    /// Follow an already started job.
    Watch {
        #[arg(long)]
        job_id: String,
        #[arg(long)]
        out_dir: Option<PathBuf>,
        #[arg(long)]
        plain: bool,
    },
    /// Fetch and print results of a completed job.
    Results {
        #[arg(long)]
        job_id: String,
    },
    /// Download a result artifact.
    Download {
        #[arg(long)]
        filename: String,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[arg(long)]
    pub topic: String,

    /// CSV with title, views, views_per_year columns.
    #[arg(long, conflicts_with_all = ["keywords", "filepath"])]
    pub input: Option<PathBuf>,

    /// File with one keyword per line (`-` for stdin).
    #[arg(long, conflicts_with = "filepath")]
    pub keywords: Option<PathBuf>,

    /// Server-side path from an earlier `upload`.
    #[arg(long)]
    pub filepath: Option<String>,

    /// Replace the category list.
    #[arg(long = "category")]
    pub categories: Vec<String>,

    #[arg(long = "add-category")]
    pub add_categories: Vec<String>,

    #[arg(long = "remove-category")]
    pub remove_categories: Vec<String>,

    /// Confidence threshold in percent (0-100).
    #[arg(long)]
    pub threshold: Option<u32>,

    /// File with classification instructions.
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Skip downloading the accepted/rejected files.
    #[arg(long)]
    pub no_download: bool,

    /// Only print the outcome, no live console.
    #[arg(long)]
    pub plain: bool,
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let mut cfg = match &cfg_path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };
    if let Some(url) = &args.base_url {
        cfg.backend.base_url = url.clone();
    }

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    if let Some(p) = &cfg_path {
        info!("config {}", p.display());
    }

    let backend = HttpBackend::new(&cfg).context("building HTTP client")?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg, &backend).await,
        Command::Settings {} => {
            let settings = load_settings(&cfg, &backend).await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Upload { input } => {
            let uploaded = upload_csv(&cfg, &backend, input).await?;
            println!("{}", serde_json::to_string_pretty(&uploaded)?);
            Ok(())
        }
        Command::Run(run_args) => run(&cfg, backend, run_args).await,
        Command::Status { job_id } => {
            let snapshot = backend.progress(job_id).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Command::Watch {
            job_id,
            out_dir,
            plain,
        } => {
            let client = JobClient::new(backend, PollPolicy::from_config(&cfg.polling));
            let mut session = JobSession::attach(job_id.clone());
            let cancel = interrupt_token();
            let started = now_rfc3339();
            let result = follow(&cfg, &client, &mut session, &cancel, *plain).await?;
            let ctx = FinishCtx {
                topic: "",
                started,
                out_override: out_dir.as_deref(),
                no_download: false,
            };
            finish(&cfg, &client, &session, &result, ctx, &cancel).await
        }
        Command::Results { job_id } => {
            let result = backend.results(job_id).await?;
            println!("{}", render_text(&result));
            Ok(())
        }
        Command::Download { filename, out_dir } => {
            let dir = out_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(&cfg.output.download_dir));
            let path = download_artifact(&backend, filename, &dir).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("keyword-client.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.output.download_dir).join("keyword-client.log"))
}

async fn doctor(cfg: &Config, backend: &HttpBackend) -> Result<()> {
    let report = match backend.health().await {
        Ok(h) => serde_json::json!({
            "base_url": backend.base_url().as_str(),
            "backend_online": true,
            "ollama_available": h.ollama_available,
            "models": h.models,
        }),
        Err(err) => {
            warn!("backend unreachable at {}: {err}", cfg.backend.base_url);
            serde_json::json!({
                "base_url": backend.base_url().as_str(),
                "backend_online": false,
                "ollama_available": serde_json::Value::Null,
                "error": err.to_string(),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn build_request<B: Backend>(
    cfg: &Config,
    backend: &B,
    args: &RunArgs,
) -> Result<ClassificationRequest> {
    let settings = load_settings(cfg, backend).await?;

    let mut categories = if args.categories.is_empty() {
        settings.categories
    } else {
        crate::categories::CategorySet::from_labels(&args.categories)?
    };
    for label in &args.add_categories {
        categories.add(label)?;
    }
    for label in &args.remove_categories {
        categories.remove(label)?;
    }

    let classification_prompt = match &args.prompt_file {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("reading prompt file: {}", p.display()))?,
        None => settings.classification_prompt,
    };

    let input = if let Some(path) = &args.filepath {
        Some(InputSource::UploadedFile {
            filepath: path.clone(),
        })
    } else if let Some(path) = &args.keywords {
        Some(InputSource::Inline {
            keywords: read_keywords(path)?,
        })
    } else {
        None
    };

    Ok(ClassificationRequest {
        topic: args.topic.clone(),
        confidence_threshold: args.threshold.unwrap_or(settings.confidence_threshold),
        categories,
        classification_prompt,
        input,
    })
}

async fn run(cfg: &Config, backend: HttpBackend, args: &RunArgs) -> Result<()> {
    let mut request = build_request(cfg, &backend, args).await?;
    if args.input.is_some() {
        request.validate_form()?;
    } else {
        request.validate()?;
    }

    if let Some(csv) = &args.input {
        let uploaded = upload_csv(cfg, &backend, csv).await?;
        info!(
            "uploaded {} as {} ({} keywords)",
            csv.display(),
            uploaded.filepath,
            uploaded
                .keyword_count
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".into())
        );
        request.input = Some(uploaded.input_source());
    }

    let client = JobClient::new(backend, PollPolicy::from_config(&cfg.polling));
    let cancel = interrupt_token();
    let started = now_rfc3339();
    let mut session = client.submit(&request).await?;
    let result = follow(cfg, &client, &mut session, &cancel, args.plain).await?;
    let ctx = FinishCtx {
        topic: request.topic.trim(),
        started,
        out_override: args.out_dir.as_deref(),
        no_download: args.no_download,
    };
    finish(cfg, &client, &session, &result, ctx, &cancel).await
}

// Once installed, the Ctrl-C handler replaces the default exit for the rest
// of the process, so the token covers polling and the downloads after it.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    cancel
}

async fn follow<B: Backend>(
    cfg: &Config,
    client: &JobClient<B>,
    session: &mut JobSession,
    cancel: &CancellationToken,
    plain: bool,
) -> Result<ClassificationResult> {
    let mut observer: Box<dyn JobObserver> = if plain || !cfg.console.enhanced {
        Box::new(PlainObserver)
    } else {
        Box::new(ConsoleObserver::new(cfg.console.max_lines))
    };

    Ok(client
        .await_completion(session, cancel, observer.as_mut())
        .await?)
}

struct FinishCtx<'a> {
    topic: &'a str,
    started: String,
    out_override: Option<&'a Path>,
    no_download: bool,
}

async fn finish<B: Backend>(
    cfg: &Config,
    client: &JobClient<B>,
    session: &JobSession,
    result: &ClassificationResult,
    ctx: FinishCtx<'_>,
    cancel: &CancellationToken,
) -> Result<()> {
    println!("{}", render_text(result));

    let out_dir = ctx
        .out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.output.download_dir))
        .join(session.job_id());

    if cfg.output.download_artifacts && !ctx.no_download {
        for path in download_artifacts(client.backend(), result, &out_dir, cancel).await {
            println!("saved {}", path.display());
        }
    }

    if cfg.output.write_summary_json {
        ensure_dir(&out_dir)?;
        let summary = JobSummary::new(session.job_id(), ctx.topic, ctx.started, now_rfc3339(), result);
        let path = out_dir.join(&cfg.output.summary_filename);
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("summary written to {}", path.display());
    }
    Ok(())
}

// Stops at the first artifact still in flight when `cancel` fires.
async fn download_artifacts<B: Backend + ?Sized>(
    backend: &B,
    result: &ClassificationResult,
    out_dir: &Path,
    cancel: &CancellationToken,
) -> Vec<PathBuf> {
    let mut saved = Vec::new();
    for server_path in [&result.accepted_file, &result.rejected_file] {
        let name = artifact_name(server_path);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("download of {name} interrupted");
                break;
            }
            res = download_artifact(backend, name, out_dir) => res,
        };
        match outcome {
            Ok(path) => saved.push(path),
            Err(err) => warn!("download of {name} failed: {err:#}"),
        }
    }
    saved
}

async fn download_artifact<B: Backend + ?Sized>(
    backend: &B,
    filename: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let name = artifact_name(filename);
    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!("invalid artifact name: {filename}"));
    }
    let bytes = backend
        .download(name)
        .await
        .with_context(|| format!("downloading {name}"))?;
    ensure_dir(dir)?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

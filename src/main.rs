use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cdp_adapter::{Cdp, ChromiumCdpAdapter};
use chat_targets::{ChatTarget, TargetKind, TracingNotifier};
use chatrelay_cli::{
    capture_active_page, resolve_prompt, AppConfig, CdpSurfaceOpener, Relay, SendOutcome,
    SendRequest,
};
use chatrelay_core_types::PageSnapshot;
use clap::{Args, Parser, Subcommand};
use message_compose::{Composition, SendMode};
use serde_json::{json, Value};
use settings_store::{Settings, SettingsStore, Template};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for a send that ran but did not reach the composer or the chat.
const EXIT_SEND_INCOMPLETE: i32 = 2;

/// ChatRelay - send the page you are reading to a chat assistant
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (", env!("GIT_HASH"), ", built ", env!("BUILD_DATE"), ")"
))]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the active tab and relay it into a chat
    Send(SendArgs),

    /// Show the message that would be sent, without opening a chat
    Preview(PreviewArgs),

    /// Capture the active tab and print what was read
    Capture,

    /// List supported chat targets
    Targets,

    /// Manage prompt templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Inspect or change stored relay settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show the effective application configuration
    Config,
}

/// Page to relay instead of the active tab
#[derive(Args, Clone, Default)]
struct PageArgs {
    /// Page URL; skips capturing the active tab
    #[arg(long)]
    url: Option<String>,

    /// Page title, used with --url
    #[arg(long, requires = "url")]
    title: Option<String>,

    /// File holding the page text, used with --url
    #[arg(long, value_name = "FILE", requires = "url")]
    content_file: Option<PathBuf>,

    /// Selected text, used with --url
    #[arg(long, requires = "url")]
    selection: Option<String>,
}

#[derive(Args)]
struct PromptArgs {
    /// Template id (defaults to the selected template)
    #[arg(short, long)]
    template: Option<String>,

    /// Prompt text; placeholders like {title} are filled in
    #[arg(short, long)]
    prompt: Option<String>,

    /// url or content
    #[arg(short, long)]
    mode: Option<SendMode>,
}

#[derive(Args)]
struct SendArgs {
    /// chatgpt or gemini
    #[arg(long)]
    target: Option<String>,

    /// Model label to pick where the chat offers a picker
    #[arg(long)]
    model: Option<String>,

    /// Submit after filling the composer
    #[arg(long, conflicts_with = "no_auto_send")]
    auto_send: bool,

    /// Leave the message in the composer
    #[arg(long)]
    no_auto_send: bool,

    #[command(flatten)]
    prompt: PromptArgs,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct PreviewArgs {
    #[command(flatten)]
    prompt: PromptArgs,

    #[command(flatten)]
    page: PageArgs,
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List templates
    List,

    /// Add a template, or replace the one with the same id
    Add {
        /// Template id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long, default_value = "")]
        name: String,

        /// Template body with {url}, {title}, {selection}, {content}
        body: String,

        /// Make it the selected template
        #[arg(long)]
        select: bool,
    },

    /// Remove a template
    Remove { id: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Show stored settings
    Show,

    /// Set one key; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },

    /// Reset settings to defaults
    Reset,

    /// Print the settings file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug)?;
    info!("Starting ChatRelay v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let output = cli.output.clone();

    let result = match cli.command {
        Commands::Send(args) => cmd_send(args, &config, output).await,
        Commands::Preview(args) => cmd_preview(args, &config, output).await.map(|()| 0),
        Commands::Capture => cmd_capture(&config, output).await.map(|()| 0),
        Commands::Targets => cmd_targets(&config, output).await.map(|()| 0),
        Commands::Templates { action } => cmd_templates(action, &config, output).await.map(|()| 0),
        Commands::Settings { action } => cmd_settings(action, &config, output).await.map(|()| 0),
        Commands::Config => cmd_config(&config).map(|()| 0),
    };

    match result {
        Ok(0) => {
            info!("Command completed successfully");
            Ok(())
        }
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn emit<T: serde::Serialize>(value: &T, output: &OutputFormat) -> Result<bool> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Human => return Ok(false),
    }
    Ok(true)
}

fn open_store(config: &AppConfig) -> SettingsStore {
    SettingsStore::new(config.settings_path.clone())
}

async fn start_browser(config: &AppConfig) -> Result<Arc<ChromiumCdpAdapter>> {
    ChromiumCdpAdapter::start(config.browser.clone())
        .await
        .context("Failed to start browser")
}

/// The page named on the command line, or the active tab.
async fn page_from(
    args: &PageArgs,
    settings: &Settings,
    cdp: Option<&dyn Cdp>,
) -> Result<PageSnapshot> {
    if let Some(raw) = &args.url {
        let url = url::Url::parse(raw).with_context(|| format!("Invalid --url '{}'", raw))?;
        let content = match &args.content_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => String::new(),
        };
        return Ok(PageSnapshot::new(url.as_str(), args.title.clone().unwrap_or_default())
            .with_content(content.trim())
            .with_selection(args.selection.clone().unwrap_or_default()));
    }
    let Some(cdp) = cdp else {
        bail!("No page given; pass --url or attach to a running browser");
    };
    let capture = capture_active_page(cdp, settings).await?;
    if !capture.complete {
        warn!("Page text unavailable, relaying URL and title only");
    }
    Ok(capture.page)
}

async fn cmd_send(args: SendArgs, config: &AppConfig, output: OutputFormat) -> Result<i32> {
    let store = Arc::new(open_store(config));
    let settings = store.load().await?;

    let target = args.target.clone().unwrap_or_else(|| settings.target.clone());
    let kind: TargetKind = ChatTarget::resolve(&target)?.kind;
    let model = args.model.clone().unwrap_or_else(|| settings.model.clone());
    let mode = args.prompt.mode.unwrap_or(settings.send_mode);
    let auto_send = if args.auto_send {
        true
    } else if args.no_auto_send {
        false
    } else {
        settings.auto_send
    };

    let settings = store
        .save(json!({
            "target": kind.key(),
            "model": model,
            "sendMode": mode.as_str(),
            "autoSend": auto_send,
        }))
        .await?;

    let adapter = start_browser(config).await?;
    let cdp: Arc<dyn Cdp> = adapter.clone();
    let result = run_send(&args, config, &settings, store, cdp, kind, model, mode, auto_send).await;

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            adapter.shutdown().await;
            return Err(err);
        }
    };
    if !emit(&outcome, &output)? {
        print_outcome(&outcome);
    }

    if !adapter.config().attaches() && outcome.status.is_success() {
        info!("Browser left open for the chat; press Ctrl-C to close it");
        let _ = tokio::signal::ctrl_c().await;
    }
    adapter.shutdown().await;

    Ok(if outcome.status.is_success() {
        0
    } else {
        EXIT_SEND_INCOMPLETE
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_send(
    args: &SendArgs,
    config: &AppConfig,
    settings: &Settings,
    store: Arc<SettingsStore>,
    cdp: Arc<dyn Cdp>,
    kind: TargetKind,
    model: String,
    mode: SendMode,
    auto_send: bool,
) -> Result<SendOutcome> {
    let page = page_from(&args.page, settings, Some(cdp.as_ref())).await?;
    let prompt = resolve_prompt(
        settings,
        &page,
        args.prompt.template.as_deref(),
        args.prompt.prompt.as_deref(),
    )?;

    let opener = Arc::new(CdpSurfaceOpener::new(cdp, config.timeouts.page_ready()));
    let relay = Relay::new(
        opener,
        store,
        Arc::new(TracingNotifier),
        config.timeouts.clone(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let request = SendRequest {
        target: kind.key().to_string(),
        model: Some(model),
        mode,
        prompt,
        auto_send,
        page,
    };
    let outcome = relay.execute_send(request, &cancel).await;
    watcher.abort();
    Ok(outcome?)
}

fn print_outcome(outcome: &SendOutcome) {
    println!("Status: {}", outcome.status.as_str());
    if let Some(url) = &outcome.url {
        println!("Chat: {}", url);
    }
    println!(
        "Message: {} chars{}",
        outcome.chars,
        if outcome.truncated { " (truncated)" } else { "" }
    );
    if let Some(fill) = &outcome.fill {
        match fill.strategy() {
            Some(strategy) => println!(
                "Filled with {} after {} attempt(s)",
                strategy, fill.attempts_used
            ),
            None => println!("Fill failed after {} attempt(s)", fill.attempts_used),
        }
    }
    if !outcome.detected_models.is_empty() {
        println!("Models offered: {}", outcome.detected_models.join(", "));
    }
}

async fn cmd_preview(args: PreviewArgs, config: &AppConfig, output: OutputFormat) -> Result<()> {
    let settings = open_store(config).load().await?;

    let adapter = if args.page.url.is_none() {
        Some(start_browser(config).await?)
    } else {
        None
    };
    let cdp: Option<Arc<dyn Cdp>> = adapter.clone().map(|a| a as Arc<dyn Cdp>);
    let page = page_from(&args.page, &settings, cdp.as_deref()).await;
    if let Some(adapter) = &adapter {
        adapter.shutdown().await;
    }
    let page = page?;

    let prompt = resolve_prompt(
        &settings,
        &page,
        args.prompt.template.as_deref(),
        args.prompt.prompt.as_deref(),
    )?;
    let composition = Composition::new(
        prompt,
        args.prompt.mode.unwrap_or(settings.send_mode),
        &page,
        settings.max_characters,
        settings.truncate_strategy,
    );

    if emit(&composition, &output)? {
        return Ok(());
    }
    if composition.size.aborted {
        println!(
            "Message is {} chars, over the {} limit; it would not be sent.",
            composition.chars, settings.max_characters
        );
        return Ok(());
    }
    println!("{}", composition.size.text);
    if composition.size.truncated {
        println!();
        println!(
            "(truncated from {} to {} chars)",
            composition.chars, settings.max_characters
        );
    }
    Ok(())
}

async fn cmd_capture(config: &AppConfig, output: OutputFormat) -> Result<()> {
    let settings = open_store(config).load().await?;
    let adapter = start_browser(config).await?;
    let capture = capture_active_page(adapter.as_ref(), &settings).await;
    adapter.shutdown().await;
    let capture = capture?;

    if emit(&capture, &output)? {
        return Ok(());
    }
    println!("URL: {}", capture.page.url);
    println!("Title: {}", capture.page.title);
    println!("Mode: {:?}", capture.mode);
    if !capture.page.selection.is_empty() {
        println!("Selection: {}", capture.page.selection);
    }
    if capture.complete {
        println!("Content: {} chars", capture.page.content.chars().count());
    } else {
        println!("Content: unavailable");
    }
    Ok(())
}

async fn cmd_targets(config: &AppConfig, output: OutputFormat) -> Result<()> {
    let settings = open_store(config).load().await?;
    let models = settings.effective_allowed_models();
    let targets: Vec<Value> = ChatTarget::all()
        .iter()
        .map(|t| {
            json!({
                "key": t.kind.key(),
                "name": t.name,
                "url": t.new_chat_url(settings.gemini_account_index),
                "models": if t.supports_models() { models.clone() } else { Vec::new() },
            })
        })
        .collect();
    if emit(&targets, &output)? {
        return Ok(());
    }
    for target in ChatTarget::all() {
        println!(
            "{:<8} {:<8} {}",
            target.kind.key(),
            target.name,
            target.new_chat_url(settings.gemini_account_index)
        );
        if target.supports_models() {
            println!("         models: {}", models.join(", "));
        }
    }
    Ok(())
}

async fn cmd_templates(
    action: TemplateAction,
    config: &AppConfig,
    output: OutputFormat,
) -> Result<()> {
    let store = open_store(config);
    match action {
        TemplateAction::List => {
            let settings = store.load().await?;
            if emit(&settings.templates, &output)? {
                return Ok(());
            }
            for template in &settings.templates {
                let marker = if template.id == settings.selected_template_id {
                    "*"
                } else {
                    " "
                };
                println!("{} {:<38} {}", marker, template.id, template.name);
            }
        }
        TemplateAction::Add {
            id,
            name,
            body,
            select,
        } => {
            if body.trim().is_empty() {
                bail!("Template body must not be empty");
            }
            let template = Template::new(id.as_deref(), &name, &body);
            let template_id = template.id.clone();
            store.upsert_template(template).await?;
            if select {
                store
                    .save(json!({ "selectedTemplateId": template_id }))
                    .await?;
            }
            info!(id = %template_id, "Template saved");
            println!("{}", template_id);
        }
        TemplateAction::Remove { id } => {
            let before = store.load().await?;
            if before.template(&id).is_none() {
                bail!("No template with id '{}'", id);
            }
            store.remove_template(&id).await?;
            info!(id = %id, "Template removed");
        }
    }
    Ok(())
}

async fn cmd_settings(
    action: SettingsAction,
    config: &AppConfig,
    output: OutputFormat,
) -> Result<()> {
    let store = open_store(config);
    match action {
        SettingsAction::Show => {
            let settings = store.load().await?;
            if !emit(&settings, &output)? {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
        }
        SettingsAction::Set { key, value } => {
            let parsed = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            let mut patch = serde_json::Map::new();
            patch.insert(key.clone(), parsed);
            store.save(Value::Object(patch)).await?;
            info!(key = %key, "Setting updated");
        }
        SettingsAction::Reset => {
            store.reset().await?;
        }
        SettingsAction::Path => println!("{}", store.path().display()),
    }
    Ok(())
}

fn cmd_config(config: &AppConfig) -> Result<()> {
    println!("Current Configuration:");
    println!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

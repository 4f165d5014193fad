use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dreamcolor::core::config::{Config, DEFAULT_CONFIG_PATH};
use dreamcolor::core::io::{NativeStorage, Storage};
use dreamcolor::core::state::{CoverChoice, CoverPreset, GenerationRequest};
use dreamcolor::services::chat::{ChatAssistant, ChatSession};
use dreamcolor::services::cover::cover_presets;
use dreamcolor::services::document::{assemble, book_file_name};
use dreamcolor::services::llm::create_llm;
use dreamcolor::services::workflow::WorkflowManager;
use dreamcolor::ui;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "dreamcolor", version, about = "Personalized coloring books from a theme")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a coloring book PDF.
    Generate(GenerateArgs),
    /// Brainstorm themes with the assistant.
    Chat,
    /// Write the built-in cover backgrounds as JPEG files.
    Presets {
        /// Output directory (defaults to the configured output folder).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a default config file.
    Init,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Child's name, shown on the cover.
    #[arg(long)]
    name: Option<String>,

    /// Book theme, e.g. "space dinosaurs".
    #[arg(long)]
    theme: Option<String>,

    /// Cover preset: space, rainbow, doodle or none.
    #[arg(long)]
    cover: Option<String>,

    /// Use an image file as the cover.
    #[arg(long, conflicts_with = "cover")]
    cover_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Command::Init = cli.cmd {
        return cmd_init(&cli.config);
    }

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Run `dreamcolor init` to create a default config.yml.");
            return Err(e);
        }
    };

    match cli.cmd {
        Command::Generate(args) => cmd_generate(&config, args).await,
        Command::Chat => cmd_chat(&config).await,
        Command::Presets { out } => cmd_presets(&config, out).await,
        Command::Init => Ok(()),
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    if path.exists() {
        println!("{} already exists, leaving it untouched.", path.display());
        return Ok(());
    }
    Config::default().save(path)?;
    println!("Wrote default config to {}. Add your Gemini API key to get started.", path.display());
    Ok(())
}

async fn cmd_generate(config: &Config, args: GenerateArgs) -> Result<()> {
    config.ensure_directories()?;
    let llm = create_llm(config)?;
    let storage = NativeStorage::new();
    let presets = cover_presets(config.book.cover_seed)?;
    let mut manager = WorkflowManager::new(llm, &config.book);

    if !config.unattended && (args.name.is_none() || args.theme.is_none()) {
        ui::print_inspiration();
    }

    let mut first_round = true;
    loop {
        let (name, theme) = if first_round {
            (args.name.clone(), args.theme.clone())
        } else {
            (None, None)
        };

        let request = if config.unattended {
            GenerationRequest::new(name.as_deref().unwrap_or(""), theme.as_deref().unwrap_or(""))?
        } else {
            ui::prompt_request(name, theme)?
        };

        let cover = if first_round {
            pick_cover(config, &presets, &storage, &args).await?
        } else {
            ui::select_cover(&presets, &storage).await?
        };

        let reporter = ui::ProgressReporter::new()?;
        let result = manager.run(&request, |snap| reporter.update(snap)).await;
        reporter.finish(&manager.session().state().message);

        match result {
            Ok(pages) => {
                let failed = manager.session().failures().len();
                println!("Drew {} pages ({} skipped).", pages.len(), failed);
            }
            Err(e) if config.unattended => return Err(e.into()),
            Err(e) => {
                log::error!("Run failed: {}", e);
                eprintln!("{}", manager.session().state().message);
            }
        }

        if manager.session().ready_to_download() {
            let path = save_book(config, &storage, &request, &manager, cover.image()).await?;
            println!("Saved {}", path);
        } else if let Some(notice) = ui::missing_book_notice(manager.session()) {
            println!("{}", notice);
        }

        if config.unattended || !ui::confirm("Create another?")? {
            break;
        }
        manager.reset();
        first_round = false;
    }

    Ok(())
}

async fn pick_cover(
    config: &Config,
    presets: &[CoverPreset],
    storage: &dyn Storage,
    args: &GenerateArgs,
) -> Result<CoverChoice> {
    if let Some(path) = &args.cover_file {
        return ui::cover_from_file(storage, path).await;
    }
    match ui::cover_from_arg(presets, args.cover.as_deref())? {
        Some(choice) => Ok(choice),
        None if config.unattended => Ok(CoverChoice::None),
        None => ui::select_cover(presets, storage).await,
    }
}

async fn save_book(
    config: &Config,
    storage: &dyn Storage,
    request: &GenerationRequest,
    manager: &WorkflowManager,
    cover: Option<&dreamcolor::utils::data_uri::ImagePayload>,
) -> Result<String> {
    let bytes = assemble(
        request.child_name(),
        request.theme(),
        manager.session().pages(),
        cover,
    )
    .context("Failed to assemble coloring book")?;

    let path = Path::new(&config.output_folder).join(book_file_name(request.child_name()));
    let path = path.to_string_lossy().to_string();
    storage.write(&path, &bytes).await?;
    Ok(path)
}

async fn cmd_chat(config: &Config) -> Result<()> {
    let llm = create_llm(config)?;
    let mut session = ChatSession::new(ChatAssistant::new(llm));
    ui::run_chat(&mut session).await
}

async fn cmd_presets(config: &Config, out: Option<PathBuf>) -> Result<()> {
    let dir = out.unwrap_or_else(|| PathBuf::from(&config.output_folder));
    let storage = NativeStorage::new();

    for preset in cover_presets(config.book.cover_seed)? {
        let path = dir.join(format!("{}.jpg", preset.id));
        let path = path.to_string_lossy().to_string();
        storage.write(&path, &preset.image.decode()?).await?;
        println!("{} -> {}", preset.name, path);
    }
    Ok(())
}

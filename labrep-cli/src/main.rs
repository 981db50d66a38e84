use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use labrep::assets::{find_image, upload_image};
use labrep::config::{open_store, ReportConfig, StoreBackend};
use labrep::llm::convert_to_latex;
use labrep::loggers::{init_logger, LogFormat};
use labrep::models::ReportRequest;
use labrep::report::{build_image_zip, generate_report, inspect_project, save_report};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
struct Args {
    /// Root directory holding one folder per project
    #[arg(short, long, global = true)]
    upload_dir: Option<PathBuf>,

    /// Storage backend: fs or sqlite
    #[arg(short, long, global = true)]
    backend: Option<StoreBackend>,

    #[arg(long, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save a report request (JSON) and print its project id
    Save { request: PathBuf },
    /// Generate the LaTeX document of a project
    Render {
        project_id: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Bundle the images of a project into a ZIP archive
    Zip {
        project_id: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List saved projects, most recent first
    List,
    /// Show what a project has stored, section by section
    Inspect { project_id: String },
    /// Store an image in a project folder
    Upload { folder: String, image: PathBuf },
    /// Print the path of a stored image, searching every project folder
    Image { name: String },
    /// Convert a text file to LaTeX with the configured chat model
    Convert {
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        no_preserve: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.log_format)?;

    let mut config = ReportConfig::from_env()?;
    if let Some(upload_dir) = args.upload_dir {
        config = config.with_upload_dir(upload_dir);
    }
    if let Some(backend) = args.backend {
        config = config.with_backend(backend);
    }

    match args.command {
        Command::Save { request } => {
            let json = std::fs::read_to_string(&request)
                .with_context(|| format!("Failed to read {}", request.display()))?;
            let request: ReportRequest =
                serde_json::from_str(&json).context("Invalid report request")?;
            let store = open_store(&config)?;
            let project_id = save_report(&config, store.as_ref(), &request)?;
            println!("{}", project_id);
        }
        Command::Render { project_id, out } => {
            let store = open_store(&config)?;
            let generated = generate_report(&config, store.as_ref(), &project_id)?;
            match out {
                Some(out) => {
                    std::fs::write(&out, &generated.latex)
                        .with_context(|| format!("Failed to write {}", out.display()))?;
                    tracing::info!("LaTeX written to {}", out.display());
                }
                None => println!("{}", generated.latex),
            }
            for image in &generated.images {
                tracing::info!("Referenced image: {}", image);
            }
        }
        Command::Zip { project_id, out } => {
            let store = open_store(&config)?;
            let bytes = build_image_zip(&config, store.as_ref(), &project_id)?;
            let out = out.unwrap_or_else(|| PathBuf::from(format!("{}_images.zip", project_id)));
            std::fs::write(&out, bytes)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("{}", out.display());
        }
        Command::List => {
            let store = open_store(&config)?;
            for project in store.list_projects()? {
                println!(
                    "{}\t{}",
                    project.last_modified.format("%Y-%m-%d %H:%M:%S"),
                    project.project_id
                );
            }
        }
        Command::Inspect { project_id } => {
            let store = open_store(&config)?;
            let inspection = inspect_project(store.as_ref(), &project_id)?;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
        Command::Upload { folder, image } => {
            let stored = upload_image(&config, &folder, &image)?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Command::Image { name } => {
            let path = find_image(&config.upload_dir, &name)
                .ok_or_else(|| anyhow!("Image not found: {}", name))?;
            println!("{}", path.display());
        }
        Command::Convert { file, no_preserve } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let latex = convert_to_latex(&text, !no_preserve).await?;
            println!("{}", latex);
        }
    }

    Ok(())
}

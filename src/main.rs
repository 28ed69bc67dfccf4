use std::path::PathBuf;
use std::sync::Arc;

use photo_editor_core::api::server::serve;
use photo_editor_core::config::ServiceConfig;
use photo_editor_core::edit::presets::preset_catalog;
use photo_editor_core::edit::remote::OpenRouterEditService;
use photo_editor_core::edit::{EditOrchestrator, ImageAsset, SubmitEdit};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let cli_args = std::env::args().skip(1).collect::<Vec<_>>();
    if matches!(cli_args.first().map(String::as_str), Some("presets")) {
        println!("{}", serde_json::to_string_pretty(&preset_catalog())?);
        return Ok(());
    }
    if matches!(cli_args.first().map(String::as_str), Some("edit")) {
        let args = cli_args.into_iter().skip(1).collect::<Vec<_>>();
        tokio::task::spawn_blocking(move || run_edit_cli(args)).await??;
        return Ok(());
    }

    let config = ServiceConfig::from_env()?;
    serve(config).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditCliArgs {
    image_path: PathBuf,
    instruction: String,
    api_key: Option<String>,
}

fn parse_edit_cli_args(
    args: &[String],
) -> Result<EditCliArgs, Box<dyn std::error::Error + Send + Sync>> {
    let mut image_path = None::<PathBuf>;
    let mut instruction = None::<String>;
    let mut api_key = None::<String>;
    let mut i = 0usize;
    while i < args.len() {
        let flag = args[i].as_str();
        let needs_value = |idx: usize| -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            let Some(value) = args.get(idx + 1) else {
                return Err(std::io::Error::other(format!("Missing value for {flag}")).into());
            };
            Ok(value.clone())
        };

        match flag {
            "--image" => {
                image_path = Some(PathBuf::from(needs_value(i)?));
                i += 2;
            }
            "--instruction" => {
                instruction = Some(needs_value(i)?);
                i += 2;
            }
            "--api-key" => {
                api_key = Some(needs_value(i)?);
                i += 2;
            }
            unknown => {
                return Err(std::io::Error::other(format!(
                    "Unknown argument: {unknown}\n\nUse --help for usage."
                ))
                .into());
            }
        }
    }

    let image_path =
        image_path.ok_or_else(|| std::io::Error::other("Missing required --image"))?;
    let instruction = instruction
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| std::io::Error::other("Missing required --instruction"))?;
    let api_key = api_key
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    Ok(EditCliArgs {
        image_path,
        instruction,
        api_key,
    })
}

fn run_edit_cli(args: Vec<String>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_edit_usage();
        return Ok(());
    }
    let parsed = parse_edit_cli_args(args.as_slice())?;
    let credential = parsed
        .api_key
        .clone()
        .or_else(|| std::env::var(API_KEY_ENV).ok())
        .unwrap_or_default();

    let bytes = std::fs::read(parsed.image_path.as_path())?;
    let image = ImageAsset::from_bytes(bytes.as_slice(), None)?;

    let config = ServiceConfig::from_env()?;
    let remote = OpenRouterEditService::new(config.endpoint, config.model);
    let orchestrator = EditOrchestrator::new(Arc::new(remote));
    let outcome = orchestrator.submit_edit(SubmitEdit {
        credential,
        image: Some(image),
        instruction: Some(parsed.instruction.clone()),
    })?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "ok": true,
            "image": parsed.image_path,
            "instruction": parsed.instruction,
            "media_type": outcome.edited.media_type(),
            "fingerprint": outcome.edited.fingerprint(),
            "guidance": outcome.guidance,
        }))?
    );
    Ok(())
}

fn print_edit_usage() {
    eprintln!(concat!(
        "Usage:\n",
        "  photo-editor-core edit --image PATH --instruction TEXT [--api-key KEY]\n\n",
        "Defaults:\n",
        "  --api-key falls back to OPENROUTER_API_KEY\n",
        "  endpoint and model come from PHOTO_EDITOR_ENDPOINT / PHOTO_EDITOR_MODEL\n"
    ));
}

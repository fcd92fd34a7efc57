use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use markbox::client::{hex_to_triple, AnnotateParams, ApiClient};
use markbox::common::ModelVariant;

#[derive(Parser)]
#[command(name = "markbox-client", about = "Command line front end for the detection service")]
struct Cli {
    /// Base URL of the service.
    #[arg(long, default_value = "http://127.0.0.1:8000", env = "MARKBOX_URL")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Switch the service's default model.
    SetModel {
        #[arg(value_parser = parse_variant)]
        version: ModelVariant,
    },
    /// Upload an image and save the annotated JPEG.
    Annotate {
        /// Image file to annotate.
        image: PathBuf,

        /// Where to write the annotated JPEG.
        #[arg(short, long, default_value = "annotated.jpg")]
        output: PathBuf,

        #[arg(long, value_parser = parse_variant, default_value = "yolov8n")]
        model: ModelVariant,

        /// Minimum detection confidence, 0 to 1.
        #[arg(long, default_value_t = 0.25)]
        conf_threshold: f32,

        /// Width of the frame added around the image, in pixels.
        #[arg(long, default_value_t = 50)]
        border_size: u32,

        /// Frame color as #RRGGBB.
        #[arg(long, default_value = "#323232")]
        border_color: String,

        #[arg(long, default_value_t = 0.7)]
        font_scale: f32,

        #[arg(long, default_value_t = 2)]
        font_thickness: u32,

        /// Label text color as #RRGGBB.
        #[arg(long, default_value = "#FFFFFF")]
        text_color: String,

        /// Label background color as #RRGGBB.
        #[arg(long, default_value = "#000000")]
        background_color: String,

        /// Label background opacity, 0 to 1.
        #[arg(long, default_value_t = 0.5)]
        background_alpha: f32,
    },
    /// Check that the service is reachable.
    Health,
}

fn parse_variant(s: &str) -> Result<ModelVariant, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url)?;

    match cli.command {
        Command::SetModel { version } => {
            let message = client.set_model(version).await?;
            println!("{message}");
        }
        Command::Annotate {
            image,
            output,
            model,
            conf_threshold,
            border_size,
            border_color,
            font_scale,
            font_thickness,
            text_color,
            background_color,
            background_alpha,
        } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("reading {}", image.display()))?;
            let file_name = image
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.jpg")
                .to_string();

            let params = AnnotateParams {
                model_name: model,
                conf_threshold,
                border_size,
                border_color: hex_to_triple(&border_color)?,
                font_scale,
                font_thickness,
                text_color: hex_to_triple(&text_color)?,
                background_color: hex_to_triple(&background_color)?,
                background_alpha,
            };

            let jpeg = client.annotate(bytes, &file_name, &params).await?;
            tokio::fs::write(&output, &jpeg)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!("wrote {} ({} bytes)", output.display(), jpeg.len());
        }
        Command::Health => {
            client.health().await?;
            println!("service is up at {}", cli.url);
        }
    }

    Ok(())
}

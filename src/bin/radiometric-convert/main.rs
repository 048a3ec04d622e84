mod args;

use anyhow::Result;
use args::Args;
use serde_derive::*;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use radiometric::image::ThermalImage;
use radiometric::metadata::ExifTool;
use radiometric::TemperatureStats;

fn main() -> Result<()> {
    init_logging();

    let args = Args::from_cmd_line()?;
    let tool = ExifTool::new(args.exiftool.as_str());

    let mut image = if args.is_json {
        ThermalImage::from_exiftool_json_path(&args.path)?
    } else {
        ThermalImage::from_image_path(&tool, &args.path)?
    };
    image.output.kind = args.kind;
    image.output.bit_depth = args.bit_depth;

    let output = match &args.output {
        Some(path) => {
            image.save_to(path)?;
            path.clone()
        }
        None => image.save()?,
    };

    if args.copy_exif {
        tool.copy_tags_from(&image.path, &output)?;
    }

    #[derive(Serialize, Debug)]
    struct Report {
        path: String,
        output: String,
        width: usize,
        height: usize,
        stats: TemperatureStats,
    }

    let (height, width) = image.raw.dim();
    serde_json::to_writer(
        std::io::stdout().lock(),
        &Report {
            path: image.path.display().to_string(),
            output: output.display().to_string(),
            width,
            height,
            stats: image.stats,
        },
    )?;
    println!();

    Ok(())
}

// stdout carries the json report; logs go to stderr
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

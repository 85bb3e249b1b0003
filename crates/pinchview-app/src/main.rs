//! `pinchview`: render an SVG through the viewer, optionally replay recorded
//! gestures, and save what the view shows as a PNG.

use clap::Parser;
use kurbo::Size;
use pinchview_app::cli::{AppError, parse_view_size};
use pinchview_app::{GestureScript, Viewer, ViewerConfig, encode_png};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pinchview", version, about = "Zoomable SVG viewer, headless edition")]
struct Args {
    /// SVG document to display
    input: PathBuf,

    /// View size as WIDTHxHEIGHT
    #[arg(long, default_value = "800x600", value_parser = parse_view_size)]
    size: Size,

    /// Viewer config (JSON); defaults to the user config file if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pointer events to replay before exporting (JSON array)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Where to write the exported PNG
    #[arg(long, default_value = "pinchview.png")]
    out: PathBuf,

    /// Seconds to wait for the first render
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("pinchview: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), AppError> {
    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::load_or_default(),
    };
    let source = std::fs::read_to_string(&args.input).map_err(|e| AppError::Read {
        path: args.input.clone(),
        message: e.to_string(),
    })?;
    let script = args.script.as_deref().map(GestureScript::load).transpose()?;

    log::info!("Starting PinchView on {:?}", args.input);
    let mut viewer = Viewer::with_svg_backend(config)?;
    viewer.set_view_size(args.size);
    viewer.set_source(&source);

    let rendered = viewer.wait_for_render(Duration::from_secs(args.timeout));
    if let Some(error) = viewer.take_errors().into_iter().next() {
        return Err(error.into());
    }
    if !rendered {
        return Err(AppError::Timeout(args.timeout));
    }

    if let Some(script) = script {
        script.replay(&mut viewer);
        log::info!(
            "View after replay: scale {:.3}, offset ({:.1}, {:.1})",
            viewer.current_scale(),
            viewer.transform().offset().x,
            viewer.transform().offset().y
        );
    }

    let image = viewer.try_export_snapshot()?;
    let png = encode_png(&image)?;
    std::fs::write(&args.out, png).map_err(|e| AppError::Write {
        path: args.out.clone(),
        message: e.to_string(),
    })?;
    log::info!("Wrote {}x{} PNG to {:?}", image.width(), image.height(), args.out);
    Ok(())
}

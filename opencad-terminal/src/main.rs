/// OpenCAD Terminal Viewer
///
/// Renders an STL or OBJ model as ASCII art in the terminal.
/// Controls:
///   - WASD / Arrow Keys: Rotate the model
///   - E/R: Roll rotation
///   - Space: Toggle auto-spin
///   - F / C / X: Toggle wireframe, section and explode
///   - +/-: Change the explode factor
///   - P: Print a share token on exit
///   - Q/ESC: Quit
use anyhow::{Context, Result};
use clap::Parser;
use opencad_core::{share, EngineConfig, ModelFormat, ModelSource, ViewerSession};
use opencad_terminal::{TerminalApp, DEMO_CUBE_OBJ};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "opencad-terminal", version, about = "View STL and OBJ models in the terminal")]
struct Args {
    /// Model file to open (.stl or .obj); a cube is shown when omitted
    file: Option<PathBuf>,

    /// Open the model carried by a share token instead of a file
    #[arg(long, conflicts_with = "file")]
    token: Option<String>,

    /// Start in wireframe mode
    #[arg(long)]
    wireframe: bool,

    /// Start with the section plane enabled
    #[arg(long)]
    section: bool,

    /// Start exploded with this factor
    #[arg(long, value_name = "FACTOR")]
    explode: Option<f32>,

    /// Print the share token for the model and exit
    #[arg(long)]
    share: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = EngineConfig::from_env();
    tracing::debug!(?config, "Configuration loaded");

    let mut session = ViewerSession::new(config);
    let source = model_source(&args)?;

    println!("OpenCAD Terminal Viewer - Loading {}...", source.name);
    let pending = session.load_in_background(source);
    let ticket = pending.ticket();
    session
        .finish_load(ticket, pending.wait())
        .context("failed to load model")?;

    session.set_wireframe(args.wireframe);
    session.set_sectioning(args.section);
    if let Some(factor) = args.explode {
        session.set_exploded(true);
        session.set_explode_factor(factor);
    }

    if args.share {
        return print_share_token(&session);
    }

    let mut app = TerminalApp::new(session).context("failed to query terminal size")?;
    app.run()?;

    if app.share_requested() {
        print_share_token(app.session())?;
    }
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn model_source(args: &Args) -> Result<ModelSource> {
    if let Some(token) = &args.token {
        return share::decode(token).context("invalid share token");
    }

    match &args.file {
        Some(path) => {
            let format = ModelFormat::from_path(path)?;
            let data =
                std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("model.{format}"));
            Ok(ModelSource::new(data, format, name))
        }
        None => Ok(ModelSource::new(
            DEMO_CUBE_OBJ.as_bytes().to_vec(),
            ModelFormat::Obj,
            "cube.obj",
        )),
    }
}

fn print_share_token(session: &ViewerSession) -> Result<()> {
    if let Some(token) = session.share_token() {
        let token = token.context("failed to build share token")?;
        println!("#{token}");
    }
    Ok(())
}

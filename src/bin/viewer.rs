use glb_viewer::config::ViewerConfig;
use glb_viewer::editor::{ViewerCommand, parse_script};
use glb_viewer::export::ExportOutcome;
use glb_viewer::viewer::Viewer;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const USAGE: &str = "usage: viewer [MODEL] [--config FILE] [--script FILE] [--export] [--out DIR] [--headless]";
const LOAD_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct Args {
    model: Option<String>,
    config: Option<PathBuf>,
    script: Option<PathBuf>,
    export: bool,
    out: Option<PathBuf>,
    headless: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} expects a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--script" => parsed.script = Some(PathBuf::from(value("--script")?)),
            "--out" => parsed.out = Some(PathBuf::from(value("--out")?)),
            "--export" => parsed.export = true,
            "--headless" => parsed.headless = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag {flag}\n{USAGE}"));
            }
            model if parsed.model.is_none() => parsed.model = Some(model.to_string()),
            extra => return Err(format!("unexpected argument {extra}\n{USAGE}")),
        }
    }
    Ok(parsed)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("[viewer] error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(model) = args.model.clone() {
        config = config.with_model(model);
    }
    if let Some(out) = args.out.clone() {
        config = config.with_output_dir(out);
    }

    let script = match &args.script {
        Some(path) => parse_script(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let mut viewer = Viewer::from_config(&config);
    viewer.load_default();

    let headless = args.headless || args.script.is_some() || args.export;
    if !headless {
        #[cfg(feature = "render-wgpu")]
        {
            glb_viewer::render::window::run_window(config.window.clone(), viewer)?;
            return Ok(());
        }
        #[cfg(not(feature = "render-wgpu"))]
        log::warn!("[viewer] built without `render-wgpu`; running headless");
    }

    run_headless(viewer, script, args.export)
}

fn run_headless(
    mut viewer: Viewer,
    script: Vec<ViewerCommand>,
    export: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let mut last_tick = started;
    while viewer.is_loading() {
        if started.elapsed() > LOAD_TIMEOUT {
            return Err(format!("model did not load within {}s", LOAD_TIMEOUT.as_secs()).into());
        }
        std::thread::sleep(POLL_INTERVAL);
        let now = Instant::now();
        viewer.tick(now.duration_since(last_tick).as_secs_f32());
        last_tick = now;
    }

    if viewer.scene().is_none() {
        let reason = viewer
            .notices()
            .latest()
            .map(|notice| notice.message.clone())
            .unwrap_or_else(|| "no scene loaded".to_string());
        return Err(reason.into());
    }

    let mut commands = script;
    if export {
        commands.push(ViewerCommand::Export);
    }

    for command in commands {
        let label = command.label();
        match viewer.handle(command) {
            Some(ExportOutcome::Delivered { path, bytes }) => {
                println!("export: wrote {} ({bytes} bytes)", path.display());
            }
            Some(ExportOutcome::Failed(err)) => println!("export: failed ({err})"),
            Some(ExportOutcome::Skipped) => println!("export: nothing loaded"),
            None => match viewer.info_panel() {
                Some(info) => println!("{label}:\n{info}"),
                None => println!("{label}: (panel hidden)"),
            },
        }
    }

    if viewer.notices().errors().next().is_some() {
        return Err("one or more commands failed; see log".into());
    }
    Ok(())
}

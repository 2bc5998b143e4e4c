use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::error;

use fngen::module::parse_go_duration;
use fngen::{Options, Project};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Project directory containing go.mod.
    #[arg(default_value = ".")]
    dir: String,

    /// go.work file to superimpose over the project's requirements.
    #[arg(short, long)]
    work: Option<String>,

    /// Stream progress events as JSON lines.
    #[arg(long)]
    json: bool,

    /// Abort the run after the given duration, e.g. 90s.
    #[arg(short, long)]
    timeout: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Cli::parse();
    let level = if args.verbose {
        log::Level::Debug
    } else {
        log::Level::Warn
    };
    simple_logger::init_with_level(level).expect("logger init failed");

    let mut options = Options::new();
    if let Some(work) = &args.work {
        options = match options.with_work(work) {
            Ok(options) => options,
            Err(err) => {
                error!("{err}");
                std::process::exit(-1);
            }
        };
    }
    let deadline = match &args.timeout {
        Some(timeout) => match parse_go_duration(timeout) {
            Ok(deadline) => Some(deadline),
            Err(err) => {
                error!("{err}");
                std::process::exit(-1);
            }
        },
        None => None,
    };

    let project = match Project::load(&args.dir, options) {
        Ok(project) => project,
        Err(err) => {
            error!("{err}");
            std::process::exit(-1);
        }
    };
    let mut process = match project.coding() {
        Ok(process) => process,
        Err(err) => {
            error!("{err}");
            std::process::exit(-1);
        }
    };
    let results = process.start();
    let process = Arc::new(process);
    if let Some(deadline) = deadline {
        let process = process.clone();
        thread::spawn(move || {
            thread::sleep(deadline);
            if let Err(err) = process.abort(Duration::from_secs(10)) {
                error!("{err}");
            }
        });
    }

    let mut failed = false;
    for result in results.iter() {
        if args.json {
            match serde_json::to_string(&result) {
                Ok(line) => println!("{line}"),
                Err(err) => error!("render event failed: {err}"),
            }
        } else {
            println!("{result}");
        }
        if !result.succeed() {
            failed = true;
        }
    }
    if failed {
        std::process::exit(1);
    }
}

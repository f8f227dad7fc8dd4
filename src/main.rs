//! Command-line front end for the stencil template engine.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;

use stencil::StencilError;
use stencil::describe::{build_description, description_file_for, print_description};
use stencil_engine::{Description, Environment};

#[derive(Parser, Debug)]
#[command(
    name = "stencil",
    about = "Data-driven text template engine and file-tree generator"
)]
struct Cli {
    /// Input template file
    #[arg(short, long)]
    file: PathBuf,

    /// Input JSON data file
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Template description JSON file; with no value and no --data, prints
    /// the template's description
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    info: Option<PathBuf>,

    /// Create or update the template description JSON file
    #[arg(short = 'c', long = "create-info", num_args = 0..=1, default_missing_value = "")]
    create_info: Option<PathBuf>,

    /// Output directory; when absent, renders in dry-run mode to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StencilError> {
    let mut env = Environment::new();
    if let Some(parent) = cli.file.parent() {
        env.set_templates_dir(parent);
    }
    let template_name: PathBuf = cli
        .file
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| StencilError::Usage("invalid template file name".into()))?;

    // show template description
    if cli.info.is_some() && cli.data.is_none() {
        let info_path = description_file_for(&cli.file, cli.info.as_deref());
        return show_description(&mut env, &cli.file, &template_name, &info_path);
    }

    // create/update template description
    if let Some(create_info) = &cli.create_info {
        let explicit = (!create_info.as_os_str().is_empty()).then_some(create_info.as_path());
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        build_description(
            &mut env,
            &cli.file,
            explicit,
            &mut stdin.lock(),
            &mut stdout.lock(),
        )?;
        return Ok(());
    }

    // render
    let Some(data_path) = &cli.data else {
        return Err(StencilError::Usage(
            "Please specify a JSON data file (-d, --data)".into(),
        ));
    };
    let data: Value = serde_json::from_str(&fs::read_to_string(data_path)?)?;

    match &cli.output {
        Some(output_dir) => env.set_output_dir(output_dir),
        None => env.set_dry_run(true),
    }
    let info = cli
        .info
        .as_deref()
        .filter(|path| !path.as_os_str().is_empty());

    let result = env.render_file(&template_name, &data, info)?;
    if env.is_dry_run() {
        println!("{result}");
    }
    Ok(())
}

fn show_description(
    env: &mut Environment,
    template: &Path,
    template_name: &Path,
    info_path: &Path,
) -> Result<(), StencilError> {
    let name = template
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match Description::from_file(&name, info_path) {
        Ok(desc) if !desc.is_empty() => print_description(&mut out, &desc)?,
        _ => {
            // no usable description file; show the raw template structure
            writeln!(
                out,
                "Couldn't open template description file: {info_path:?}"
            )?;
            writeln!(out, "Raw structure of the {name:?} template\n")?;
            let desc = env.description_from_file(template_name)?;
            print_description(&mut out, &desc)?;
        }
    }
    Ok(())
}

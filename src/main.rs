use apib::{Blueprint, Lookup, ParseOptions, Warning};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Parse an API Blueprint document and optionally query it.
#[derive(Parser)]
#[command(name = "apib", version)]
struct Args {
    /// Blueprint document to parse
    file: PathBuf,

    /// Lookup key: ">group>resource>action", "/path[:METHOD]" or a
    /// group name
    query: Option<String>,

    /// Suppress warnings on stderr
    #[arg(short, long)]
    quiet: bool,

    /// Print a JSON summary instead of the text form
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    name: &'a str,
    format: &'a str,
    groups: usize,
    resources: usize,
    actions: usize,
    warnings: &'a [Warning],
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let text = std::fs::read_to_string(&args.file)?;
    let options = ParseOptions {
        report_warnings: !args.quiet,
        ..Default::default()
    };
    let blueprint = Blueprint::parse_with(&text, options)?;

    if let Some(query) = &args.query {
        match blueprint.get(query) {
            Some(Lookup::Group(group)) => println!("{group}"),
            Some(Lookup::Resource(resource)) => println!("{resource}"),
            Some(Lookup::Action(action)) => println!("{action}"),
            Some(Lookup::Actions(actions)) => {
                for action in actions {
                    println!("{action}");
                }
            }
            None => return Err(format!("no match for {query:?}").into()),
        }
        return Ok(());
    }

    if args.json {
        let summary = Summary {
            name: blueprint.name(),
            format: blueprint.format(),
            groups: blueprint.len(),
            resources: blueprint.count_resources(),
            actions: blueprint.count_actions(),
            warnings: blueprint.warnings(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{blueprint}");
    }
    Ok(())
}

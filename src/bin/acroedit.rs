//! Command-line front end for form editing.
//!
//! Usage:
//!   acroedit list <in.pdf>
//!   acroedit add <in.pdf> <out.pdf> <name> [value] [--type T] [--page N] [--rect x,y,w,h] [--flatten]
//!   acroedit update <in.pdf> <out.pdf> <name> <value> [--rename NEW] [--flatten]
//!   acroedit remove <in.pdf> <out.pdf> <name> [--flatten]
//!
//! `list` prints the fields as JSON. Set `RUST_LOG=debug` for details.

use pdf_acroedit::{AddFieldOptions, Document, SaveOptions, UpdateOptions};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage:
  acroedit list <in.pdf>
  acroedit add <in.pdf> <out.pdf> <name> [value] [--type T] [--page N] [--rect x,y,w,h] [--flatten]
  acroedit update <in.pdf> <out.pdf> <name> <value> [--rename NEW] [--flatten]
  acroedit remove <in.pdf> <out.pdf> <name> [--flatten]";

enum Command {
    List {
        input: PathBuf,
    },
    Add {
        input: PathBuf,
        output: PathBuf,
        name: String,
        options: AddFieldOptions,
    },
    Update {
        input: PathBuf,
        output: PathBuf,
        name: String,
        value: String,
        options: UpdateOptions,
    },
    Remove {
        input: PathBuf,
        output: PathBuf,
        name: String,
    },
}

struct Invocation {
    command: Command,
    save: SaveOptions,
}

impl Invocation {
    fn from_args(args: &[String]) -> Result<Self, String> {
        let mut positional = Vec::new();
        let mut field_type = None;
        let mut page = None;
        let mut rect = None;
        let mut rename = None;
        let mut save = SaveOptions::incremental();

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--flatten" => save = SaveOptions::flatten(),
                "--type" | "--page" | "--rect" | "--rename" => {
                    let flag = args[i].as_str();
                    i += 1;
                    let value = args.get(i).ok_or_else(|| format!("{} needs a value", flag))?.clone();
                    match flag {
                        "--type" => field_type = Some(value),
                        "--page" => page = Some(value.parse::<usize>().map_err(|e| format!("--page: {}", e))?),
                        "--rect" => rect = Some(parse_rect(&value)?),
                        _ => rename = Some(value),
                    }
                },
                other => positional.push(other.to_string()),
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        let verb = positional.next().ok_or("missing command")?;
        let mut next = |what: &str| positional.next().ok_or_else(|| format!("missing {}", what));

        let command = match verb.as_str() {
            "list" => Command::List {
                input: next("input file")?.into(),
            },
            "add" => {
                let input = next("input file")?.into();
                let output = next("output file")?.into();
                let name = next("field name")?;
                let mut options = AddFieldOptions::new();
                if let Ok(value) = next("value") {
                    options = options.value(value);
                }
                if let Some(field_type) = field_type {
                    options = options.field_type(field_type);
                }
                if let Some(page) = page {
                    options = options.page(page);
                }
                if let Some([x, y, w, h]) = rect {
                    options = options.rect(x, y, w, h);
                }
                Command::Add {
                    input,
                    output,
                    name,
                    options,
                }
            },
            "update" => Command::Update {
                input: next("input file")?.into(),
                output: next("output file")?.into(),
                name: next("field name")?,
                value: next("value")?,
                options: UpdateOptions { new_name: rename },
            },
            "remove" => Command::Remove {
                input: next("input file")?.into(),
                output: next("output file")?.into(),
                name: next("field name")?,
            },
            other => return Err(format!("unknown command {:?}", other)),
        };
        Ok(Self { command, save })
    }
}

fn parse_rect(text: &str) -> Result<[f64; 4], String> {
    let numbers = text
        .split(',')
        .map(|n| n.trim().parse::<f64>().map_err(|e| format!("--rect: {}", e)))
        .collect::<Result<Vec<f64>, String>>()?;
    <[f64; 4]>::try_from(numbers).map_err(|_| "--rect needs x,y,w,h".to_string())
}

fn run(invocation: Invocation) -> Result<(), Box<dyn std::error::Error>> {
    match invocation.command {
        Command::List { input } => {
            let doc = Document::open(&input)?;
            println!("{}", serde_json::to_string_pretty(&doc.list_fields())?);
        },
        Command::Add {
            input,
            output,
            name,
            options,
        } => {
            let mut doc = Document::open(&input)?;
            let field = doc
                .add_field(&name, options)
                .ok_or_else(|| format!("could not add field {:?}", name))?;
            doc.write_to(&output, &invocation.save)?;
            println!("{}", field);
        },
        Command::Update {
            input,
            output,
            name,
            value,
            options,
        } => {
            let mut doc = Document::open(&input)?;
            if !doc.update_field(&name, &value, options) {
                return Err(format!("could not update field {:?}", name).into());
            }
            doc.write_to(&output, &invocation.save)?;
        },
        Command::Remove { input, output, name } => {
            let mut doc = Document::open(&input)?;
            if !doc.remove_field(name.as_str()) {
                return Err(format!("could not remove field {:?}", name).into());
            }
            doc.write_to(&output, &invocation.save)?;
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match Invocation::from_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {}\n{}", e, USAGE);
            return ExitCode::FAILURE;
        },
    };

    match run(invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use blabber::{BlabberDialogue, JsonFileSlot};

const USAGE: &str = "\
Usage: blabber [--compact] <command> <dialogue.json> [argument]

Commands:
  info                     summarize the dialogue
  prune                    print the document with no-op actions removed
  add-state <key>          print the document with a blank state at <key>
  remove-state <key>       print the document without <key>
  start-at [key]           print the document starting at <key> (cleared if omitted)
  layout <type>            print the document with a new layout type
  unskippable <true|false> print the document with the skip flag set
  save <slot.json>         prune and merge the document into a history slot file

Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

struct OutputConfig {
    /// Pretty-print emitted documents.
    pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Info,
    Prune,
    AddState(String),
    RemoveState(String),
    StartAt(Option<String>),
    Layout(String),
    Unskippable(bool),
    Save(String),
}

impl Command {
    fn parse(name: &str, argument: Option<&str>) -> Result<Self> {
        let required = |what: &str| {
            argument
                .map(str::to_owned)
                .with_context(|| format!("'{name}' needs a {what}\n\n{USAGE}"))
        };

        Ok(match name {
            "info" => Command::Info,
            "prune" => Command::Prune,
            "add-state" => Command::AddState(required("state key")?),
            "remove-state" => Command::RemoveState(required("state key")?),
            "start-at" => Command::StartAt(argument.map(str::to_owned)),
            "layout" => Command::Layout(required("layout type")?),
            "unskippable" => {
                let flag = required("true/false flag")?;
                Command::Unskippable(
                    flag.parse()
                        .with_context(|| format!("expected true or false, got '{flag}'"))?,
                )
            }
            "save" => Command::Save(required("slot path")?),
            other => bail!("unknown command '{other}'\n\n{USAGE}"),
        })
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Control verbosity with RUST_LOG:
    //   RUST_LOG=info   blabber info quest.json   # loads and saves
    //   RUST_LOG=debug  blabber prune quest.json  # + per-edit details
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut config = OutputConfig::default();
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(pos) = args.iter().position(|a| a == "--compact") {
        args.remove(pos);
        config.pretty = false;
    }

    let name = args.first().context(USAGE)?;
    let path = args.get(1).context(USAGE)?;
    let command = Command::parse(name, args.get(2).map(String::as_str))?;

    let dialogue = load(Path::new(path))?;
    run(&config, command, &dialogue)
}

fn load(path: &Path) -> Result<BlabberDialogue> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let dialogue = BlabberDialogue::from_json_str(&raw, filename)
        .with_context(|| format!("failed to load {}", path.display()))?;

    info!(
        "Loaded {} ({} states)",
        path.display(),
        dialogue.states().len()
    );
    Ok(dialogue)
}

fn run(config: &OutputConfig, command: Command, dialogue: &BlabberDialogue) -> Result<()> {
    let derived = match command {
        Command::Info => {
            println!("{}", summarize(dialogue));
            return Ok(());
        }
        Command::Save(slot_path) => {
            let mut slot = JsonFileSlot::new(slot_path);
            dialogue.prune().save_to(&mut slot)?;
            println!("Saved to {}", slot.path().display());
            return Ok(());
        }
        Command::Prune => dialogue.prune(),
        Command::AddState(key) => dialogue.with_added_state(&key),
        Command::RemoveState(key) => dialogue.with_removed_state(&key),
        Command::StartAt(key) => dialogue.with_start_at(key.as_deref()),
        Command::Layout(layout) => dialogue.with_layout(&layout),
        Command::Unskippable(flag) => dialogue.with_unskippability(flag),
    };

    let json = derived.to_json()?;
    let out = if config.pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{out}");
    Ok(())
}

fn summarize(dialogue: &BlabberDialogue) -> String {
    let mut s = String::new();
    s.push_str(&format!(
        "File        : {}\n",
        dialogue.filename().unwrap_or("-")
    ));
    s.push_str(&format!("Loaded      : {}\n", dialogue.is_loaded()));
    s.push_str(&format!(
        "Start at    : {}\n",
        dialogue.start_at().unwrap_or("-")
    ));
    s.push_str(&format!("Layout      : {}\n", dialogue.layout().unwrap_or("-")));
    s.push_str(&format!("Unskippable : {}\n", dialogue.unskippable()));
    s.push_str(&format!("States      : {}", dialogue.states().len()));
    for (key, state) in dialogue.states() {
        let next: Vec<&str> = state.next_keys().collect();
        s.push_str(&format!("\n  {key} -> [{}]", next.join(", ")));
    }
    s
}

use vg_core::{GenerationSettings, Orientation, Quality, VideoDuration, VideoModel};

use crate::error::AppError;

pub const USAGE: &str = "\
Usage: vg-app <command> [args]

Commands:
  generate <prompt> [settings]     Submit a prompt and track it to completion
  track <id>                       Track an existing job
  resume                           Track every job still in flight
  history                          List stored jobs, most recent first
  show <id>                        Show one job
  remove <id>                      Remove one job from history
  clear                            Remove all history
  clear-completed                  Remove completed and failed jobs
  stats                            Summarize the history
  key <value> | key --clear        Save or forget the API key
  favorites [--clear]              List or forget saved prompts
  favorite add <name> <prompt> [settings]
  favorite remove <id>

Settings:
  --duration <5|10|20>  --quality <standard|high>
  --orientation <landscape|portrait|square>  --model <sora-2|sora-2-pro>";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Generate {
        prompt: String,
        settings: GenerationSettings,
    },
    Track {
        job_id: String,
    },
    Resume,
    History,
    Show {
        job_id: String,
    },
    Remove {
        job_id: String,
    },
    Clear,
    ClearCompleted,
    Stats,
    SetKey(String),
    ClearKey,
    Favorites,
    ClearFavorites,
    AddFavorite {
        name: String,
        prompt: String,
        settings: GenerationSettings,
    },
    RemoveFavorite {
        id: String,
    },
    Help,
}

/// Parse the arguments after the program name.
pub fn parse<I, S>(args: I) -> Result<Command, AppError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into);
    let Some(command) = args.next() else {
        return Ok(Command::Help);
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "generate" => {
            let (words, settings) = split_settings(&rest)?;
            Ok(Command::Generate {
                prompt: words.join(" "),
                settings,
            })
        }
        "track" => Ok(Command::Track {
            job_id: single(&rest, "track <id>")?,
        }),
        "resume" => no_args(&rest, Command::Resume),
        "history" => no_args(&rest, Command::History),
        "show" => Ok(Command::Show {
            job_id: single(&rest, "show <id>")?,
        }),
        "remove" => Ok(Command::Remove {
            job_id: single(&rest, "remove <id>")?,
        }),
        "clear" => no_args(&rest, Command::Clear),
        "clear-completed" => no_args(&rest, Command::ClearCompleted),
        "stats" => no_args(&rest, Command::Stats),
        "key" => match single(&rest, "key <value> | key --clear")?.as_str() {
            "--clear" => Ok(Command::ClearKey),
            key => Ok(Command::SetKey(key.to_string())),
        },
        "favorites" => match rest.as_slice() {
            [flag] if flag == "--clear" => Ok(Command::ClearFavorites),
            _ => no_args(&rest, Command::Favorites),
        },
        "favorite" => parse_favorite(&rest),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => Err(AppError::Usage(format!("Unknown command `{other}`"))),
    }
}

fn parse_favorite(args: &[String]) -> Result<Command, AppError> {
    match args.split_first() {
        Some((sub, rest)) if sub == "add" => {
            let (words, settings) = split_settings(rest)?;
            let Some((name, prompt)) = words.split_first() else {
                return Err(AppError::Usage("favorite add <name> <prompt>".into()));
            };
            Ok(Command::AddFavorite {
                name: name.clone(),
                prompt: prompt.join(" "),
                settings,
            })
        }
        Some((sub, rest)) if sub == "remove" => Ok(Command::RemoveFavorite {
            id: single(rest, "favorite remove <id>")?,
        }),
        _ => Err(AppError::Usage("favorite add|remove".into())),
    }
}

fn no_args(args: &[String], command: Command) -> Result<Command, AppError> {
    match args {
        [] => Ok(command),
        [extra, ..] => Err(AppError::Usage(format!("Unexpected argument `{extra}`"))),
    }
}

fn single(args: &[String], usage: &str) -> Result<String, AppError> {
    match args {
        [value] => Ok(value.clone()),
        _ => Err(AppError::Usage(usage.to_string())),
    }
}

/// Separate `--flag value` settings from the positional words.
fn split_settings(args: &[String]) -> Result<(Vec<String>, GenerationSettings), AppError> {
    let mut settings = GenerationSettings::default();
    let mut words = Vec::new();

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            words.push(arg.clone());
            continue;
        };
        let value = args
            .next()
            .ok_or_else(|| AppError::Usage(format!("--{flag} needs a value")))?;

        match flag {
            "duration" => {
                let secs: u32 = value
                    .parse()
                    .map_err(|_| AppError::Usage(format!("Invalid duration `{value}`")))?;
                settings.duration = VideoDuration::try_from(secs)
                    .map_err(|e| AppError::Usage(e.to_string()))?;
            }
            "quality" => settings.quality = lookup(Quality::from_id(value), flag, value)?,
            "orientation" => {
                settings.orientation = lookup(Orientation::from_id(value), flag, value)?
            }
            "model" => settings.model = lookup(VideoModel::from_id(value), flag, value)?,
            _ => return Err(AppError::Usage(format!("Unknown option `--{flag}`"))),
        }
    }

    Ok((words, settings))
}

fn lookup<T>(parsed: Option<T>, flag: &str, value: &str) -> Result<T, AppError> {
    parsed.ok_or_else(|| AppError::Usage(format!("Invalid {flag} `{value}`")))
}

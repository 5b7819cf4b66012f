use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Editor;
use rustyline::{Context, Helper};
use tracing_subscriber::EnvFilter;

use quarterdeck_core::config::ConsoleConfig;
use quarterdeck_core::entity::{EntityKind, UserStatus};
use quarterdeck_core::event::{MenuChoice, OperatorEvent, RenderPayload, View};
use quarterdeck_core::session::PendingAction;
use quarterdeck_core::template::TemplateSet;
use quarterdeck_engine::{SessionKey, StaticAllowList, WizardEngine};
use quarterdeck_gateway::{GatewayClient, Repositories, ReqwestTransport};

const COMMANDS: &[&str] = &[
    "/user",
    "/node",
    "/host",
    "/inbound",
    "/config-profile",
    "/list",
    "/page",
    "/pick",
    "/search",
    "/create",
    "/template",
    "/manual",
    "/edit",
    "/keep",
    "/skip",
    "/action",
    "/stats",
    "/yes",
    "/no",
    "/back",
    "/cancel",
];

/// Readline helper: slash-command completion, hints and highlighting.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

fn parse_status(raw: &str) -> Result<UserStatus, String> {
    match raw.to_ascii_lowercase().as_str() {
        "active" => Ok(UserStatus::Active),
        "disabled" => Ok(UserStatus::Disabled),
        "limited" => Ok(UserStatus::Limited),
        "expired" => Ok(UserStatus::Expired),
        other => Err(format!("unknown status '{other}'")),
    }
}

fn parse_action(raw: &str, arg: Option<&str>) -> Result<PendingAction, String> {
    match raw {
        "disable" => Ok(PendingAction::Disable),
        "enable" => Ok(PendingAction::Enable),
        "reset-traffic" => Ok(PendingAction::ResetTraffic),
        "revoke" => Ok(PendingAction::RevokeSubscription),
        "restart" => Ok(PendingAction::Restart),
        "delete" => Ok(PendingAction::Delete),
        "bulk-reset" => Ok(PendingAction::BulkResetAllTraffic),
        "bulk-delete" => {
            let status = arg.ok_or("usage: /action bulk-delete <status>")?;
            Ok(PendingAction::BulkDeleteByStatus(parse_status(status)?))
        }
        other => Err(format!("unknown action '{other}'")),
    }
}

/// Decodes one input line into an operator event. Plain text becomes a
/// free-text event; everything structural is a slash command.
fn parse_event(line: &str) -> Result<OperatorEvent, String> {
    if !line.starts_with('/') {
        return Ok(OperatorEvent::Text(line.to_string()));
    }

    let mut parts = line[1..].split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.next();
    let arg2 = parts.next();

    let choice = match command {
        "list" => MenuChoice::List,
        "create" => MenuChoice::Create,
        "manual" => MenuChoice::Manual,
        "keep" => MenuChoice::KeepTemplateValue,
        "skip" => MenuChoice::Skip,
        "stats" => MenuChoice::Stats,
        "back" => MenuChoice::Back,
        "cancel" => return Ok(OperatorEvent::Cancel),
        "yes" => return Ok(OperatorEvent::Confirm(true)),
        "no" => return Ok(OperatorEvent::Confirm(false)),
        "page" => {
            let n = arg
                .and_then(|a| a.parse().ok())
                .ok_or("usage: /page <number>")?;
            MenuChoice::Page(n)
        }
        "pick" => {
            let id = arg.ok_or("usage: /pick <number>")?;
            MenuChoice::Pick(id.to_string())
        }
        "search" => {
            let criterion = arg
                .ok_or("usage: /search <username|telegram-id|email|tag>")?
                .parse()
                .map_err(|_| "usage: /search <username|telegram-id|email|tag>".to_string())?;
            MenuChoice::Search(criterion)
        }
        "template" => {
            let name = arg.ok_or("usage: /template <name>")?;
            MenuChoice::Template(name.to_string())
        }
        "edit" => {
            let field = arg
                .ok_or("usage: /edit <field>")?
                .parse()
                .map_err(|_| format!("unknown field '{}'", arg.unwrap_or_default()))?;
            MenuChoice::EditField(field)
        }
        "action" => {
            let action = parse_action(arg.ok_or("usage: /action <name>")?, arg2)?;
            MenuChoice::Action(action)
        }
        other => match other.parse::<EntityKind>() {
            Ok(kind) => MenuChoice::Kind(kind),
            Err(_) => return Err(format!("unknown command '/{other}'")),
        },
    };

    Ok(OperatorEvent::Menu(choice))
}

fn render(payload: &RenderPayload) {
    match &payload.view {
        View::MainMenu => {
            println!("{}", "Entity kinds:".bright_yellow());
            println!("  /user /node /host /inbound /config-profile");
            println!("{}", "  /stats for panel-wide statistics".bright_black());
        }
        View::Denied => {
            println!("{}", "Access denied.".red().bold());
        }
        View::EntityMenu { kind, selected } => {
            println!("{}", format!("[{}]", kind.label()).bright_magenta());
            if let Some(summary) = selected {
                println!(
                    "  selected: {} ({})",
                    summary.name.bright_blue(),
                    summary.uuid
                );
            }
            println!(
                "{}",
                "  /list /search /create /edit /action /back".bright_black()
            );
        }
        View::EntityPage {
            kind,
            items,
            page,
            total_pages,
        } => {
            println!(
                "{}",
                format!("{}s, page {page}/{total_pages}", kind.label()).bright_yellow()
            );
            for (short_id, summary) in items {
                println!(
                    "  {} {} {}",
                    format!("[{short_id}]").bright_cyan(),
                    summary.name.bright_blue(),
                    summary.detail.bright_black()
                );
            }
            println!("{}", "  /pick <n>, /page <n>, /back".bright_black());
        }
        View::SearchPrompt { kind, criterion } => {
            println!(
                "{}",
                format!("Enter a {criterion} to search {}s:", kind.label()).bright_yellow()
            );
        }
        View::FieldPrompt {
            label,
            template_value,
            notice,
            ..
        } => {
            if let Some(notice) = notice {
                println!("{}", notice.red());
            }
            println!("{}", format!("Enter {label}:").bright_yellow());
            if let Some(value) = template_value {
                println!(
                    "{}",
                    format!("  template value: {value} (/keep to accept)").bright_black()
                );
            }
        }
        View::ConfirmAction { action, target } => {
            println!(
                "{}",
                format!("Confirm {action} for '{target}'? (/yes or /no)").bright_yellow()
            );
        }
        View::TypedPrompt { target } => {
            println!(
                "{}",
                format!("Type the exact name '{target}' to confirm deletion:")
                    .red()
                    .bold()
            );
        }
        View::Created { kind, summary } => {
            println!(
                "{}",
                format!("{} '{}' created ({})", kind.label(), summary.name, summary.uuid).green()
            );
        }
        View::Notice(message) => {
            println!("{}", message.green());
        }
        View::Error(message) => {
            println!("{}", message.red());
        }
    }
}

/// Environment wins; a `quarterdeck.toml` next to the binary is the
/// fallback for the less common knobs.
fn load_config() -> Result<ConsoleConfig> {
    match ConsoleConfig::from_env() {
        Ok(config) => Ok(config),
        Err(env_err) => match std::fs::read_to_string("quarterdeck.toml") {
            Ok(raw) => Ok(ConsoleConfig::from_toml(&raw)?),
            Err(_) => Err(env_err.into()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = load_config()?;
    let transport = Arc::new(ReqwestTransport::new(&config)?);
    let client = Arc::new(GatewayClient::from_config(transport, &config));
    let repos = Repositories::new(client, config.page_size);
    let auth = Arc::new(StaticAllowList::new(config.admin_ids.iter().copied()));
    let engine = WizardEngine::new(repos, auth, TemplateSet::builtin(), config.page_size);

    let operator = config.admin_ids.first().copied().unwrap_or(0);
    let key = SessionKey::new(operator, 0);
    tracing::info!(operator, base_url = %config.api_base_url, "console started");

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== Quarterdeck ===".bright_magenta().bold());
    println!(
        "{}",
        "Pick an entity kind (/user, /node, ...) or type 'quit' to exit.".bright_black()
    );
    println!();

    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match parse_event(trimmed) {
                    Ok(event) => {
                        let payload = engine.handle_event(key, event).await;
                        render(&payload);
                    }
                    Err(message) => println!("{}", message.red()),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {err:?}").red());
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarterdeck_core::session::SearchCriterion;
    use quarterdeck_core::validation::FieldKind;

    #[test]
    fn plain_text_becomes_a_text_event() {
        assert_eq!(
            parse_event("bob_01").unwrap(),
            OperatorEvent::Text("bob_01".to_string())
        );
    }

    #[test]
    fn kind_commands_parse() {
        assert_eq!(
            parse_event("/user").unwrap(),
            OperatorEvent::Menu(MenuChoice::Kind(EntityKind::User))
        );
        assert_eq!(
            parse_event("/config-profile").unwrap(),
            OperatorEvent::Menu(MenuChoice::Kind(EntityKind::ConfigProfile))
        );
    }

    #[test]
    fn commands_with_arguments_parse() {
        assert_eq!(
            parse_event("/pick 3").unwrap(),
            OperatorEvent::Menu(MenuChoice::Pick("3".to_string()))
        );
        assert_eq!(
            parse_event("/search telegram-id").unwrap(),
            OperatorEvent::Menu(MenuChoice::Search(SearchCriterion::TelegramId))
        );
        assert_eq!(
            parse_event("/edit traffic-limit-bytes").unwrap(),
            OperatorEvent::Menu(MenuChoice::EditField(FieldKind::TrafficLimitBytes))
        );
        assert_eq!(
            parse_event("/action bulk-delete expired").unwrap(),
            OperatorEvent::Menu(MenuChoice::Action(PendingAction::BulkDeleteByStatus(
                UserStatus::Expired
            )))
        );
    }

    #[test]
    fn confirmations_and_cancel_parse() {
        assert_eq!(parse_event("/yes").unwrap(), OperatorEvent::Confirm(true));
        assert_eq!(parse_event("/no").unwrap(), OperatorEvent::Confirm(false));
        assert_eq!(parse_event("/cancel").unwrap(), OperatorEvent::Cancel);
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse_event("/frobnicate").is_err());
        assert!(parse_event("/action explode").is_err());
        assert!(parse_event("/page x").is_err());
    }
}

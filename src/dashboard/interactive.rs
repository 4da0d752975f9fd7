//! Line-oriented session: sign in, then select companies and read pages.

use super::Dashboard;
use crate::auth::{Authenticator, Session};
use crate::error::Result;
use crate::render;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

const HELP: &str =
    "Commands: select <company> | limit <n> | companies | reload | export [dir] | logout | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(String),
    Limit(usize),
    Companies,
    Reload,
    Export(Option<PathBuf>),
    Logout,
    Quit,
    Help,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "select" | "s" if !rest.is_empty() => Command::Select(rest.to_string()),
            "limit" | "l" => match rest.parse() {
                Ok(n) => Command::Limit(n),
                Err(_) => Command::Unknown(line.to_string()),
            },
            "companies" | "c" => Command::Companies,
            "reload" => Command::Reload,
            "export" | "e" => Command::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "logout" => Command::Logout,
            "quit" | "exit" | "q" => Command::Quit,
            "help" | "?" | "" => Command::Help,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

struct Prompter<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Run until `quit` or end of input.
pub fn run<R: BufRead, W: Write>(
    dashboard: &mut Dashboard<'_>,
    auth: &dyn Authenticator,
    input: R,
    out: W,
) -> Result<()> {
    let mut io = Prompter { input, out };
    let mut session = Session::default();
    let mut selection: Option<String> = None;
    let mut limit: Option<usize> = None;

    loop {
        if !session.is_signed_in() {
            let Some(username) = io.ask("Username: ")? else { break };
            let Some(password) = io.ask("Password: ")? else { break };
            if !session.sign_in(auth, username.trim(), &password, false) {
                writeln!(io.out, "Invalid credentials.")?;
                continue;
            }
            writeln!(io.out, "Signed in as {}. {}", session.user().unwrap_or_default(), HELP)?;
        }

        let Some(line) = io.ask("> ")? else { break };
        match Command::parse(&line) {
            Command::Select(query) => {
                selection = Some(query);
                limit = None;
            }
            Command::Limit(n) => {
                limit = Some(n);
                if selection.is_none() {
                    writeln!(io.out, "Select a company first.")?;
                    continue;
                }
            }
            Command::Companies => {
                match dashboard.company_options() {
                    Ok(options) => write!(io.out, "{}", render::options(options))?,
                    Err(e) => writeln!(io.out, "⚠ Companies unavailable: {}", e)?,
                }
                continue;
            }
            Command::Reload => {
                dashboard.reload_options();
                writeln!(io.out, "Company list will be reloaded.")?;
                continue;
            }
            Command::Export(dir) => {
                let Some(query) = selection.as_deref() else {
                    writeln!(io.out, "Select a company first.")?;
                    continue;
                };
                let dir = dir.unwrap_or_else(|| PathBuf::from("."));
                match dashboard.export(&session, query, &dir) {
                    Ok(Some(path)) => writeln!(io.out, "Exported {}", path.display())?,
                    Ok(None) => writeln!(io.out, "ℹ {}", super::NO_BROKERS)?,
                    Err(e) => {
                        warn!("export failed: {}", e);
                        writeln!(io.out, "Something went wrong: {}", e)?;
                    }
                }
                continue;
            }
            Command::Logout => {
                session.sign_out();
                selection = None;
                limit = None;
                writeln!(io.out, "Signed out.")?;
                continue;
            }
            Command::Quit => break,
            Command::Help => {
                writeln!(io.out, "{}", HELP)?;
                continue;
            }
            Command::Unknown(text) => {
                writeln!(io.out, "Unknown command {:?}. {}", text, HELP)?;
                continue;
            }
        }

        // Select and Limit re-evaluate the page.
        if let Some(query) = selection.as_deref() {
            match dashboard.evaluate(&session, query, limit) {
                Ok(page) => write!(io.out, "{}", render::page(&page, false))?,
                Err(e) => {
                    warn!("page evaluation failed: {}", e);
                    writeln!(io.out, "Something went wrong: {}", e)?;
                }
            }
        }
    }
    Ok(())
}

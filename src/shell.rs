//! Interactive command loop over one loaded session.
//!
//! Reads one command per line until `quit`, `q`, `exit` or end of input.
//! Generic over reader and writer so tests can drive it with in-memory
//! buffers.

use std::io::{self, BufRead, Write};

use scan_debugger_core::query::Session;

use crate::config::DisplayConfig;
use crate::render;

pub const PROMPT: &str = "(scandbg) ";

const HELP: &str = "\
Available commands:
  count [filters]                     Count exchanges
  list [filters]                      List exchanges
  summary [full] [filters]            Summarize endpoints
  info <id|number>... [--no-body] [filters]
                                      Show full exchange details
  params <id|number> [filters]        Show request parameters
  help                                Show this help
  quit | q                            Exit

Filters are key=value pairs, e.g. method=GET status_code=200 size=0-1024.
Prefix a value with ! to invert it: method=!GET.
Keys: method url status_code inferred_status_code coverage size
      content_type requester path in_schema";

pub struct Shell<'a> {
    session: &'a Session,
    display: &'a DisplayConfig,
}

enum Flow {
    Continue,
    Quit,
}

impl<'a> Shell<'a> {
    pub fn new(session: &'a Session, display: &'a DisplayConfig) -> Self {
        Self { session, display }
    }

    pub fn run<R: BufRead, W: Write>(&self, mut input: R, out: &mut W) -> io::Result<()> {
        writeln!(out, "Welcome to the Scan Debugger CLI!")?;
        writeln!(out, "{}", HELP)?;

        let mut line = String::new();
        loop {
            write!(out, "{}", PROMPT)?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                break;
            }
            if let Flow::Quit = self.execute(line.trim(), out)? {
                break;
            }
        }
        Ok(())
    }

    /// Run a single command line.
    fn execute(&self, line: &str, out: &mut dyn Write) -> io::Result<Flow> {
        let (command, arg) = split_word(line);
        tracing::debug!(command, arg, "shell command");

        match command {
            "" => {}
            "count" => render::write_count(out, &self.session.count(arg))?,
            "list" => render::write_listing(out, &self.session.list(arg))?,
            "summary" => {
                let (first, rest) = split_word(arg);
                let summary = if first.eq_ignore_ascii_case("full") {
                    self.session.summarize(rest, true)
                } else {
                    self.session.summarize(arg, false)
                };
                render::write_summary(out, &summary, self.display)?;
            }
            "info" => self.info(arg, out)?,
            "params" => self.params(arg, out)?,
            "help" | "?" => writeln!(out, "{}", HELP)?,
            "quit" | "q" | "exit" => return Ok(Flow::Quit),
            other => writeln!(
                out,
                "Unknown command: '{}'. Type 'help' for available commands",
                other
            )?,
        }
        Ok(Flow::Continue)
    }

    fn info(&self, arg: &str, out: &mut dyn Write) -> io::Result<()> {
        let (arg, no_body) = take_flag(arg, "--no-body");
        let (selectors, filter) = split_selectors(&arg);
        if selectors.is_empty() {
            return writeln!(out, "Please specify an exchange id or number");
        }

        let spec = self.session.filter(filter);
        let show_bodies = self.display.show_bodies && !no_body;
        for selector in selectors {
            match self.session.detail_matching(selector, &spec) {
                Ok(detail) => render::write_detail(out, &detail, show_bodies)?,
                Err(err) => render::write_query_error(out, &err)?,
            }
        }
        Ok(())
    }

    fn params(&self, arg: &str, out: &mut dyn Write) -> io::Result<()> {
        let (selector, filter) = split_word(arg);
        if selector.is_empty() {
            return writeln!(out, "Please specify an exchange id or number");
        }
        match self.session.params(selector, filter) {
            Ok(view) => render::write_params(out, &view),
            Err(err) => render::write_query_error(out, &err),
        }
    }
}

/// Split off the first whitespace-delimited word; the rest keeps its quoting.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

/// Remove every standalone occurrence of `flag`.
fn take_flag(arg: &str, flag: &str) -> (String, bool) {
    let mut kept = String::with_capacity(arg.len());
    let mut found = false;
    let mut rest = arg;
    while let Some(start) = rest.find(flag) {
        let end = start + flag.len();
        let standalone = rest[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace)
            && rest[end..].chars().next().map_or(true, char::is_whitespace);
        if standalone {
            found = true;
            kept.push_str(&rest[..start]);
            rest = rest[end..].trim_start();
        } else {
            kept.push_str(&rest[..end]);
            rest = &rest[end..];
        }
    }
    kept.push_str(rest);
    (kept, found)
}

/// Leading numbers are all selectors; otherwise only the first word is.
fn split_selectors(arg: &str) -> (Vec<&str>, &str) {
    let (first, rest) = split_word(arg);
    if first.is_empty() {
        return (Vec::new(), "");
    }
    if !is_number(first) {
        return (vec![first], rest);
    }

    let mut selectors = vec![first];
    let mut remaining = rest;
    loop {
        let (word, after) = split_word(remaining);
        if word.is_empty() || !is_number(word) {
            break;
        }
        selectors.push(word);
        remaining = after;
    }
    (selectors, remaining)
}

fn is_number(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_digit())
}

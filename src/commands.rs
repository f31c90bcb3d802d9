//! Command line parsing for the panel manager
//!
//! Verbs are whitespace separated; arguments may be quoted with `"` or `'`
//! to keep spaces. Unknown verbs are returned as [`Command::External`].

use std::path::PathBuf;

use crate::errors::{VfsError, VfsResult};
use crate::fs::{Entry, Stat};
use crate::state::Side;
use crate::transfer::TransferOp;

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Remote target, archive file or directory
    Navigate(String),
    /// Remount the local filesystem, optionally at a path
    Local(Option<String>),
    List(Option<String>),
    Stat(String),
    Open(String),
    /// `None` transfers the selection into the other panel
    Copy(Option<(String, String)>),
    Move(Option<(String, String)>),
    Delete,
    Select(Vec<String>),
    Unselect(Vec<String>),
    Clear,
    Switch,
    Cancel,
    Mkdir(String),
    /// Create an empty file, or bump the mtime of an existing one
    Touch(String),
    External { program: String, args: Vec<String> },
}

/// What a command produced, for the front end to show
#[derive(Debug)]
pub enum CommandOutcome {
    Listing { path: String, entries: Vec<Entry> },
    Stat { path: String, stat: Stat },
    Content { path: String, data: Vec<u8> },
    Navigated {
        label: String,
        path: String,
        writable: bool,
        seekable: bool,
    },
    TransferStarted { op: TransferOp, items: usize },
    /// Size of the active selection after an edit
    Selection(usize),
    Switched(Side),
    Cancelled,
    Created(String),
    /// Run by the host in `cwd` (when the active panel is local)
    External { program: String, args: Vec<String>, cwd: Option<PathBuf> },
}

/// Split a line into words, honoring single and double quotes
pub fn split_words(line: &str) -> VfsResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(VfsError::InvalidTarget(format!("unterminated quote in: {}", line)));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn one(verb: &str, args: Vec<String>) -> VfsResult<String> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(VfsError::InvalidTarget(format!("{} takes exactly one argument", verb))),
    }
}

fn optional(verb: &str, args: Vec<String>) -> VfsResult<Option<String>> {
    match args.len() {
        0 => Ok(None),
        _ => one(verb, args).map(Some),
    }
}

fn pair(verb: &str, args: Vec<String>) -> VfsResult<Option<(String, String)>> {
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (None, _, _) => Ok(None),
        (Some(src), Some(dst), None) => Ok(Some((src, dst))),
        _ => Err(VfsError::InvalidTarget(format!("{} takes no arguments or <source> <destination>", verb))),
    }
}

fn some_paths(verb: &str, args: Vec<String>) -> VfsResult<Vec<String>> {
    if args.is_empty() {
        return Err(VfsError::InvalidTarget(format!("{} needs at least one path", verb)));
    }
    Ok(args)
}

fn none(verb: &str, args: &[String], command: Command) -> VfsResult<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(VfsError::InvalidTarget(format!("{} takes no arguments", verb)))
    }
}

impl Command {
    pub fn parse(line: &str) -> VfsResult<Self> {
        let mut words = split_words(line)?.into_iter();
        let Some(verb) = words.next() else {
            return Err(VfsError::InvalidTarget("empty command".to_string()));
        };
        let args: Vec<String> = words.collect();

        match verb.as_str() {
            "navigate" | "cd" => one(&verb, args).map(Command::Navigate),
            "local" => optional(&verb, args).map(Command::Local),
            "list" | "ls" => optional(&verb, args).map(Command::List),
            "stat" => one(&verb, args).map(Command::Stat),
            "open" | "cat" => one(&verb, args).map(Command::Open),
            "copy" | "cp" => pair(&verb, args).map(Command::Copy),
            "move" | "mv" => pair(&verb, args).map(Command::Move),
            "delete" | "rm" => none(&verb, &args, Command::Delete),
            "select" => some_paths(&verb, args).map(Command::Select),
            "unselect" => some_paths(&verb, args).map(Command::Unselect),
            "clear" => none(&verb, &args, Command::Clear),
            "switch" => none(&verb, &args, Command::Switch),
            "cancel" => none(&verb, &args, Command::Cancel),
            "mkdir" => one(&verb, args).map(Command::Mkdir),
            "touch" => one(&verb, args).map(Command::Touch),
            _ => Ok(Command::External { program: verb, args }),
        }
    }
}

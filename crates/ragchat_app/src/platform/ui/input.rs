use std::fs;
use std::path::{Path, PathBuf};

use ragchat_core::{Msg, UploadFile};

pub const HELP: &str = "\
commands:
  <text>              ask a question (start with // to send a leading slash)
  /upload <path>...   upload documents (quote paths with spaces)
  /files              refresh the document list
  /delete <name>      delete a document
  /clear              clear the chat
  /minimize           toggle the progress panel
  /dismiss            dismiss the upload status
  /reconnect          reconnect after the connection gave up
  /help               show this help
  /quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    Upload(Vec<PathBuf>),
    RefreshFiles,
    Delete(String),
    Clear,
    Minimize,
    Dismiss,
    Reconnect,
    Help,
    Quit,
    Unknown(String),
    Empty,
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if let Some(escaped) = line.strip_prefix("//") {
        return Command::Query(format!("/{escaped}"));
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Query(line.to_string());
    };
    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    match name {
        "upload" => Command::Upload(
            split_arguments(argument)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        ),
        "files" => Command::RefreshFiles,
        "delete" => Command::Delete(argument.to_string()),
        "clear" => Command::Clear,
        "minimize" => Command::Minimize,
        "dismiss" => Command::Dismiss,
        "reconnect" => Command::Reconnect,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Splits on whitespace; single or double quotes keep spaces together.
pub fn split_arguments(text: &str) -> Vec<String> {
    let mut arguments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut pending = false;
    for ch in text.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                pending = true;
            }
            None if ch.is_whitespace() => {
                if pending {
                    arguments.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            None => {
                current.push(ch);
                pending = true;
            }
        }
    }
    if pending {
        arguments.push(current);
    }
    arguments
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedUploads {
    pub files: Vec<UploadFile>,
    /// `(file name, reason)` for every path that could not be read.
    pub unreadable: Vec<(String, String)>,
}

/// Turns paths into upload candidates. Unreadable paths are reported
/// separately so the rest of the selection still goes through validation.
pub fn resolve_uploads(paths: &[PathBuf]) -> ResolvedUploads {
    let mut resolved = ResolvedUploads::default();
    for path in paths {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => resolved.files.push(UploadFile {
                name: file_name(path),
                size: meta.len(),
                path: path.clone(),
            }),
            Ok(_) => resolved
                .unreadable
                .push((file_name(path), "not a regular file".to_string())),
            Err(err) => resolved.unreadable.push((file_name(path), err.to_string())),
        }
    }
    resolved
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Maps a command onto the core messages it stands for.
pub fn to_msgs(command: Command) -> Vec<Msg> {
    match command {
        Command::Query(text) => vec![Msg::QuerySubmitted(text)],
        Command::Upload(paths) => {
            let resolved = resolve_uploads(&paths);
            let mut msgs: Vec<Msg> = resolved
                .unreadable
                .iter()
                .map(|(filename, reason)| Msg::UploadUnreadable {
                    filename: filename.clone(),
                    reason: reason.clone(),
                })
                .collect();
            if !resolved.files.is_empty() || resolved.unreadable.is_empty() {
                msgs.push(Msg::UploadRequested(resolved.files));
            }
            msgs
        }
        Command::RefreshFiles => vec![Msg::RefreshFilesRequested],
        Command::Delete(filename) => vec![Msg::DeleteFileRequested { filename }],
        Command::Clear => vec![Msg::ClearChatClicked],
        Command::Minimize => vec![Msg::MinimizeToggled],
        Command::Dismiss => vec![Msg::UploadStatusDismissed],
        Command::Reconnect => vec![Msg::ReconnectRequested],
        Command::Help | Command::Quit | Command::Unknown(_) | Command::Empty => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_a_query() {
        assert_eq!(
            parse_line("  what changed in Q3?  "),
            Command::Query("what changed in Q3?".to_string())
        );
        assert_eq!(
            parse_line("//etc/hosts explained"),
            Command::Query("/etc/hosts explained".to_string())
        );
        assert_eq!(parse_line("   "), Command::Empty);
    }

    #[test]
    fn slash_commands_take_arguments() {
        assert_eq!(
            parse_line("/upload a.pdf  docs/b.md"),
            Command::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/b.md")])
        );
        assert_eq!(parse_line("/upload"), Command::Upload(Vec::new()));
        assert_eq!(
            parse_line("/delete old notes.pdf"),
            Command::Delete("old notes.pdf".to_string())
        );
        assert_eq!(parse_line("/files"), Command::RefreshFiles);
        assert_eq!(parse_line("/exit"), Command::Quit);
        assert_eq!(parse_line("/bogus x"), Command::Unknown("bogus".to_string()));
    }

    #[test]
    fn quoted_upload_paths_keep_their_spaces() {
        assert_eq!(
            parse_line(r#"/upload "my notes.pdf" 'q3 report.docx' plain.txt"#),
            Command::Upload(vec![
                PathBuf::from("my notes.pdf"),
                PathBuf::from("q3 report.docx"),
                PathBuf::from("plain.txt"),
            ])
        );
        assert_eq!(split_arguments(r#""" x"#), vec![String::new(), "x".to_string()]);
        assert_eq!(split_arguments("   "), Vec::<String>::new());
    }

    #[test]
    fn uploads_resolve_size_and_name_and_report_unreadable_paths() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("my notes.pdf");
        fs::write(&present, vec![0u8; 1234]).unwrap();
        let missing = dir.path().join("missing.pdf");

        let resolved = resolve_uploads(&[present.clone(), missing, dir.path().join(".")]);
        assert_eq!(
            resolved.files,
            vec![UploadFile {
                name: "my notes.pdf".to_string(),
                size: 1234,
                path: present,
            }]
        );
        assert_eq!(resolved.unreadable.len(), 2);
        assert_eq!(resolved.unreadable[0].0, "missing.pdf");
    }

    #[test]
    fn unreadable_paths_become_visible_notices() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.pdf");
        let line = format!("/upload \"{}\"", missing.display());

        let msgs = to_msgs(parse_line(&line));
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            &msgs[0],
            Msg::UploadUnreadable { filename, .. } if filename == "gone.pdf"
        ));
    }

    #[test]
    fn empty_upload_still_reaches_the_core() {
        assert_eq!(
            to_msgs(parse_line("/upload")),
            vec![Msg::UploadRequested(Vec::new())]
        );
        assert!(to_msgs(parse_line("/help")).is_empty());
    }
}

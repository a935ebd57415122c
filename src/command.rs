//! Slash-command parsing
//!
//! Maps one `/`-prefixed input line to a [`Command`]. Pure: no I/O and no
//! session state, so arity checking lives here and effects live in
//! [`crate::session`].

use crate::error::ChatError;

/// A parsed client command, borrowing from the input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    /// `/exit` or `/quit`
    Quit,
    User(&'a str),
    Join(&'a str),
    Leave(&'a str),
    Rooms,
    List,
    /// `/say <room> <message…>`, message kept verbatim
    Say { room: &'a str, message: &'a str },
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// Parse a line that starts with `/`
    ///
    /// Wrong argument counts come back as [`ChatError::Usage`].
    pub fn parse(line: &'a str) -> Result<Self, ChatError> {
        let mut fields = line.split_whitespace();
        let Some(token) = fields.next() else {
            return Ok(Command::Unknown(line));
        };
        let args: Vec<&str> = fields.collect();

        let cmd = match token {
            "/help" => Command::Help,
            "/exit" | "/quit" => Command::Quit,
            "/user" => Command::User(single(&args, "/user <username>")?),
            "/join" => Command::Join(single(&args, "/join <room>")?),
            "/leave" => Command::Leave(single(&args, "/leave <room>")?),
            "/rooms" => Command::Rooms,
            "/list" => Command::List,
            "/say" => {
                if args.len() < 2 {
                    return Err(ChatError::Usage("/say <room> <message>"));
                }
                let (room, message) = split_say(line);
                Command::Say { room, message }
            }
            other => Command::Unknown(other),
        };
        Ok(cmd)
    }
}

fn single<'a>(args: &[&'a str], usage: &'static str) -> Result<&'a str, ChatError> {
    match args {
        [one] => Ok(*one),
        _ => Err(ChatError::Usage(usage)),
    }
}

/// Split `/say <room> <message…>` into room and the untouched remainder
fn split_say(line: &str) -> (&str, &str) {
    let rest = skip_token(line);
    let room_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (room, message) = rest.split_at(room_end);
    (room, message.trim_start())
}

/// Drop leading whitespace, one token, and the whitespace after it
fn skip_token(s: &str) -> &str {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    s[end..].trim_start()
}

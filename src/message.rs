//! Outbound protocol text
//!
//! Everything the server writes to a client is a plain UTF-8 line (or a
//! block of lines) built here. Line terminators are added by the codec.

use chrono::{DateTime, Local, SecondsFormat};

/// Static help text for `/help`
pub const HELP_TEXT: &str = "\
Commands:
/help                    show this list
/exit, /quit             disconnect
/user <username>         change your username
/join <room>             join (or create) a room
/leave <room>            leave a room
/rooms                   list every room on the server
/list                    list the rooms you are in
/say <room> <message>    send a message to one room
Any other line is sent to every room you are in.";

/// Welcome banner sent once on connect
pub fn welcome(username: &str) -> String {
    format!(
        "Welcome to the chat server!\n\
         Type /help for a list of commands.\n\
         Your username is currently: {username}\n\
         Use the \"/user <username>\" command to change it"
    )
}

/// Format one room line as `<RFC3339 timestamp> <room> <sender>: <text>`
pub fn room_line(at: DateTime<Local>, room: &str, sender: &str, text: &str) -> String {
    format!(
        "{} {} {}: {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        room,
        sender,
        text
    )
}

pub fn joined(username: &str) -> String {
    format!("{username} has joined the room")
}

pub fn left(username: &str) -> String {
    format!("{username} has left the room")
}

pub fn renamed(old: &str, new: &str) -> String {
    format!("{old} is now known as {new}")
}

pub fn unknown_command(token: &str) -> String {
    format!("Unknown command: {token}")
}

/// Render a listing as header, one name per line, then a blank line
///
/// The blank line lets clients detect the end of the list.
pub fn listing<I, S>(header: &str, names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::from(header);
    for name in names {
        out.push('\n');
        out.push_str(name.as_ref());
    }
    out.push('\n');
    out
}

pub const ROOMS_HEADER: &str = "Here is a list of the current rooms:";
pub const MEMBERSHIPS_HEADER: &str = "You are in the following rooms:";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_room_line_format() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
        let line = room_line(at, "general", "alice", "hello  there");

        let (stamp, rest) = line.split_once(' ').unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(rest, "general alice: hello  there");
    }

    #[test]
    fn test_listing_ends_with_blank_line() {
        let text = listing(ROOMS_HEADER, ["general", "lobby"]);
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines, vec![ROOMS_HEADER, "general", "lobby", ""]);
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(listing(MEMBERSHIPS_HEADER, Vec::<String>::new()), format!("{MEMBERSHIPS_HEADER}\n"));
    }

    #[test]
    fn test_welcome_names_user() {
        assert!(welcome("Anonymous3").contains("Your username is currently: Anonymous3"));
    }
}

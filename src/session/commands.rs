//! Command-line parsing for the post-login prompt, grounded on
//! `doppelganger.go`'s `doCommand` dispatch table: a leading `/` introduces
//! a command, `'` is shorthand for `/say` and `;` for `/emote` (per the
//! original's own `/help` text), and anything else typed bare is ordinary
//! spoken text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Create(String),
    Join(String),
    Who,
    Exit,
    Help,
    Say(String),
    Think(String),
    Sing(String),
    Emote(String),
    Unknown(String),
}

pub fn parse(line: &str) -> Command {
    let line = crate::utils::trim(line);
    if line.is_empty() {
        return Command::Say(String::new());
    }

    if let Some(rest) = line.strip_prefix('\'') {
        return Command::Say(rest.trim_start().to_string());
    }
    if let Some(rest) = line.strip_prefix(';') {
        return Command::Emote(rest.trim_start().to_string());
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };

    let (word, argument) = match rest.split_once(char::is_whitespace) {
        Some((word, argument)) => (word, argument.trim_start()),
        None => (rest, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "list" => Command::List,
        "create" => Command::Create(argument.trim_start_matches('#').to_string()),
        "join" => Command::Join(argument.to_string()),
        "who" => Command::Who,
        "exit" | "quit" | "leave" => Command::Exit,
        "help" | "?" => Command::Help,
        "say" => Command::Say(argument.to_string()),
        "think" => Command::Think(argument.to_string()),
        "sing" => Command::Sing(argument.to_string()),
        "emote" | "me" => Command::Emote(argument.to_string()),
        _ => Command::Unknown(word.to_string()),
    }
}

pub const HELP_TEXT: &str = "\
/list                 -- list channels
/create <channelname> -- create a channel
/join <channelname>   -- join a channel
/who                  -- show who is on the current channel
/exit                 -- exit the current channel

Once on a channel:
/say   -- say something on the current channel
/emote -- emote on current channel
/think -- think something on current channel
/sing  -- sing something on current channel

/help  -- this command

Abbreviations:
' -- say
; -- emote

^D log off";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_text_is_said() {
        assert_eq!(parse("hello there"), Command::Say("hello there".to_string()));
    }

    #[test]
    fn leading_apostrophe_is_shorthand_for_say() {
        assert_eq!(parse("'what a day"), Command::Say("what a day".to_string()));
    }

    #[test]
    fn leading_semicolon_is_shorthand_for_emote() {
        assert_eq!(parse(";waves"), Command::Emote("waves".to_string()));
    }

    #[test]
    fn create_strips_a_leading_hash() {
        assert_eq!(parse("/create #lobby"), Command::Create("lobby".to_string()));
    }

    #[test]
    fn join_keeps_a_leading_hash_unlike_create() {
        assert_eq!(parse("/join #lobby"), Command::Join("#lobby".to_string()));
        assert_eq!(parse("/join lobby"), Command::Join("lobby".to_string()));
    }

    #[test]
    fn unknown_slash_word_is_preserved() {
        assert_eq!(parse("/dance"), Command::Unknown("dance".to_string()));
    }

    #[test]
    fn exit_aliases_all_map_to_exit() {
        assert_eq!(parse("/exit"), Command::Exit);
        assert_eq!(parse("/quit"), Command::Exit);
        assert_eq!(parse("/leave"), Command::Exit);
    }
}

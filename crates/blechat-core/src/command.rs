//! Slash commands typed into the chat line.
//!
//! A command word is identified by a token built from its second and third
//! bytes, its length and its CRC-8, so a short and a long alias (`/pc`,
//! `/privcode`) can map to the same handler through a const table.

use crate::config::{DebugLevel, Settings};
use crate::crc::crc8;
use crate::packet::{AppPacket, TEXT_LEN};

/// First byte of every command.
pub const COMMAND_PREFIX: u8 = b'/';

pub const HELP: &str = "\
[ /pc | /privcode ] <max18chartext>     [ /dm | /debugmode ] [0|1|2]
[ /mc | /mfgcode  ] <4hexdigits>        [ /mm | /meshmode  ] [0|1]
[ /q  | /quit ]                         [ /st | /status ]    [ /? ]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    PrivateCode,
    DebugMode,
    MeshMode,
    ManufacturerCode,
    Status,
    Quit,
    Help,
}

/// What a handled command did. Printing is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    PrivateCode(u8),
    DebugLevel(DebugLevel),
    MeshMode(bool),
    ManufacturerCode(u16),
    Status(Settings),
    Quit,
    Help,
}

/// Token for a command word: `word[1] << 24 | word[2] << 16 | len << 8 | crc8`.
/// Bytes past the end of the word count as 0.
pub const fn command_token(word: &[u8]) -> u32 {
    let second = if word.len() > 1 { word[1] } else { 0 };
    let third = if word.len() > 2 { word[2] } else { 0 };
    ((second as u32) << 24) | ((third as u32) << 16) | ((word.len() as u32) << 8) | crc8(word) as u32
}

const COMMANDS: [(u32, CommandKind); 13] = [
    (command_token(b"/pc"), CommandKind::PrivateCode),
    (command_token(b"/privcode"), CommandKind::PrivateCode),
    (command_token(b"/dm"), CommandKind::DebugMode),
    (command_token(b"/debugmode"), CommandKind::DebugMode),
    (command_token(b"/mm"), CommandKind::MeshMode),
    (command_token(b"/meshmode"), CommandKind::MeshMode),
    (command_token(b"/mc"), CommandKind::ManufacturerCode),
    (command_token(b"/mfgcode"), CommandKind::ManufacturerCode),
    (command_token(b"/st"), CommandKind::Status),
    (command_token(b"/status"), CommandKind::Status),
    (command_token(b"/q"), CommandKind::Quit),
    (command_token(b"/quit"), CommandKind::Quit),
    (command_token(b"/?"), CommandKind::Help),
];

/// Leading run of `text` up to a space or NUL, at most one packet of text.
fn word(text: &[u8]) -> &[u8] {
    let text = &text[..text.len().min(TEXT_LEN)];
    let end = text.iter().position(|&b| b == b' ' || b == 0).unwrap_or(text.len());
    &text[..end]
}

/// A recognised command and its optional argument word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub kind: CommandKind,
    pub arg: Option<&'a [u8]>,
}

/// Recognise a command in packet text. None for plain text and for unknown
/// slash words alike.
pub fn parse(text: &[u8]) -> Option<Invocation<'_>> {
    if text.first() != Some(&COMMAND_PREFIX) {
        return None;
    }
    let name = word(text);
    let token = command_token(name);
    let kind = COMMANDS.iter().find(|(t, _)| *t == token).map(|(_, k)| *k)?;

    let arg = text
        .get(name.len() + 1..)
        .map(word)
        .filter(|arg| !arg.is_empty());

    Some(Invocation { kind, arg })
}

/// Run the command carried by `packet` against `settings`.
///
/// Returns None when the text is not a recognised command. The caller then
/// treats it as an ordinary message, slash and all.
pub fn try_handle(settings: &mut Settings, packet: &AppPacket) -> Option<CommandOutcome> {
    let Invocation { kind, arg } = parse(packet.text())?;

    let outcome = match kind {
        CommandKind::PrivateCode => {
            settings.private_code = private_code(arg);
            CommandOutcome::PrivateCode(settings.private_code)
        }
        CommandKind::DebugMode => {
            settings.debug = arg
                .and_then(|a| a.first())
                .filter(|b| b.is_ascii_digit())
                .map(|b| DebugLevel::from_digit(b - b'0'))
                .unwrap_or(DebugLevel::Silent);
            CommandOutcome::DebugLevel(settings.debug)
        }
        CommandKind::MeshMode => {
            settings.mesh = matches!(arg.and_then(|a| a.first()), Some(b) if *b != b'0');
            CommandOutcome::MeshMode(settings.mesh)
        }
        CommandKind::ManufacturerCode => {
            settings.manufacturer_code = arg.map(parse_manufacturer_code).unwrap_or(0);
            CommandOutcome::ManufacturerCode(settings.manufacturer_code)
        }
        CommandKind::Status => CommandOutcome::Status(settings.clone()),
        CommandKind::Quit => CommandOutcome::Quit,
        CommandKind::Help => CommandOutcome::Help,
    };

    tracing::debug!(?outcome, "command handled");
    Some(outcome)
}

/// The 1-byte private code for a passphrase word; 0 when absent.
pub fn private_code(phrase: Option<&[u8]>) -> u8 {
    phrase.map(word).filter(|p| !p.is_empty()).map(crc8).unwrap_or(0)
}

/// Up to four leading hex digits; 0 when there are none.
pub fn parse_manufacturer_code(text: &[u8]) -> u16 {
    text.iter()
        .take(4)
        .map_while(|b| (*b as char).to_digit(16))
        .fold(0u16, |code, digit| (code << 4) | digit as u16)
}

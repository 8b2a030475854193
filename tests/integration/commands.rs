use blechat_core::command::{CommandOutcome, HELP};
use blechat_core::config::DebugLevel;
use blechat_core::Submission;

use crate::*;

/// Aliases change the same setting.
#[test]
fn test_aliases_share_effect() {
    let mut station = Station::new(Settings::default(), 0, 1);

    station.node.submit_line("/meshmode 1");
    assert!(station.node.settings().mesh);
    station.node.submit_line("/mm 0");
    assert!(!station.node.settings().mesh);

    station.node.submit_line("/mfgcode 5205");
    assert_eq!(station.node.settings().manufacturer_code, 0x5205);
    station.node.submit_line("/mc beef");
    assert_eq!(station.node.settings().manufacturer_code, 0xBEEF);

    assert_eq!(
        station.node.submit_line("/debugmode 2"),
        Submission::Command(CommandOutcome::DebugLevel(DebugLevel::Verbose))
    );
}

/// A typo'd command goes out as chat text.
#[test]
fn test_unknown_command_is_sent_as_text() {
    let mut station = Station::new(Settings::default(), 0, 2);

    let Submission::Queued(checksums) = station.node.submit_line("/statsu") else {
        panic!("unknown command was not queued");
    };
    assert_eq!(checksums.len(), 1);

    station.fire();
    let frame = station.radio.on_air.as_ref().unwrap();
    assert_eq!(&frame.payload[2..9], b"/statsu");
}

/// Commands never reach the air.
#[test]
fn test_commands_are_not_broadcast() {
    let mut station = Station::new(Settings::default(), 0, 3);
    station.node.submit_line("/?");
    station.node.submit_line("/st");

    assert_eq!(station.fire(), Slot::Quiet);
    assert!(station.radio.on_air.is_none());
    assert!(!HELP.is_empty());
}

/// `/quit` only raises the flag; the event loop acts on it.
#[test]
fn test_quit_flag() {
    let mut station = Station::new(Settings::default(), 0, 4);
    assert!(!station.node.quit_requested());
    assert_eq!(station.node.submit_line("/q"), Submission::Command(CommandOutcome::Quit));
    assert!(station.node.quit_requested());
}

/// A new private code changes what gets shown but not what gets relayed.
#[test]
fn test_private_code_isolates_display() {
    let mut speaker = Station::new(Settings::default(), 5, 5);
    let mut listener = Station::meshing(5, 6);
    listener.node.submit_line("/privcode secret");

    speaker.node.submit_line("public chatter");
    speaker.fire();

    assert_eq!(
        hear(&speaker, &mut listener, -45).unwrap().unwrap(),
        Reception::Squelched { relayed: true }
    );
    assert_eq!(listener.node.engine().relay_pool().len(), 1);
}

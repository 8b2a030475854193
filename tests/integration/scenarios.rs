use blechat_core::config::Settings;
use blechat_core::crc::crc8;
use blechat_core::wire::{advertising_report, decode_incoming, encode_outgoing, DEFAULT_MANUFACTURER_CODE};
use blechat_core::command::CommandOutcome;
use blechat_core::config::TimingConfig;
use blechat_core::wire::SkipReason;
use blechat_core::{AppPacket, ChatNode, Reception, Submission};

use crate::*;

/// A payload survives encode, the air, and decode.
#[test]
fn test_frame_round_trip() {
    let packet = AppPacket::local(0x05, 10, "hi");
    let frame = encode_outgoing(&packet, DEFAULT_MANUFACTURER_CODE);
    let event = advertising_report(&frame, [1, 2, 3, 4, 5, 6], -40);

    let decoded = decode_incoming(&event, DEFAULT_MANUFACTURER_CODE).unwrap();
    assert_eq!(decoded.payload(), packet.payload());
    assert_eq!(decoded.checksum(), packet.checksum());
    assert_eq!(decoded.private_code(), 0x05);
    assert_eq!(decoded.minute(), 10);
    assert_eq!(decoded.text(), b"hi");
    assert_eq!(decoded.distance(), 40);
}

/// `/pc ABC` then `/status` reports crc8("ABC").
#[test]
fn test_private_code_command_then_status() {
    let mut node = ChatNode::new(Settings::default(), &TimingConfig::default(), 0);

    assert_eq!(
        node.submit_line("/pc ABC"),
        Submission::Command(CommandOutcome::PrivateCode(crc8(b"ABC")))
    );

    let Submission::Command(CommandOutcome::Status(settings)) = node.submit_line("/status") else {
        panic!("status not reported");
    };
    assert_eq!(settings.private_code, crc8(b"ABC"));
    assert!(settings
        .to_string()
        .starts_with(&format!("privcode {:02X} ", crc8(b"ABC"))));
    assert_eq!(node.engine().local_len(), 0);
}

/// The second copy of a relay candidate stops at the duplicate check.
#[test]
fn test_duplicate_relay_rejected() {
    let mut station = Station::meshing(30, 1);
    let packet = AppPacket::from_payload(*AppPacket::local(0, 30, "flood").payload(), -60);

    assert!(matches!(
        station.node.receive(packet.clone()),
        Reception::Delivered { relayed: true, .. }
    ));
    assert_eq!(station.node.receive(packet), Reception::Duplicate);
    assert_eq!(station.node.engine().relay_pool().len(), 1);
}

/// Mesh off and a foreign private code: not shown, not relayed.
#[test]
fn test_foreign_private_code_dropped_without_mesh() {
    let mut speaker = Station::new(
        Settings {
            private_code: crc8(b"club"),
            ..Settings::default()
        },
        7,
        2,
    );
    let mut listener = Station::new(Settings::default(), 7, 3);

    speaker.node.submit_line("members only");
    speaker.fire();

    let reception = hear(&speaker, &mut listener, -50).unwrap().unwrap();
    assert_eq!(reception, Reception::Squelched { relayed: false });
    assert!(listener.node.engine().relay_pool().is_empty());
}

/// A message crosses two hops through a meshing station.
#[test]
fn test_two_hop_relay() {
    let mut alice = Station::new(Settings::default(), 44, 10);
    let mut bob = Station::meshing(44, 11);
    let mut carol = Station::new(Settings::default(), 44, 12);

    alice.node.submit_line("over the hill");
    assert!(matches!(alice.fire(), Slot::Broadcast { .. }));

    let Reception::Delivered { relayed, heard } = hear(&alice, &mut bob, -30).unwrap().unwrap() else {
        panic!("bob did not hear alice");
    };
    assert!(relayed);
    assert_eq!(heard.to_string(), "(30) over the hill");

    assert!(matches!(bob.fire(), Slot::Broadcast { .. }));
    let Reception::Delivered { heard, .. } = hear(&bob, &mut carol, -70).unwrap().unwrap() else {
        panic!("carol did not hear bob");
    };
    assert_eq!(heard.to_string(), "(70) over the hill");

    // Bob hearing his own relay bounce back is a duplicate.
    let echo = bob.heard_at(-1).unwrap();
    assert_eq!(bob.node.receive_frame(&echo).unwrap(), Reception::Duplicate);
}

/// Nodes on different manufacturer codes do not hear each other.
#[test]
fn test_foreign_manufacturer_skipped() {
    let mut speaker = Station::new(
        Settings {
            manufacturer_code: 0x5205,
            ..Settings::default()
        },
        3,
        20,
    );
    let mut listener = Station::new(Settings::default(), 3, 21);

    speaker.node.submit_line("hello");
    speaker.fire();
    assert_eq!(
        hear(&speaker, &mut listener, -20).unwrap(),
        Err(SkipReason::ForeignManufacturer(0x5205))
    );
}

use blechat_core::AppPacket;

use crate::*;

fn relayed(station: &mut Station, text: &str, rssi: i8) {
    let minute = station.node.minute();
    let packet = AppPacket::from_payload(*AppPacket::local(0, minute, text).payload(), rssi);
    station.node.receive(packet);
}

/// Our own packets always go before anything waiting to be relayed.
#[test]
fn test_local_before_relay() {
    let mut station = Station::meshing(15, 1);
    relayed(&mut station, "from afar", -20);
    relayed(&mut station, "from nearer", -10);
    station.node.submit_line("mine");
    station.node.submit_line("also mine");

    let first = station.node.select_next(&mut station.rng).unwrap();
    let second = station.node.select_next(&mut station.rng).unwrap();
    assert_eq!(first.packet.text(), b"mine");
    assert_eq!(second.packet.text(), b"also mine");

    let third = station.node.select_next(&mut station.rng).unwrap();
    assert!(third.packet.text().starts_with(b"from "));
    assert_eq!(station.node.engine().relay_pool().len(), 1);
}

/// A relay whose minute has fallen out of the window is dropped, not sent.
#[test]
fn test_expired_relay_evicted() {
    let mut station = Station::meshing(10, 2);
    relayed(&mut station, "stale soon", -40);
    assert_eq!(station.node.engine().relay_pool().len(), 1);

    station.node.set_minute(12);
    assert!(station.node.select_next(&mut station.rng).is_none());
    assert!(station.node.engine().relay_pool().is_empty());
    assert_eq!(station.fire(), Slot::Quiet);
}

/// Across the hour boundary minute 59 is still current at minute 0.
#[test]
fn test_hour_rollover_keeps_previous_minute() {
    let mut station = Station::meshing(59, 3);
    relayed(&mut station, "late", -40);

    station.node.set_minute(0);
    let next = station.node.select_next(&mut station.rng).unwrap();
    assert_eq!(next.packet.minute(), 59);
}

/// A relay candidate at the edge of range (weight 0) loses every draw.
#[test]
fn test_zero_weight_never_drawn_first() {
    for seed in 0..64 {
        let mut station = Station::meshing(20, seed);
        relayed(&mut station, "edge of range", 1);
        relayed(&mut station, "close by", -5);

        let first = station.node.select_next(&mut station.rng).unwrap();
        assert_eq!(first.packet.text(), b"close by", "seed {seed}");
    }
}

/// Closer relays are drawn more often.
#[test]
fn test_relay_draws_favour_strong_signals() {
    let mut near_first = 0;
    for seed in 0..2000 {
        let mut station = Station::meshing(20, seed);
        relayed(&mut station, "near", -10);
        relayed(&mut station, "far", -100);

        if station.node.select_next(&mut station.rng).unwrap().packet.text() == b"near" {
            near_first += 1;
        }
    }
    // Weights 245 and 155.
    assert!((1150..1300).contains(&near_first), "near first {near_first} times");
}

//! Benchmarks for line parsing and decoding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tmi_chat::{decode, parse_batch, parse_line};

/// Keep-alive from the relay
const PING: &str = "PING :tmi.twitch.tv";

/// Chat message with the usual tag set
const PRIVMSG: &str = "@badge-info=subscriber/14;badges=subscriber/12,premium/1;color=#1E90FF;display-name=Viewer;emotes=25:0-4,12-16/1902:6-10;first-msg=0;id=b34ccfc7-4977-403a-8a94-33c6bac34fb8;mod=0;room-id=1337;subscriber=1;tmi-sent-ts=1700000000000;turbo=0;user-id=12345;user-type= :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #channel :Kappa Keepo Kappa";

/// Resubscription with escaped system message
const USERNOTICE: &str = "@badge-info=subscriber/6;badges=subscriber/6;display-name=Fan;login=fan;msg-id=resub;msg-param-cumulative-months=6;msg-param-streak-months=2;msg-param-sub-plan=1000;msg-param-sub-plan-name=Channel\\sSubscription;system-msg=Fan\\ssubscribed\\sat\\sTier\\s1.;tmi-sent-ts=1700000000000 :tmi.twitch.tv USERNOTICE #channel :six months!";

/// Room state after a join
const ROOMSTATE: &str = "@emote-only=0;followers-only=-1;r9k=0;room-id=1337;slow=0;subs-only=0 :tmi.twitch.tv ROOMSTATE #channel";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Line Parsing");

    for (name, line) in [
        ("ping", PING),
        ("privmsg", PRIVMSG),
        ("usernotice", USERNOTICE),
        ("roomstate", ROOMSTATE),
    ] {
        group.bench_with_input(BenchmarkId::new("parse", name), line, |b, line| {
            b.iter(|| black_box(parse_line(black_box(line), "mybot")))
        });
        group.bench_with_input(BenchmarkId::new("parse_and_decode", name), line, |b, line| {
            b.iter(|| black_box(parse_line(black_box(line), "mybot").map(decode)))
        });
    }

    group.finish();
}

fn benchmark_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("Payload Batches");

    for size in [1usize, 10, 100] {
        let payload: String = (0..size).map(|_| format!("{}\r\n", PRIVMSG)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| black_box(parse_batch(black_box(payload), "mybot")))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_parsing, benchmark_batches);
criterion_main!(benches);

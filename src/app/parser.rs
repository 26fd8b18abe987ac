//! Command parsing for both surfaces.
//!
//! The console hands us an argument list; the BLE transport hands us a raw
//! byte buffer.  Both normalize into [`Command`] values here — no hardware
//! access, no side effects beyond diagnostics.
//!
//! Malformed input never crashes: it logs a warning and yields nothing, and
//! the caller no-ops.  Numeric fields are parsed strictly — trailing
//! garbage rejects the whole field so a truncated transport payload cannot
//! be misread as a valid duration.

use log::warn;

use super::command::Command;
use crate::broker::Channel;

/// A parse can legitimately yield two independent operations (the PWM wire
/// form carries a force flag *and* a trigger).
pub type Commands = heapless::Vec<Command, 2>;

// ───────────────────────────────────────────────────────────────
// Shared helpers
// ───────────────────────────────────────────────────────────────

/// Strict unsigned decimal: the whole token must be digits.
fn parse_u32_strict(tok: &str) -> Option<u32> {
    if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tok.parse().ok()
}

/// Find `keyword <value>` anywhere in the argument list.
///
/// Returns `Ok(None)` when the keyword is absent, `Err(())` when it is
/// present but the value is missing or malformed.
fn keyword_value(args: &[&str], keyword: &str) -> Result<Option<u32>, ()> {
    for (i, tok) in args.iter().enumerate() {
        if *tok != keyword {
            continue;
        }
        return match args.get(i + 1).copied().and_then(parse_u32_strict) {
            Some(v) => Ok(Some(v)),
            None => {
                warn!("invalid or missing value for argument '{keyword}'");
                Err(())
            }
        };
    }
    Ok(None)
}

// ───────────────────────────────────────────────────────────────
// Console grammar
// ───────────────────────────────────────────────────────────────

/// `adc|ct|ds [now] [duration <seconds>]` — first recognized token wins.
pub fn parse_cli_measure(args: &[&str]) -> Commands {
    let mut out = Commands::new();
    if args.is_empty() {
        warn!("no arguments");
        return out;
    }

    for (i, tok) in args.iter().enumerate() {
        match *tok {
            "now" => {
                let _ = out.push(Command::ReadNow);
                return out;
            }
            "duration" => {
                match args.get(i + 1).copied().and_then(parse_u32_strict) {
                    Some(d) if d > 0 => {
                        let _ = out.push(Command::ReadFor { duration_s: d });
                    }
                    _ => warn!("invalid or missing duration"),
                }
                return out;
            }
            _ => {}
        }
    }
    out
}

/// `pwm [force] [duration <s>] [freq <hz>] [duty <pct>]` — keywords in any
/// order.  A trigger needs all three numeric arguments; a lone `force`
/// stops the output.
pub fn parse_cli_pwm(args: &[&str]) -> Commands {
    let mut out = Commands::new();
    if args.is_empty() {
        warn!("no arguments");
        return out;
    }

    if args.contains(&"force") {
        let _ = out.push(Command::Force);
    }

    let (duration, freq, duty) = match (
        keyword_value(args, "duration"),
        keyword_value(args, "freq"),
        keyword_value(args, "duty"),
    ) {
        (Ok(d), Ok(f), Ok(p)) => (d, f, p),
        _ => return Commands::new(), // malformed value anywhere voids the command
    };

    match (duration, freq, duty) {
        (Some(duration_s), Some(freq_hz), Some(duty_pct)) => {
            let _ = out.push(Command::TriggerFor {
                duration_s,
                freq_hz,
                duty_pct,
            });
        }
        (None, None, None) => {}
        _ => warn!("pwm trigger needs duration, freq and duty together"),
    }
    out
}

/// `pwm-update [freq <hz>] [duty <pct>]` — each key is applied
/// independently; a malformed value skips only that key.
pub fn parse_cli_pwm_update(args: &[&str]) -> Commands {
    let mut out = Commands::new();
    if args.is_empty() {
        warn!("no arguments");
        return out;
    }

    if let Ok(Some(hz)) = keyword_value(args, "freq") {
        let _ = out.push(Command::SetFreq { hz });
    }
    if let Ok(Some(pct)) = keyword_value(args, "duty") {
        let _ = out.push(Command::SetDuty { pct });
    }
    out
}

/// `relay [on] [off]` — tokens applied in order of appearance.
pub fn parse_cli_relay(args: &[&str]) -> Commands {
    let mut out = Commands::new();
    if args.is_empty() {
        warn!("no arguments");
        return out;
    }

    for tok in args {
        match *tok {
            "on" => {
                let _ = out.push(Command::SetState { on: true });
            }
            "off" => {
                let _ = out.push(Command::SetState { on: false });
            }
            other => warn!("unknown relay argument '{other}'"),
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// Wire grammar
// ───────────────────────────────────────────────────────────────

/// Decode one characteristic write into commands for `channel`.
///
/// - measurement channels: a single unsigned decimal duration in seconds
///   (zero or empty means no action);
/// - PWM: `force,duration_s,freq_hz,duty_pct`, trailing commas tolerated;
/// - relay: literal `on`/`off` or numeric `0`/`1`.
pub fn parse_wire(channel: Channel, payload: &[u8]) -> Commands {
    let mut out = Commands::new();

    let text = match core::str::from_utf8(payload) {
        Ok(t) => t.trim_matches('\0').trim(),
        Err(_) => {
            warn!("non-UTF8 write on '{channel}' ignored");
            return out;
        }
    };
    if text.is_empty() {
        return out;
    }

    match channel {
        Channel::Voltage | Channel::Current | Channel::Temperature => {
            match parse_u32_strict(text) {
                Some(0) => {}
                Some(duration_s) => {
                    let _ = out.push(Command::ReadFor { duration_s });
                }
                None => warn!("malformed duration '{text}' on '{channel}'"),
            }
        }

        Channel::Pwm => {
            let mut fields = [0u32; 4];
            let mut count = 0usize;
            for seg in text.split(',').filter(|s| !s.is_empty()) {
                if count >= fields.len() {
                    warn!("extra pwm fields in '{text}' ignored");
                    break;
                }
                match parse_u32_strict(seg.trim()) {
                    Some(v) => {
                        fields[count] = v;
                        count += 1;
                    }
                    None => {
                        warn!("malformed pwm field '{seg}'");
                        return Commands::new();
                    }
                }
            }

            let [force, duration_s, freq_hz, duty_pct] = fields;
            if force != 0 {
                let _ = out.push(Command::Force);
            }
            if duration_s != 0 {
                let _ = out.push(Command::TriggerFor {
                    duration_s,
                    freq_hz,
                    duty_pct,
                });
            }
        }

        Channel::Relay => match text {
            "on" => {
                let _ = out.push(Command::SetState { on: true });
            }
            "off" => {
                let _ = out.push(Command::SetState { on: false });
            }
            other => match parse_u32_strict(other) {
                Some(0) => {
                    let _ = out.push(Command::SetState { on: false });
                }
                Some(1) => {
                    let _ = out.push(Command::SetState { on: true });
                }
                _ => warn!("malformed relay write '{other}'"),
            },
        },
    }
    out
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn one(cmds: &Commands) -> Command {
        assert_eq!(cmds.len(), 1, "expected exactly one command: {cmds:?}");
        cmds[0]
    }

    // ── console ──────────────────────────────────────────────

    #[test]
    fn cli_measure_now() {
        assert_eq!(one(&parse_cli_measure(&["now"])), Command::ReadNow);
    }

    #[test]
    fn cli_measure_duration() {
        assert_eq!(
            one(&parse_cli_measure(&["duration", "30"])),
            Command::ReadFor { duration_s: 30 }
        );
    }

    #[test]
    fn cli_measure_first_token_wins() {
        assert_eq!(
            one(&parse_cli_measure(&["now", "duration", "30"])),
            Command::ReadNow
        );
    }

    #[test]
    fn cli_measure_rejects_garbage_duration() {
        assert!(parse_cli_measure(&["duration", "30x"]).is_empty());
        assert!(parse_cli_measure(&["duration"]).is_empty());
        assert!(parse_cli_measure(&["duration", "0"]).is_empty());
        assert!(parse_cli_measure(&[]).is_empty());
        assert!(parse_cli_measure(&["bogus"]).is_empty());
    }

    #[test]
    fn cli_pwm_full_trigger_any_order() {
        let cmds = parse_cli_pwm(&["duty", "75", "duration", "5", "freq", "1000"]);
        assert_eq!(
            one(&cmds),
            Command::TriggerFor {
                duration_s: 5,
                freq_hz: 1000,
                duty_pct: 75
            }
        );
    }

    #[test]
    fn cli_pwm_force_alone() {
        assert_eq!(one(&parse_cli_pwm(&["force"])), Command::Force);
    }

    #[test]
    fn cli_pwm_force_plus_trigger() {
        let cmds = parse_cli_pwm(&["force", "duration", "5", "freq", "100", "duty", "50"]);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], Command::Force);
        assert_eq!(
            cmds[1],
            Command::TriggerFor {
                duration_s: 5,
                freq_hz: 100,
                duty_pct: 50
            }
        );
    }

    #[test]
    fn cli_pwm_partial_trigger_is_ignored() {
        assert!(parse_cli_pwm(&["duration", "5", "freq", "100"]).is_empty());
    }

    #[test]
    fn cli_pwm_malformed_value_voids_command() {
        assert!(parse_cli_pwm(&["force", "duration", "5x", "freq", "100", "duty", "50"]).is_empty());
    }

    #[test]
    fn cli_pwm_update_both_keys() {
        let cmds = parse_cli_pwm_update(&["freq", "2000", "duty", "40"]);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], Command::SetFreq { hz: 2000 });
        assert_eq!(cmds[1], Command::SetDuty { pct: 40 });
    }

    #[test]
    fn cli_pwm_update_bad_key_skipped_independently() {
        let cmds = parse_cli_pwm_update(&["freq", "nope", "duty", "40"]);
        assert_eq!(one(&cmds), Command::SetDuty { pct: 40 });
    }

    #[test]
    fn cli_relay_tokens_in_order() {
        let cmds = parse_cli_relay(&["on", "off"]);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], Command::SetState { on: true });
        assert_eq!(cmds[1], Command::SetState { on: false });
    }

    // ── wire ─────────────────────────────────────────────────

    #[test]
    fn wire_duration_on_measurement_channels() {
        for ch in [Channel::Voltage, Channel::Current, Channel::Temperature] {
            assert_eq!(
                one(&parse_wire(ch, b"30")),
                Command::ReadFor { duration_s: 30 }
            );
        }
    }

    #[test]
    fn wire_zero_or_empty_duration_is_no_action() {
        assert!(parse_wire(Channel::Voltage, b"0").is_empty());
        assert!(parse_wire(Channel::Voltage, b"").is_empty());
        assert!(parse_wire(Channel::Voltage, b"\0\0").is_empty());
    }

    #[test]
    fn wire_duration_rejects_trailing_garbage() {
        assert!(parse_wire(Channel::Current, b"30x").is_empty());
        assert!(parse_wire(Channel::Current, b"3 0").is_empty());
        assert!(parse_wire(Channel::Current, b"-3").is_empty());
    }

    #[test]
    fn wire_pwm_force_and_trigger() {
        let cmds = parse_wire(Channel::Pwm, b"1,5,1000,75");
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], Command::Force);
        assert_eq!(
            cmds[1],
            Command::TriggerFor {
                duration_s: 5,
                freq_hz: 1000,
                duty_pct: 75
            }
        );
    }

    #[test]
    fn wire_pwm_trigger_only() {
        let cmds = parse_wire(Channel::Pwm, b"0,5,1000,75");
        assert_eq!(
            one(&cmds),
            Command::TriggerFor {
                duration_s: 5,
                freq_hz: 1000,
                duty_pct: 75
            }
        );
    }

    #[test]
    fn wire_pwm_trailing_commas_tolerated() {
        let cmds = parse_wire(Channel::Pwm, b"1,5,1000,75,,");
        assert_eq!(cmds.len(), 2);
    }

    #[test]
    fn wire_pwm_short_form_force_only() {
        assert_eq!(one(&parse_wire(Channel::Pwm, b"1")), Command::Force);
    }

    #[test]
    fn wire_pwm_malformed_field_voids_all() {
        assert!(parse_wire(Channel::Pwm, b"1,5x,1000,75").is_empty());
    }

    #[test]
    fn wire_relay_forms() {
        assert_eq!(
            one(&parse_wire(Channel::Relay, b"on")),
            Command::SetState { on: true }
        );
        assert_eq!(
            one(&parse_wire(Channel::Relay, b"off")),
            Command::SetState { on: false }
        );
        assert_eq!(
            one(&parse_wire(Channel::Relay, b"1")),
            Command::SetState { on: true }
        );
        assert_eq!(
            one(&parse_wire(Channel::Relay, b"0")),
            Command::SetState { on: false }
        );
        assert!(parse_wire(Channel::Relay, b"2").is_empty());
        assert!(parse_wire(Channel::Relay, b"onn").is_empty());
    }

    #[test]
    fn wire_non_utf8_ignored() {
        assert!(parse_wire(Channel::Pwm, &[0xff, 0xfe]).is_empty());
    }

    // ── round-trips ──────────────────────────────────────────

    #[test]
    fn wire_roundtrip_read_for() {
        let cmd = Command::ReadFor { duration_s: 42 };
        let text = cmd.to_wire().unwrap();
        assert_eq!(one(&parse_wire(Channel::Voltage, text.as_bytes())), cmd);
    }

    #[test]
    fn wire_roundtrip_trigger() {
        let cmd = Command::TriggerFor {
            duration_s: 9,
            freq_hz: 500,
            duty_pct: 33,
        };
        let text = cmd.to_wire().unwrap();
        assert_eq!(one(&parse_wire(Channel::Pwm, text.as_bytes())), cmd);
    }

    #[test]
    fn wire_roundtrip_force() {
        let text = Command::Force.to_wire().unwrap();
        assert_eq!(one(&parse_wire(Channel::Pwm, text.as_bytes())), Command::Force);
    }

    #[test]
    fn wire_roundtrip_relay() {
        for on in [true, false] {
            let cmd = Command::SetState { on };
            let text = cmd.to_wire().unwrap();
            assert_eq!(one(&parse_wire(Channel::Relay, text.as_bytes())), cmd);
        }
    }
}

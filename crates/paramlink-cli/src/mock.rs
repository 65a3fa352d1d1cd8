//! A scripted board for `--mock` runs.
//!
//! The mock answers the one command a console invocation sends the way the
//! parameter firmware would, and starts out holding a few parameters.

use paramlink::{Command, PinKind, parse_analog_label};
use paramlink_test_harness::MockTransport;
use paramlink_text_io::commands::{encode, frame};

/// Parameters the simulated board reports: (name, min, max, current).
const BOARD: &[(&str, &str, &str, &str)] = &[
    ("gain", "0", "10", "5"),
    ("mute", "0", "1", "0"),
    ("tempo", "60", "200", "120"),
];

fn listing() -> String {
    BOARD
        .iter()
        .enumerate()
        .map(|(i, (name, min, max, current))| format!("L,{i},{name},{min},{max},{current}\n"))
        .collect()
}

/// The lines the firmware sends back for `command`.
fn reply_to(command: &Command) -> String {
    match command {
        Command::ListAllParams => listing(),
        Command::GetParam { name } => match BOARD.iter().find(|(n, ..)| n == name) {
            Some((_, _, _, current)) => format!("G,{name},{current}\n"),
            None => format!("G,{name},ERROR\n"),
        },
        Command::AddParam { name, .. } => format!("A,{}\n", name.trim()),
        Command::UpdateParam { name, new_value } => {
            if BOARD.iter().any(|(n, ..)| n == name) {
                format!("U,{name},{}\n", new_value.to_wire())
            } else {
                format!("U,{name},ERROR\n")
            }
        }
        Command::ReadPin {
            kind: PinKind::Digital,
            designator,
        } => format!("D,{},1\n", designator.trim()),
        Command::ReadPin {
            kind: PinKind::Analog,
            designator,
        } => match parse_analog_label(designator) {
            Ok(input) => format!("A,{input},512\n"),
            Err(_) => String::new(),
        },
        Command::SetSoftware { name } => format!("S,software set to,{}\n", name.trim()),
        Command::Raw { .. } => "ERR,Unknown command\n".to_string(),
    }
}

/// A lenient mock primed to answer `command`, if one will be sent.
pub fn scripted(command: Option<&Command>) -> MockTransport {
    let mock = MockTransport::lenient();
    if let Some(command) = command {
        if let Ok(wire) = encode(command) {
            mock.expect(&frame(&wire), reply_to(command).as_bytes());
        }
    } else {
        // Something for `monitor` and `log` to show.
        mock.push_inbound(b"S,software set to,demo\nS,1,mute,1\n");
    }
    mock
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramlink::NewValue;

    #[test]
    fn listing_has_every_parameter() {
        assert_eq!(
            reply_to(&Command::ListAllParams),
            "L,0,gain,0,10,5\nL,1,mute,0,1,0\nL,2,tempo,60,200,120\n"
        );
    }

    #[test]
    fn unknown_parameter_answers_error() {
        let cmd = Command::UpdateParam {
            name: "nope".into(),
            new_value: NewValue::Int(1),
        };
        assert_eq!(reply_to(&cmd), "U,nope,ERROR\n");
    }

    #[test]
    fn analog_read_reply_uses_input_number() {
        let cmd = Command::ReadPin {
            kind: PinKind::Analog,
            designator: "A3".into(),
        };
        assert_eq!(reply_to(&cmd), "A,3,512\n");
    }
}

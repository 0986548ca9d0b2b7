//! Typed command channel variants and payload parsing.
//!
//! Commands arrive over a pub/sub transport as a topic name plus a
//! string payload. They are decoded once, at the edge, into a closed
//! enum so the control core dispatches by pattern matching instead of
//! topic string comparison.
//!
//! Parsing is deliberately forgiving: commands are user-issued and
//! user-correctable, so malformed numeric fields decode to zero
//! instead of propagating a fault.

/// Direction payload for manual turn commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Up,
    Down,
}

/// Decoded command from the external command channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadeCommand {
    /// Flash the indicator at the configured intensity.
    Flash { duration_ms: u32 },
    /// Flash the indicator with an explicit RGBW color.
    FlashColor {
        red: u16,
        green: u16,
        blue: u16,
        white: u16,
        duration_ms: u32,
    },
    /// Manual drive at fixed duty until stopped.
    Turn(TurnDirection),
    /// Move to an absolute target position.
    Move { target: f64 },
    /// Brake now, freeze target at the current position.
    Stop,
    /// Re-zero position and target to the given value.
    Reset { position: f64 },
    /// Random indicator color.
    Disco,
}

impl ShadeCommand {
    /// Decode a topic/payload pair.
    ///
    /// Returns `None` for unknown topics and for a `turn` payload that
    /// is neither `up` nor `down`; such requests are dropped silently.
    pub fn parse(topic: &str, payload: &str) -> Option<Self> {
        match topic {
            "flash" => Some(Self::Flash {
                duration_ms: parse_u32_or_zero(payload),
            }),
            "flash-color" => {
                let mut fields = payload.split_whitespace();
                let mut next = || parse_u32_or_zero(fields.next().unwrap_or(""));
                Some(Self::FlashColor {
                    red: next().min(u16::MAX as u32) as u16,
                    green: next().min(u16::MAX as u32) as u16,
                    blue: next().min(u16::MAX as u32) as u16,
                    white: next().min(u16::MAX as u32) as u16,
                    duration_ms: next(),
                })
            }
            "turn" => match payload.trim() {
                "up" => Some(Self::Turn(TurnDirection::Up)),
                "down" => Some(Self::Turn(TurnDirection::Down)),
                _ => None,
            },
            "move" => Some(Self::Move {
                target: parse_f64_or_zero(payload),
            }),
            "stop" => Some(Self::Stop),
            "reset" => Some(Self::Reset {
                position: parse_f64_or_zero(payload),
            }),
            "disco" => Some(Self::Disco),
            _ => None,
        }
    }
}

fn parse_u32_or_zero(s: &str) -> u32 {
    s.trim().parse().unwrap_or(0)
}

fn parse_f64_or_zero(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flash() {
        assert_eq!(
            ShadeCommand::parse("flash", "250"),
            Some(ShadeCommand::Flash { duration_ms: 250 })
        );
    }

    #[test]
    fn parse_flash_malformed_duration_is_zero() {
        assert_eq!(
            ShadeCommand::parse("flash", "soon"),
            Some(ShadeCommand::Flash { duration_ms: 0 })
        );
    }

    #[test]
    fn parse_flash_color_full() {
        assert_eq!(
            ShadeCommand::parse("flash-color", "10 20 30 40 500"),
            Some(ShadeCommand::FlashColor {
                red: 10,
                green: 20,
                blue: 30,
                white: 40,
                duration_ms: 500,
            })
        );
    }

    #[test]
    fn parse_flash_color_missing_fields_default_to_zero() {
        assert_eq!(
            ShadeCommand::parse("flash-color", "10 20"),
            Some(ShadeCommand::FlashColor {
                red: 10,
                green: 20,
                blue: 0,
                white: 0,
                duration_ms: 0,
            })
        );
    }

    #[test]
    fn parse_turn_directions() {
        assert_eq!(
            ShadeCommand::parse("turn", "up"),
            Some(ShadeCommand::Turn(TurnDirection::Up))
        );
        assert_eq!(
            ShadeCommand::parse("turn", "down"),
            Some(ShadeCommand::Turn(TurnDirection::Down))
        );
        assert_eq!(ShadeCommand::parse("turn", "sideways"), None);
    }

    #[test]
    fn parse_move_and_reset() {
        assert_eq!(
            ShadeCommand::parse("move", "123.5"),
            Some(ShadeCommand::Move { target: 123.5 })
        );
        assert_eq!(
            ShadeCommand::parse("reset", "42.0"),
            Some(ShadeCommand::Reset { position: 42.0 })
        );
        // Malformed numerics decode to zero, not an error.
        assert_eq!(
            ShadeCommand::parse("move", "way up"),
            Some(ShadeCommand::Move { target: 0.0 })
        );
    }

    #[test]
    fn parse_stop_and_disco() {
        assert_eq!(ShadeCommand::parse("stop", ""), Some(ShadeCommand::Stop));
        assert_eq!(ShadeCommand::parse("disco", ""), Some(ShadeCommand::Disco));
    }

    #[test]
    fn unknown_topic_is_none() {
        assert_eq!(ShadeCommand::parse("self-destruct", "now"), None);
    }
}

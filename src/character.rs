use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pet persona shown in the menu bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetCharacter {
    #[default]
    Cat,
    Dog,
    Rabbit,
    Hamster,
    Parrot,
    Fish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphRole {
    Idle,
    Watching,
    NudgeFirst,
    NudgeSecond,
}

/// Symbolic image for the indicator. Rendering is up to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Glyph {
    pub character: PetCharacter,
    pub role: GlyphRole,
    pub symbol: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphSet {
    pub idle: Glyph,
    pub watching: Glyph,
    pub nudge_frames: [Glyph; 2],
}

const NUDGE_ALERT_SYMBOL: &str = "exclamationmark.bubble.fill";

impl PetCharacter {
    pub const ALL: [PetCharacter; 6] = [
        PetCharacter::Cat,
        PetCharacter::Dog,
        PetCharacter::Rabbit,
        PetCharacter::Hamster,
        PetCharacter::Parrot,
        PetCharacter::Fish,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            PetCharacter::Cat => "🐱",
            PetCharacter::Dog => "🐶",
            PetCharacter::Rabbit => "🐰",
            PetCharacter::Hamster => "🐹",
            PetCharacter::Parrot => "🦜",
            PetCharacter::Fish => "🐠",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PetCharacter::Cat => "Cat",
            PetCharacter::Dog => "Dog",
            PetCharacter::Rabbit => "Rabbit",
            PetCharacter::Hamster => "Hamster",
            PetCharacter::Parrot => "Parrot",
            PetCharacter::Fish => "Fish",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PetCharacter::Cat => "cat",
            PetCharacter::Dog => "dog",
            PetCharacter::Rabbit => "rabbit",
            PetCharacter::Hamster => "hamster",
            PetCharacter::Parrot => "parrot",
            PetCharacter::Fish => "fish",
        }
    }

    fn outline_symbol(self) -> &'static str {
        match self {
            PetCharacter::Cat => "cat",
            PetCharacter::Dog => "dog",
            PetCharacter::Rabbit => "hare",
            PetCharacter::Hamster => "pawprint",
            PetCharacter::Parrot => "bird",
            PetCharacter::Fish => "fish",
        }
    }

    fn filled_symbol(self) -> &'static str {
        match self {
            PetCharacter::Cat => "cat.fill",
            PetCharacter::Dog => "dog.fill",
            PetCharacter::Rabbit => "hare.fill",
            PetCharacter::Hamster => "pawprint.fill",
            PetCharacter::Parrot => "bird.fill",
            PetCharacter::Fish => "fish.fill",
        }
    }

    pub fn glyphs(self) -> GlyphSet {
        let glyph = |role, symbol| Glyph {
            character: self,
            role,
            symbol,
        };
        GlyphSet {
            idle: glyph(GlyphRole::Idle, self.outline_symbol()),
            watching: glyph(GlyphRole::Watching, self.filled_symbol()),
            nudge_frames: [
                glyph(GlyphRole::NudgeFirst, self.filled_symbol()),
                glyph(GlyphRole::NudgeSecond, NUDGE_ALERT_SYMBOL),
            ],
        }
    }

    /// Next persona in display order, wrapping around.
    pub fn next(self) -> PetCharacter {
        let index = PetCharacter::ALL
            .iter()
            .position(|character| *character == self)
            .unwrap_or(0);
        PetCharacter::ALL[(index + 1) % PetCharacter::ALL.len()]
    }
}

impl fmt::Display for PetCharacter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PetCharacter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        PetCharacter::ALL
            .into_iter()
            .find(|character| character.key() == normalized)
            .ok_or_else(|| format!("unknown character '{value}'"))
    }
}

use std::fmt;

use glam::Vec2;
use serde::Serialize;
use serde_json::Value;

use crate::world::ClientIntent;

pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_HOST: &str = "127.0.0.1";

const HELLO_PREFIX: &str = "HELLO:";
const INPUT_PREFIX: &str = "INPUT:";

/// Tag of [`EntityKind::Bullet`]. Decoding matches it by prefix.
const KIND_BULLET: &str = "b";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no type tag")]
    MissingType,
    #[error("unknown message type: {0:?}")]
    UnknownType(String),
}

/// Lines sent from client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Hello { name: String },
    Input(ClientIntent),
}

impl ClientMessage {
    pub fn hello(name: impl Into<String>) -> Self {
        Self::Hello { name: name.into() }
    }

    pub fn input(intent: ClientIntent) -> Self {
        Self::Input(intent)
    }

    /// Newline-terminated wire form.
    pub fn encode(&self) -> String {
        format!("{self}\n")
    }

    /// Parses one line (terminator already stripped). Malformed numeric
    /// fields decode as zero; missing trailing fields take their defaults.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();

        if let Some(name) = line.strip_prefix(HELLO_PREFIX) {
            return Ok(Self::Hello {
                name: name.trim().to_owned(),
            });
        }

        if let Some(fields) = line.strip_prefix(INPUT_PREFIX) {
            return Ok(Self::Input(parse_input_fields(fields)));
        }

        Err(ProtocolError::UnknownCommand(line.to_owned()))
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hello { name } => {
                let name: String = name
                    .chars()
                    .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
                    .collect();
                write!(f, "{HELLO_PREFIX}{}", name.trim())
            }
            Self::Input(intent) => write!(
                f,
                "{INPUT_PREFIX}{},{},{},{},{}",
                intent.movement.x,
                intent.movement.y,
                u8::from(intent.fire),
                intent.aim.x,
                intent.aim.y
            ),
        }
    }
}

fn parse_input_fields(fields: &str) -> ClientIntent {
    let parts: Vec<&str> = fields.split(',').map(str::trim).collect();

    let number = |index: usize, default: f32| -> f32 {
        match parts.get(index) {
            Some(raw) => raw.parse::<f32>().ok().filter(|v| v.is_finite()).unwrap_or(0.0),
            None => default,
        }
    };

    let fire = parts
        .get(2)
        .is_some_and(|raw| *raw == "1" || raw.eq_ignore_ascii_case("true"));

    ClientIntent {
        movement: Vec2::new(number(0, 0.0), number(1, 0.0)),
        fire,
        aim: Vec2::new(number(3, 0.0), number(4, -1.0)),
    }
}

/// Kind-specific payload of an entity snapshot. Serialized inline next to
/// the common fields, tagged by `k`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "k")]
pub enum EntityKind {
    #[serde(rename = "p")]
    Player {
        #[serde(rename = "hp")]
        health: u32,
        #[serde(rename = "nm")]
        name: String,
    },
    #[serde(rename = "b")]
    Bullet {
        #[serde(rename = "o")]
        owner: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl EntitySnapshot {
    pub fn player(id: u32, position: Vec2, health: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            x: position.x,
            y: position.y,
            kind: EntityKind::Player {
                health,
                name: name.into(),
            },
        }
    }

    pub fn bullet(id: u32, position: Vec2, owner: u32) -> Self {
        Self {
            id,
            x: position.x,
            y: position.y,
            kind: EntityKind::Bullet { owner },
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player { .. })
    }

    pub fn health(&self) -> Option<u32> {
        match self.kind {
            EntityKind::Player { health, .. } => Some(health),
            EntityKind::Bullet { .. } => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            EntityKind::Player { name, .. } => Some(name),
            EntityKind::Bullet { .. } => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |key: &str| object.get(key);

        let kind = match field("k").and_then(Value::as_str) {
            Some(k) if k.starts_with(KIND_BULLET) => EntityKind::Bullet {
                owner: lenient_u32(field("o")),
            },
            _ => EntityKind::Player {
                health: lenient_u32(field("hp")),
                name: field("nm")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
            },
        };

        Some(Self {
            id: lenient_u32(field("id")),
            x: lenient_f64(field("x")) as f32,
            y: lenient_f64(field("y")) as f32,
            kind,
        })
    }
}

/// One full, timestamped world snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyframe {
    #[serde(rename = "t")]
    pub time: f64,
    pub entities: Vec<EntitySnapshot>,
}

impl Keyframe {
    pub fn with_entities(time: f64, entities: Vec<EntitySnapshot>) -> Self {
        Self { time, entities }
    }

    pub fn entity(&self, id: u32) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| e.id == id)
    }
}

/// Lines sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "welcome")]
    Welcome { id: u32 },
    #[serde(rename = "kf")]
    Keyframe(Keyframe),
}

impl ServerMessage {
    pub fn welcome(id: u32) -> Self {
        Self::Welcome { id }
    }

    pub fn keyframe(keyframe: Keyframe) -> Self {
        Self::Keyframe(keyframe)
    }

    /// Newline-terminated JSON wire form.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Tolerant decode: a field that is missing or not numeric becomes zero.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim())?;
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        match tag {
            "welcome" => Ok(Self::Welcome {
                id: lenient_u32(value.get("id")),
            }),
            "kf" => {
                let entities = value
                    .get("entities")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().filter_map(EntitySnapshot::from_value).collect())
                    .unwrap_or_default();

                Ok(Self::Keyframe(Keyframe {
                    time: lenient_f64(value.get("t")),
                    entities,
                }))
            }
            other => Err(ProtocolError::UnknownType(other.to_owned())),
        }
    }
}

fn lenient_f64(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn lenient_u32(value: Option<&Value>) -> u32 {
    // Saturating float-to-int cast; negatives clamp to zero.
    lenient_f64(value) as u32
}

// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Command parsing and execution.
//!
//! Every line on the command channel is one [`Command`]. `ping`, `stop` and
//! `set:` are handled by the read loop itself; the rest carry a request id
//! and are answered through [`execute`].

use turbx::{codec, Engine, ResourceResolver};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ping`
    Ping,
    /// `stop` or `exit`
    Stop,
    /// `set:<key>=<value>`
    Set {
        /// Option name.
        key: String,
        /// Raw option value.
        value: String,
    },
    /// `pre:<id>:<path>`
    Precompile {
        /// Request id echoed in the response.
        id: String,
        /// Template path.
        path: String,
    },
    /// `has:<id>:<path>`
    Has {
        /// Request id echoed in the response.
        id: String,
        /// Template path.
        path: String,
    },
    /// `<id>:<payload>:<path>`
    Compile {
        /// Request id echoed in the response.
        id: String,
        /// gzip + base64 JSON render data.
        payload: String,
        /// Template path.
        path: String,
    },
}

/// Splits `id:path`, rejecting an empty id or path.
fn request(rest: &str) -> Option<(String, String)> {
    let (id, path) = rest.split_once(':')?;
    if id.is_empty() || path.is_empty() {
        return None;
    }
    Some((id.to_string(), path.to_string()))
}

impl Command {
    /// Parses one line. Returns `None` for anything malformed.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "" => return None,
            "ping" => return Some(Command::Ping),
            "stop" | "exit" => return Some(Command::Stop),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("set:") {
            let (key, value) = rest.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            return Some(Command::Set {
                key: key.to_string(),
                value: value.trim().to_string(),
            });
        }
        if let Some(rest) = line.strip_prefix("pre:") {
            let (id, path) = request(rest)?;
            return Some(Command::Precompile { id, path });
        }
        if let Some(rest) = line.strip_prefix("has:") {
            let (id, path) = request(rest)?;
            return Some(Command::Has { id, path });
        }

        let mut parts = line.splitn(3, ':');
        let id = parts.next()?;
        let payload = parts.next()?;
        let path = parts.next()?;
        if id.is_empty() || path.is_empty() {
            return None;
        }
        Some(Command::Compile {
            id: id.to_string(),
            payload: payload.to_string(),
            path: path.to_string(),
        })
    }

    /// The request id, for commands that carry one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Command::Precompile { id, .. } | Command::Has { id, .. } | Command::Compile { id, .. } => {
                Some(id)
            }
            _ => None,
        }
    }
}

/// Decodes a compile payload into render data. An empty payload is `{}`.
pub fn decode_payload(payload: &str) -> turbx::Result<serde_json::Value> {
    if payload.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    let json = codec::decompress_str(payload)?;
    Ok(serde_json::from_str(&json)?)
}

fn compile<R: ResourceResolver>(engine: &Engine<R>, payload: &str, path: &str) -> turbx::Result<String> {
    let data = decode_payload(payload)?;
    let html = engine.compile_json(path, data)?;
    codec::compress(html.as_bytes())
}

/// Runs a request command against the engine and returns the response line.
///
/// `ping`, `stop` and `set:` produce no line here; the read loop owns them.
pub fn execute<R: ResourceResolver>(engine: &Engine<R>, command: &Command) -> Option<String> {
    match command {
        Command::Precompile { id, path } => {
            let status = match engine.precompile(path) {
                Ok(_) => "success",
                Err(e) => {
                    tracing::warn!("Pre-compile of {} failed: {}", path, e);
                    "error"
                }
            };
            Some(format!("{}:{}", id, status))
        }
        Command::Has { id, path } => Some(format!("{}:{}", id, engine.has_precompiled(path))),
        Command::Compile { id, payload, path } => match compile(engine, payload, path) {
            Ok(output) => Some(format!("{}:{}", id, output)),
            Err(e) => {
                tracing::warn!("Compile of {} failed: {}", path, e);
                Some(format!("{}:error", id))
            }
        },
        Command::Ping | Command::Stop | Command::Set { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_commands() {
        assert_eq!(Command::parse("ping"), Some(Command::Ping));
        assert_eq!(Command::parse(" exit \n"), Some(Command::Stop));
        assert_eq!(
            Command::parse("set:root=/srv/views"),
            Some(Command::Set {
                key: "root".into(),
                value: "/srv/views".into()
            })
        );
        assert_eq!(Command::parse("set:=x"), None);
        assert_eq!(Command::parse("set:root"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            Command::parse("pre:1:pages/index"),
            Some(Command::Precompile {
                id: "1".into(),
                path: "pages/index".into()
            })
        );
        assert_eq!(
            Command::parse("has:2:index"),
            Some(Command::Has {
                id: "2".into(),
                path: "index".into()
            })
        );
        assert_eq!(
            Command::parse("3:H4sI:c:/views/index"),
            Some(Command::Compile {
                id: "3".into(),
                payload: "H4sI".into(),
                path: "c:/views/index".into()
            })
        );
        assert_eq!(Command::parse("pre:1"), None);
        assert_eq!(Command::parse("garbage"), None);
        assert_eq!(Command::parse("4::"), None);
    }

    #[test]
    fn test_decode_payload() {
        let payload = codec::compress(br#"{"a":1}"#).unwrap();
        assert_eq!(decode_payload(&payload).unwrap(), serde_json::json!({"a": 1}));
        assert_eq!(decode_payload("").unwrap(), serde_json::json!({}));
        assert!(decode_payload("not base64!").is_err());
    }
}

//! Socket.IO v5 packet framing (text packets only).
//!
//! A Socket.IO packet travels inside an Engine.IO `message` packet:
//!
//! ```text
//! <type>[<namespace>,][<ack id>][<json data>]
//! ```
//!
//! The console only ever uses the default namespace and never requests
//! acknowledgements, but both are parsed so frames from a server that uses
//! them are not misread.

use serde_json::Value;

use crate::error::Error;

pub const DEFAULT_NAMESPACE: &str = "/";

/// A decoded Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// `0` -- namespace connect. Client side carries the auth payload,
    /// server side carries `{ "sid": ... }`.
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    /// `1` -- namespace disconnect.
    Disconnect { namespace: String },
    /// `2` -- named event with an optional payload.
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    /// `4` -- the server refused the namespace connect.
    ConnectError { namespace: String, data: Option<Value> },
}

impl SocketPacket {
    /// Build an event on `namespace`.
    pub fn event(namespace: &str, name: impl Into<String>, payload: Value) -> Self {
        Self::Event {
            namespace: namespace.to_owned(),
            name: name.into(),
            payload,
        }
    }

    /// Decode a packet from the body of an Engine.IO `message`.
    pub fn decode(text: &str) -> Result<Self, Error> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Protocol("empty Socket.IO packet".into()))?;
        let rest = chars.as_str();

        let (namespace, rest) = split_namespace(rest);
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).map_err(|e| Error::deserialization(&e, rest))?)
        };

        match kind {
            '0' => Ok(Self::Connect { namespace, data }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let (name, payload) = split_event(data)?;
                Ok(Self::Event {
                    namespace,
                    name,
                    payload,
                })
            }
            '4' => Ok(Self::ConnectError { namespace, data }),
            '3' => Err(Error::Protocol("unexpected ACK packet".into())),
            '5' | '6' => Err(Error::Protocol("binary Socket.IO packets are not supported".into())),
            other => Err(Error::Protocol(format!("unknown Socket.IO packet type '{other}'"))),
        }
    }

    /// Encode this packet to the body of an Engine.IO `message`.
    pub fn encode(&self) -> String {
        match self {
            Self::Connect { namespace, data } => {
                let mut out = format!("0{}", namespace_prefix(namespace));
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
            Self::Disconnect { namespace } => format!("1{}", namespace_prefix(namespace)),
            Self::Event {
                namespace,
                name,
                payload,
            } => {
                let args = if payload.is_null() {
                    Value::Array(vec![Value::String(name.clone())])
                } else {
                    Value::Array(vec![Value::String(name.clone()), payload.clone()])
                };
                format!("2{}{args}", namespace_prefix(namespace))
            }
            Self::ConnectError { namespace, data } => {
                let mut out = format!("4{}", namespace_prefix(namespace));
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
                out
            }
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }
}

/// Explicit namespaces are written as `/name,`; the default one is implicit.
fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_owned(), rest);
    }
    match rest.find(',') {
        Some(idx) => (rest[..idx].to_owned(), &rest[idx + 1..]),
        None => (rest.to_owned(), ""),
    }
}

/// Events are a JSON array: `["name", payload?, ...]`. Extra arguments
/// beyond the first payload are ignored; the backend never sends them.
fn split_event(data: Option<Value>) -> Result<(String, Value), Error> {
    let Some(Value::Array(args)) = data else {
        return Err(Error::Protocol("event packet without argument array".into()));
    };
    let mut args = args.into_iter();
    let name = match args.next() {
        Some(Value::String(name)) => name,
        _ => return Err(Error::Protocol("event packet without a name".into())),
    };
    Ok((name, args.next().unwrap_or(Value::Null)))
}

// ── Tests ────────────────────────────────────────────────────────────

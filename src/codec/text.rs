//! Text codec for non-binary packets.

use serde_json::Value;

use crate::error::{Result, SocketError};
use crate::protocol::{Data, Packet, PacketType, ROOT_NAMESPACE};

/// Text packet codec.
pub struct TextCodec;

impl TextCodec {
    /// Encode a packet to its text form.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` for binary packets or binary arguments.
    pub fn encode(packet: &Packet) -> Result<String> {
        if packet.packet_type.is_binary() {
            return Err(SocketError::Protocol(
                "binary packets require attachment framing".into(),
            ));
        }

        let mut out = String::new();
        out.push(char::from(b'0' + packet.packet_type.as_u8()));

        let nsp_present = !packet.nsp.is_empty() && packet.nsp != ROOT_NAMESPACE;
        if nsp_present {
            out.push_str(&packet.nsp);
        }
        let query = packet
            .query
            .as_deref()
            .filter(|_| packet.packet_type == PacketType::Connect);
        if let Some(query) = query {
            if !nsp_present {
                out.push_str(ROOT_NAMESPACE);
            }
            out.push('?');
            out.push_str(query);
        }
        if nsp_present || query.is_some() {
            out.push(',');
        }

        if let Some(id) = packet.id {
            out.push_str(&id.to_string());
        }

        if !packet.data.is_empty() {
            let values = packet
                .data
                .iter()
                .map(|d| {
                    d.as_json().cloned().ok_or_else(|| {
                        SocketError::Protocol("binary argument in text packet".into())
                    })
                })
                .collect::<Result<Vec<Value>>>()?;

            let json = match packet.packet_type {
                // ERROR carries a bare value, not an argument list.
                PacketType::Error if values.len() == 1 => values.into_iter().next(),
                _ => Some(Value::Array(values)),
            };
            if let Some(json) = json {
                out.push_str(&serde_json::to_string(&json)?);
            }
        }

        Ok(out)
    }

    /// Decode a text packet.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` for unknown or binary type tags, `Json` for a bad payload.
    pub fn decode(text: &str) -> Result<Packet> {
        let tag = text
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .and_then(|d| PacketType::from_u8(d as u8))
            .ok_or_else(|| SocketError::Protocol(format!("unknown packet type in {text:?}")))?;
        if tag.is_binary() {
            return Err(SocketError::Protocol(
                "binary packets require attachment framing".into(),
            ));
        }

        let mut rest = &text[1..];

        let mut nsp = ROOT_NAMESPACE.to_string();
        let mut query = None;
        if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let full = &rest[..end];
            match full.split_once('?') {
                Some((n, q)) => {
                    nsp = n.to_string();
                    query = Some(q.to_string());
                }
                None => nsp = full.to_string(),
            }
            rest = rest.get(end + 1..).unwrap_or("");
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| SocketError::Protocol(format!("bad ack id: {e}")))?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let data = if rest.is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str::<Value>(rest)? {
                Value::Array(items) if tag != PacketType::Error => {
                    items.into_iter().map(Data::Json).collect()
                }
                other => vec![Data::Json(other)],
            }
        };

        let mut packet = Packet::new(tag, data).with_nsp(nsp);
        packet.id = id;
        packet.query = query;
        Ok(packet)
    }
}

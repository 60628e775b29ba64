use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::Error;

/// Wire type ids, `type` field of every datagram's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum MessageType {
    SuccessorQuery = 1,
    JoinSuccessorQuery = 2,
    SuccessorResponse = 3,
    ChordMapQuery = 4,
    ChordMapResponse = 5,
    UpdatePredecessor = 6,
    UpdatePredecessorAck = 7,
    StabilizeRequest = 8,
    StabilizeResponse = 9,
    FingerQuery = 10,
    FingerResponse = 11,
}

/// A single Chord protocol datagram.
///
/// Every message is `(type: u32, size: u32)` in big-endian followed by
/// message-specific fixed fields and, for most variants, a NUL-terminated
/// trailing IP-address string that fills the remainder of `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    SuccessorQuery {
        search_term: u32,
        app_port: u32,
        sender_ip: String,
    },
    JoinSuccessorQuery {
        search_term: u32,
        app_port: u32,
        sender_ip: String,
    },
    SuccessorResponse {
        search_term: u32,
        app_port: u32,
        responder_ip: String,
    },
    ChordMapQuery {
        seq: u32,
        sender_ip: String,
    },
    ChordMapResponse {
        seq: u32,
        responder_ip: String,
    },
    UpdatePredecessor {
        app_port: u32,
        predecessor_ip: String,
    },
    UpdatePredecessorAck {
        hashed_id: u32,
    },
    StabilizeRequest {
        app_port: u32,
        sender_ip: String,
    },
    /// `predecessor_ip` may be empty when the responder has no predecessor.
    StabilizeResponse {
        app_port: u32,
        predecessor_ip: String,
    },
    FingerQuery {
        search_term: u32,
        app_port: u32,
        sender_ip: String,
    },
    FingerResponse {
        search_term: u32,
        app_port: u32,
        responder_ip: String,
    },
}

/// Header length (type + size) shared by every message.
const BASE_HEADER: usize = 8;

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::SuccessorQuery { .. } => MessageType::SuccessorQuery,
            Self::JoinSuccessorQuery { .. } => MessageType::JoinSuccessorQuery,
            Self::SuccessorResponse { .. } => MessageType::SuccessorResponse,
            Self::ChordMapQuery { .. } => MessageType::ChordMapQuery,
            Self::ChordMapResponse { .. } => MessageType::ChordMapResponse,
            Self::UpdatePredecessor { .. } => MessageType::UpdatePredecessor,
            Self::UpdatePredecessorAck { .. } => MessageType::UpdatePredecessorAck,
            Self::StabilizeRequest { .. } => MessageType::StabilizeRequest,
            Self::StabilizeResponse { .. } => MessageType::StabilizeResponse,
            Self::FingerQuery { .. } => MessageType::FingerQuery,
            Self::FingerResponse { .. } => MessageType::FingerResponse,
        }
    }

    /// Encodes this message into a single UDP datagram.
    ///
    /// # Test
    ///
    /// ```
    /// use chord_codec::message::Message;
    ///
    /// let msg = Message::SuccessorQuery {
    ///     search_term: 42,
    ///     app_port: 9000,
    ///     sender_ip: "10.0.0.1".to_string(),
    /// };
    ///
    /// let bytes = msg.encode();
    /// assert_eq!(Message::decode(&bytes).unwrap(), msg);
    /// ```
    pub fn encode(&self) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(64);
        bytes.put_u32(u32::from(self.message_type()));
        bytes.put_u32(0);

        match self {
            Self::SuccessorQuery {
                search_term,
                app_port,
                sender_ip,
            }
            | Self::JoinSuccessorQuery {
                search_term,
                app_port,
                sender_ip,
            }
            | Self::FingerQuery {
                search_term,
                app_port,
                sender_ip,
            } => {
                bytes.put_u32(*search_term);
                bytes.put_u32(*app_port);
                put_cstr(&mut bytes, sender_ip);
            }
            Self::SuccessorResponse {
                search_term,
                app_port,
                responder_ip,
            }
            | Self::FingerResponse {
                search_term,
                app_port,
                responder_ip,
            } => {
                bytes.put_u32(*search_term);
                bytes.put_u32(*app_port);
                put_cstr(&mut bytes, responder_ip);
            }
            Self::ChordMapQuery { seq, sender_ip } => {
                bytes.put_u32(*seq);
                put_cstr(&mut bytes, sender_ip);
            }
            Self::ChordMapResponse { seq, responder_ip } => {
                bytes.put_u32(*seq);
                put_cstr(&mut bytes, responder_ip);
            }
            Self::UpdatePredecessor {
                app_port,
                predecessor_ip,
            } => {
                bytes.put_u32(*app_port);
                put_cstr(&mut bytes, predecessor_ip);
            }
            Self::UpdatePredecessorAck { hashed_id } => {
                bytes.put_u32(*hashed_id);
            }
            Self::StabilizeRequest {
                app_port,
                sender_ip,
            } => {
                bytes.put_u32(*app_port);
                put_cstr(&mut bytes, sender_ip);
            }
            Self::StabilizeResponse {
                app_port,
                predecessor_ip,
            } => {
                bytes.put_u32(*app_port);
                put_cstr(&mut bytes, predecessor_ip);
            }
        }

        let size = bytes.len() as u32;
        bytes[4..8].copy_from_slice(&size.to_be_bytes());
        bytes
    }

    /// Decodes a single UDP datagram into a [`Message`].
    ///
    /// Fails with [`Error::Malformed`] if the datagram is shorter than its
    /// declared header, or if a trailing string field is not NUL-terminated
    /// within the datagram.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < BASE_HEADER {
            return Err(Error::Malformed);
        }

        let ty = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let size = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let ty = MessageType::try_from(ty).map_err(|_| Error::UnknownType(ty))?;

        if size > bytes.len() {
            return Err(Error::Malformed);
        }

        let bytes = &bytes[..size];

        Ok(match ty {
            MessageType::SuccessorQuery | MessageType::JoinSuccessorQuery | MessageType::FingerQuery => {
                if size < BASE_HEADER + 8 {
                    return Err(Error::Malformed);
                }

                let search_term = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let app_port = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
                let ip = get_cstr(&bytes[16..])?;

                match ty {
                    MessageType::SuccessorQuery => Self::SuccessorQuery {
                        search_term,
                        app_port,
                        sender_ip: ip,
                    },
                    MessageType::JoinSuccessorQuery => Self::JoinSuccessorQuery {
                        search_term,
                        app_port,
                        sender_ip: ip,
                    },
                    _ => Self::FingerQuery {
                        search_term,
                        app_port,
                        sender_ip: ip,
                    },
                }
            }
            MessageType::SuccessorResponse | MessageType::FingerResponse => {
                if size < BASE_HEADER + 8 {
                    return Err(Error::Malformed);
                }

                let search_term = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let app_port = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
                let ip = get_cstr(&bytes[16..])?;

                if ty == MessageType::SuccessorResponse {
                    Self::SuccessorResponse {
                        search_term,
                        app_port,
                        responder_ip: ip,
                    }
                } else {
                    Self::FingerResponse {
                        search_term,
                        app_port,
                        responder_ip: ip,
                    }
                }
            }
            MessageType::ChordMapQuery => {
                if size < BASE_HEADER + 4 {
                    return Err(Error::Malformed);
                }

                let seq = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let ip = get_cstr(&bytes[12..])?;
                Self::ChordMapQuery { seq, sender_ip: ip }
            }
            MessageType::ChordMapResponse => {
                if size < BASE_HEADER + 4 {
                    return Err(Error::Malformed);
                }

                let seq = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let ip = get_cstr(&bytes[12..])?;
                Self::ChordMapResponse {
                    seq,
                    responder_ip: ip,
                }
            }
            MessageType::UpdatePredecessor => {
                if size < BASE_HEADER + 4 {
                    return Err(Error::Malformed);
                }

                let app_port = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let ip = get_cstr(&bytes[12..])?;
                Self::UpdatePredecessor {
                    app_port,
                    predecessor_ip: ip,
                }
            }
            MessageType::UpdatePredecessorAck => {
                if size < BASE_HEADER + 4 {
                    return Err(Error::Malformed);
                }

                let hashed_id = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                Self::UpdatePredecessorAck { hashed_id }
            }
            MessageType::StabilizeRequest => {
                if size < BASE_HEADER + 4 {
                    return Err(Error::Malformed);
                }

                let app_port = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let ip = get_cstr(&bytes[12..])?;
                Self::StabilizeRequest {
                    app_port,
                    sender_ip: ip,
                }
            }
            MessageType::StabilizeResponse => {
                if size < BASE_HEADER + 4 {
                    return Err(Error::Malformed);
                }

                let app_port = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
                let ip = get_cstr(&bytes[12..])?;
                Self::StabilizeResponse {
                    app_port,
                    predecessor_ip: ip,
                }
            }
        })
    }
}

/// Appends a NUL-terminated UTF-8 string to the buffer.
fn put_cstr(bytes: &mut BytesMut, s: &str) {
    bytes.put(s.as_bytes());
    bytes.put_u8(0);
}

/// Reads a NUL-terminated UTF-8 string from the trailing region of a
/// datagram. `region` is everything after the fixed header fields, up to
/// the declared `size`.
fn get_cstr(region: &[u8]) -> Result<String, Error> {
    let nul = region.iter().position(|&b| b == 0).ok_or(Error::Malformed)?;
    std::str::from_utf8(&region[..nul])
        .map(str::to_string)
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: Message) {
        let bytes = msg.encode();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn round_trips_every_variant() {
        round_trip(Message::SuccessorQuery {
            search_term: 1,
            app_port: 2,
            sender_ip: "1.2.3.4".into(),
        });
        round_trip(Message::JoinSuccessorQuery {
            search_term: 1,
            app_port: 2,
            sender_ip: "1.2.3.4".into(),
        });
        round_trip(Message::SuccessorResponse {
            search_term: 1,
            app_port: 2,
            responder_ip: "1.2.3.4".into(),
        });
        round_trip(Message::ChordMapQuery {
            seq: 1,
            sender_ip: "1.2.3.4".into(),
        });
        round_trip(Message::ChordMapResponse {
            seq: 0,
            responder_ip: "1.2.3.4".into(),
        });
        round_trip(Message::UpdatePredecessor {
            app_port: 9000,
            predecessor_ip: "1.2.3.4".into(),
        });
        round_trip(Message::UpdatePredecessorAck { hashed_id: 123 });
        round_trip(Message::StabilizeRequest {
            app_port: 9000,
            sender_ip: "1.2.3.4".into(),
        });
        round_trip(Message::StabilizeResponse {
            app_port: 9000,
            predecessor_ip: String::new(),
        });
        round_trip(Message::FingerQuery {
            search_term: 7,
            app_port: 2,
            sender_ip: "1.2.3.4".into(),
        });
        round_trip(Message::FingerResponse {
            search_term: 7,
            app_port: 2,
            responder_ip: "1.2.3.4".into(),
        });
    }

    #[test]
    fn stabilize_response_allows_empty_predecessor() {
        let msg = Message::StabilizeResponse {
            app_port: 4000,
            predecessor_ip: String::new(),
        };

        let bytes = msg.encode();
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = [0u8, 0, 0, 1];
        assert!(matches!(Message::decode(&bytes), Err(Error::Malformed)));
    }

    #[test]
    fn rejects_missing_nul_terminator() {
        let mut msg = Message::SuccessorQuery {
            search_term: 1,
            app_port: 2,
            sender_ip: "1.2.3.4".into(),
        }
        .encode();

        // Truncate away the NUL terminator without updating `size`.
        let new_len = msg.len() - 1;
        msg.truncate(new_len);

        assert!(matches!(Message::decode(&msg), Err(Error::Malformed)));
    }

    #[test]
    fn rejects_unknown_type() {
        let mut bytes = BytesMut::new();
        bytes.put_u32(999);
        bytes.put_u32(8);
        assert!(matches!(
            Message::decode(&bytes),
            Err(Error::UnknownType(999))
        ));
    }
}

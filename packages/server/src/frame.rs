//! JSON-lines frames exchanged with clients, and their mapping onto
//! connection events.
//!
//! Ops are named from the client's side: `attach_receiver` means the client
//! wants to receive, so the broker opens a sender link.

use std::collections::HashMap;

use broker_core::{
    BrokerError, ConnectionEvent, ErrorCondition, LinkId, LinkRole, Message, Result, SessionId,
};
use serde::{Deserialize, Serialize};

/// Frames sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientFrame {
    Open,
    AttachReceiver {
        link: LinkId,
        #[serde(default)]
        session: SessionId,
        #[serde(default)]
        source: String,
        #[serde(default)]
        dynamic: bool,
    },
    AttachSender {
        link: LinkId,
        #[serde(default)]
        session: SessionId,
        #[serde(default)]
        target: String,
    },
    Flow {
        link: LinkId,
        credit: u32,
    },
    Transfer {
        link: LinkId,
        #[serde(default)]
        body: serde_json::Value,
        #[serde(default)]
        subject: Option<String>,
    },
    Detach {
        link: LinkId,
    },
    End {
        session: SessionId,
    },
    Close,
}

/// Frames sent by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BrokerFrame {
    Opened,
    Attached {
        link: LinkId,
        role: LinkRole,
        address: String,
    },
    Transfer {
        link: LinkId,
        message: Message,
    },
    Error {
        condition: ErrorCondition,
    },
}

/// Result of translating one client frame.
#[derive(Debug)]
pub enum Translation {
    Event(ConnectionEvent),
    Close,
}

/// Parse one line into a client frame.
pub fn decode(line: &str) -> Result<ClientFrame> {
    serde_json::from_str(line).map_err(|e| BrokerError::Protocol(format!("bad frame: {}", e)))
}

/// Encode a broker frame as one newline-terminated line.
pub fn encode(frame: &BrokerFrame) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}

/// Links attached on one connection, so detaches map to the right event.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: HashMap<LinkId, (LinkRole, SessionId)>,
}

impl LinkTable {
    /// Map a client frame onto the connection event stream.
    pub fn translate(&mut self, frame: ClientFrame) -> Result<Translation> {
        let event = match frame {
            ClientFrame::Open => ConnectionEvent::ConnectionOpened,
            ClientFrame::AttachReceiver {
                link,
                session,
                source,
                dynamic,
            } => {
                self.attach(link, LinkRole::Sender, session)?;
                ConnectionEvent::SenderOpened {
                    link,
                    session,
                    source,
                    dynamic,
                }
            }
            ClientFrame::AttachSender {
                link,
                session,
                target,
            } => {
                self.attach(link, LinkRole::Receiver, session)?;
                ConnectionEvent::ReceiverOpened {
                    link,
                    session,
                    target,
                }
            }
            ClientFrame::Flow { link, credit } => ConnectionEvent::Sendable { link, credit },
            ClientFrame::Transfer {
                link,
                body,
                subject,
            } => {
                let mut message = Message::new(body);
                message.subject = subject;
                ConnectionEvent::MessageArrived { link, message }
            }
            ClientFrame::Detach { link } => match self.links.remove(&link) {
                Some((LinkRole::Sender, _)) => ConnectionEvent::SenderClosed { link },
                Some((LinkRole::Receiver, _)) => ConnectionEvent::ReceiverClosed { link },
                None => return Err(BrokerError::UnknownLink(link)),
            },
            ClientFrame::End { session } => {
                self.links.retain(|_, (_, s)| *s != session);
                ConnectionEvent::SessionClosed { session }
            }
            ClientFrame::Close => return Ok(Translation::Close),
        };
        Ok(Translation::Event(event))
    }

    fn attach(&mut self, link: LinkId, role: LinkRole, session: SessionId) -> Result<()> {
        if self.links.contains_key(&link) {
            return Err(BrokerError::Protocol(format!("{} is already attached", link)));
        }
        self.links.insert(link, (role, session));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(table: &mut LinkTable, line: &str) -> ConnectionEvent {
        match table.translate(decode(line).unwrap()).unwrap() {
            Translation::Event(event) => event,
            Translation::Close => panic!("unexpected close"),
        }
    }

    #[test]
    fn attach_receiver_opens_a_broker_sender() {
        let mut table = LinkTable::default();
        let ev = event(&mut table, r#"{"op":"attach_receiver","link":4,"source":"q1"}"#);
        match ev {
            ConnectionEvent::SenderOpened {
                link,
                session,
                source,
                dynamic,
            } => {
                assert_eq!(link, LinkId(4));
                assert_eq!(session, SessionId(0));
                assert_eq!(source, "q1");
                assert!(!dynamic);
            }
            other => panic!("unexpected {other:?}"),
        }

        let ev = event(&mut table, r#"{"op":"detach","link":4}"#);
        assert!(matches!(ev, ConnectionEvent::SenderClosed { link } if link == LinkId(4)));
    }

    #[test]
    fn detach_maps_by_role() {
        let mut table = LinkTable::default();
        event(&mut table, r#"{"op":"attach_sender","link":1,"session":2,"target":"q1"}"#);
        let ev = event(&mut table, r#"{"op":"detach","link":1}"#);
        assert!(matches!(ev, ConnectionEvent::ReceiverClosed { .. }));

        let err = table.translate(decode(r#"{"op":"detach","link":1}"#).unwrap());
        assert!(matches!(err, Err(BrokerError::UnknownLink(_))));
    }

    #[test]
    fn end_forgets_the_session_links() {
        let mut table = LinkTable::default();
        event(&mut table, r#"{"op":"attach_sender","link":1,"session":2}"#);
        event(&mut table, r#"{"op":"attach_receiver","link":2,"session":3}"#);
        let ev = event(&mut table, r#"{"op":"end","session":2}"#);
        assert!(matches!(
            ev,
            ConnectionEvent::SessionClosed { session } if session == SessionId(2)
        ));

        assert!(table.translate(decode(r#"{"op":"detach","link":1}"#).unwrap()).is_err());
        assert!(matches!(
            event(&mut table, r#"{"op":"detach","link":2}"#),
            ConnectionEvent::SenderClosed { .. }
        ));
    }

    #[test]
    fn duplicate_attach_is_a_protocol_error() {
        let mut table = LinkTable::default();
        event(&mut table, r#"{"op":"attach_sender","link":1,"target":"q"}"#);
        let err = table.translate(decode(r#"{"op":"attach_receiver","link":1}"#).unwrap());
        assert!(matches!(err, Err(BrokerError::Protocol(_))));
    }

    #[test]
    fn transfer_carries_body_and_subject() {
        let mut table = LinkTable::default();
        let ev = event(
            &mut table,
            r#"{"op":"transfer","link":9,"body":{"n":1},"subject":"count"}"#,
        );
        match ev {
            ConnectionEvent::MessageArrived { link, message } => {
                assert_eq!(link, LinkId(9));
                assert_eq!(message.body["n"], 1);
                assert_eq!(message.subject.as_deref(), Some("count"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode("not json"), Err(BrokerError::Protocol(_))));
        assert!(matches!(
            decode(r#"{"op":"teleport"}"#),
            Err(BrokerError::Protocol(_))
        ));
    }

    #[test]
    fn broker_frames_are_single_lines() {
        let line = encode(&BrokerFrame::Attached {
            link: LinkId(1),
            role: LinkRole::Sender,
            address: "q1".into(),
        })
        .unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        let text = String::from_utf8(line).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.contains(r#""op":"attached""#));
        assert!(text.contains(r#""role":"sender""#));
    }
}

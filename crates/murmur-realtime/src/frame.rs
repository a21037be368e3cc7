//! Frame reassembly — raw transport frames in, complete messages out.
//!
//! A logical wire message may arrive as one complete frame (the common case,
//! passed through without copying) or as a first frame plus continuations
//! terminated by a FIN marker. Ping/pong traffic is invisible here; a close
//! aborts any partial accumulation.

use bytes::BytesMut;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Control, Data, OpCode};
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tracing::warn;

/// A complete unit produced by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// One complete text message, ready for classification.
    Text(Utf8Bytes),
    /// The peer closed the connection.
    Close(Option<CloseFrame>),
}

/// Reassembles fragmented transport frames into complete text messages.
///
/// State machine per message: awaiting-first-frame → accumulating* →
/// complete. Complete messages short-circuit the buffer entirely.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: BytesMut,
    collecting: bool,
}

impl FrameAssembler {
    /// Fresh assembler in the awaiting-first-frame state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport message; returns a completed unit if this message
    /// finished one.
    pub fn push(&mut self, message: Message) -> Option<Assembled> {
        match message {
            Message::Text(text) => {
                if self.collecting {
                    warn!("complete message interleaved with fragments; dropping partial");
                    self.reset();
                }
                Some(Assembled::Text(text))
            }
            Message::Binary(data) => {
                if self.collecting {
                    warn!("complete message interleaved with fragments; dropping partial");
                    self.reset();
                }
                self.buffer.extend_from_slice(&data);
                self.finish()
            }
            Message::Frame(frame) => {
                let is_final = frame.header().is_final;
                match frame.header().opcode {
                    OpCode::Data(Data::Text | Data::Binary) => {
                        if self.collecting {
                            warn!("new fragment stream before FIN; dropping partial");
                            self.reset();
                        }
                        self.collecting = true;
                        self.buffer.extend_from_slice(frame.payload());
                        if is_final { self.finish() } else { None }
                    }
                    OpCode::Data(Data::Continue) => {
                        self.buffer.extend_from_slice(frame.payload());
                        if is_final { self.finish() } else { None }
                    }
                    OpCode::Control(Control::Close) => Some(Assembled::Close(None)),
                    OpCode::Control(_) | OpCode::Data(Data::Reserved(_)) => None,
                }
            }
            Message::Close(frame) => Some(Assembled::Close(frame)),
            Message::Ping(_) | Message::Pong(_) => None,
        }
    }

    fn finish(&mut self) -> Option<Assembled> {
        self.collecting = false;
        let bytes = self.buffer.split();
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Assembled::Text(text.into())),
            Err(e) => {
                warn!("reassembled message is not UTF-8, dropping: {e}");
                None
            }
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.collecting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::{ServerEvent, classify};
    use tokio_tungstenite::tungstenite::protocol::frame::Frame;

    fn first(payload: &str, is_final: bool) -> Message {
        Message::Frame(Frame::message(
            payload.as_bytes().to_vec(),
            OpCode::Data(Data::Text),
            is_final,
        ))
    }

    fn continuation(payload: &str, is_final: bool) -> Message {
        Message::Frame(Frame::message(
            payload.as_bytes().to_vec(),
            OpCode::Data(Data::Continue),
            is_final,
        ))
    }

    #[test]
    fn single_frame_fast_path() {
        let mut assembler = FrameAssembler::new();
        let out = assembler.push(Message::Text("{\"type\":\"error\"}".into()));
        assert_eq!(out, Some(Assembled::Text("{\"type\":\"error\"}".into())));
    }

    #[test]
    fn fragments_concatenate_in_arrival_order() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(first("{\"type\":", false)), None);
        assert_eq!(assembler.push(continuation("\"session.", false)), None);
        let out = assembler.push(continuation("created\",\"session\":{}}", true));
        let Some(Assembled::Text(text)) = out else {
            panic!("expected completed message");
        };
        assert_eq!(text.as_str(), "{\"type\":\"session.created\",\"session\":{}}");
    }

    #[test]
    fn fragmented_classifies_same_as_single_frame() {
        let wire = r#"{"type":"response.output_text.delta","delta":"hello"}"#;
        let (head, tail) = wire.split_at(wire.len() / 2);

        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(first(head, false)), None);
        let Some(Assembled::Text(reassembled)) = assembler.push(continuation(tail, true)) else {
            panic!("expected completed message");
        };

        assert_eq!(classify(reassembled.as_str()), classify(wire));
        assert!(matches!(
            classify(reassembled.as_str()),
            ServerEvent::TextDelta { .. }
        ));
    }

    #[test]
    fn close_aborts_reassembly() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(first("{\"type\":", false)), None);
        assert_eq!(
            assembler.push(Message::Close(None)),
            Some(Assembled::Close(None))
        );
    }

    #[test]
    fn ping_pong_invisible_mid_message() {
        let mut assembler = FrameAssembler::new();
        assert_eq!(assembler.push(first("ab", false)), None);
        assert_eq!(assembler.push(Message::Ping(vec![1].into())), None);
        assert_eq!(assembler.push(Message::Pong(vec![1].into())), None);
        let Some(Assembled::Text(text)) = assembler.push(continuation("cd", true)) else {
            panic!("expected completed message");
        };
        assert_eq!(text.as_str(), "abcd");
    }

    #[test]
    fn binary_message_decoded_as_text() {
        let mut assembler = FrameAssembler::new();
        let out = assembler.push(Message::Binary(b"{\"type\":\"x\"}".to_vec().into()));
        assert_eq!(out, Some(Assembled::Text("{\"type\":\"x\"}".into())));
    }
}

//! Async framed message transport built on the codec and framing primitives.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::wire::{
    framing::{FrameHeader, HEADER_LEN},
    Message, WireError,
};

/// Messages larger than this are rejected before allocating a buffer for
/// them, independent of any message-specific limit enforced during parsing.
const MAX_FRAME_PAYLOAD: usize = 4 * 1024 * 1024;

pub struct FramedTransport {
    magic: [u8; 4],
}

impl FramedTransport {
    pub fn new(magic: [u8; 4]) -> Self {
        FramedTransport { magic }
    }

    pub fn encode(&self, message: &Message) -> Vec<u8> {
        let payload = message.encode_payload();
        let header = FrameHeader::new(self.magic, message.command(), &payload);
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        header.write_to(&mut out);
        out.extend_from_slice(&payload);
        out
    }

    pub async fn write_message<W>(&self, w: &mut W, message: &Message) -> Result<(), WireError>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.encode(message);
        w.write_all(&bytes).await?;
        Ok(())
    }

    pub async fn read_message<R>(&self, r: &mut R) -> Result<Message, WireError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header_bytes = [0u8; HEADER_LEN];
        r.read_exact(&mut header_bytes).await?;

        let header = FrameHeader::parse(&header_bytes);
        if header.magic != self.magic {
            return Err(WireError::InvalidMagic);
        }
        if header.length as usize > MAX_FRAME_PAYLOAD {
            return Err(WireError::MessageTooLarge {
                command: header.command.clone(),
                size: header.length as usize,
                max: MAX_FRAME_PAYLOAD,
            });
        }

        let mut payload = vec![0u8; header.length as usize];
        if header.length > 0 {
            r.read_exact(&mut payload).await?;
        }

        if !header.verify_checksum(&payload) && header.command != "version" && header.command != "verack" {
            return Err(WireError::InvalidChecksum);
        }

        Message::decode_payload(&header.command, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::VersionMessage;

    #[tokio::test]
    async fn writes_then_reads_back_same_message() {
        let transport = FramedTransport::new([0xAA, 0xBB, 0xCC, 0xDD]);
        let msg = Message::Version(VersionMessage::new(
            crate::wire::message::ServiceFlags::NETWORK,
            Default::default(),
            Default::default(),
            "/svp:0.1.0/".to_string(),
            0,
            true,
            0,
            0,
        ));

        let mut buf = Vec::new();
        transport.write_message(&mut buf, &msg).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = transport.read_message(&mut cursor).await.unwrap();
        match decoded {
            Message::Version(v) => assert_eq!(v.user_agent, "/svp:0.1.0/"),
            _ => panic!("expected version message"),
        }
    }

    #[tokio::test]
    async fn rejects_wrong_magic() {
        let sender = FramedTransport::new([1, 2, 3, 4]);
        let receiver = FramedTransport::new([9, 9, 9, 9]);
        let mut buf = Vec::new();
        sender
            .write_message(&mut buf, &Message::VerAck)
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let err = receiver.read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, WireError::InvalidMagic));
    }
}

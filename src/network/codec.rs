use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, AsyncWrite};

use crate::broadcast::message::Message;
use crate::common::clock::{ProcessId, VectorClock};
use crate::common::error::TransportError;

/*
    Frame layout, every integer a big-endian u32:

        sender_id | seq_number | clock_len | clock[0..clock_len] | payload_len | payload

    The payload is UTF-8. A frame is only accepted when its clock has one
    slot per group member and its sender belongs to the group.
*/

pub const MAX_PAYLOAD: usize = 64 * 1024;

pub fn encode(msg: &Message) -> Bytes {
    let clock = msg.vector_clock.as_slice();
    let mut buf = BytesMut::with_capacity(16 + 4 * clock.len() + msg.payload.len());
    buf.put_u32(msg.sender_id as u32);
    buf.put_u32(msg.seq_number);
    buf.put_u32(clock.len() as u32);
    for &value in clock {
        buf.put_u32(value);
    }
    buf.put_u32(msg.payload.len() as u32);
    buf.put_slice(msg.payload.as_bytes());
    buf.freeze()
}

pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(msg)).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. `Ok(None)` means the peer closed the stream cleanly
/// between frames; a stream that ends inside a frame is an error.
pub async fn read_message<R>(reader: &mut R, group_size: usize) -> Result<Option<Message>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let sender_id = match reader.read_u32().await {
        Ok(value) => value as ProcessId,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if sender_id >= group_size {
        return Err(TransportError::Malformed(format!("sender {} outside group", sender_id)));
    }

    let seq_number = reader.read_u32().await?;

    let clock_len = reader.read_u32().await? as usize;
    if clock_len != group_size {
        return Err(TransportError::Malformed(format!(
            "clock has {} slots, group has {}",
            clock_len, group_size
        )));
    }
    let mut slots = Vec::with_capacity(clock_len);
    for _ in 0..clock_len {
        slots.push(reader.read_u32().await?);
    }

    let payload_len = reader.read_u32().await? as usize;
    if payload_len > MAX_PAYLOAD {
        return Err(TransportError::Malformed(format!("payload of {} bytes", payload_len)));
    }
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload).await?;
    let payload = String::from_utf8(payload)
        .map_err(|_| TransportError::Malformed("payload is not utf-8".to_string()))?;

    Ok(Some(Message {
        sender_id,
        seq_number,
        vector_clock: VectorClock::from_slots(slots),
        payload,
    }))
}

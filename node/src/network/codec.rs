// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::errors::MeshError;
use crate::network::protocol::WireMessage;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Length-prefixed bincode frames carrying [`WireMessage`]s.
#[derive(Debug)]
pub struct MessageCodec {
    frames: LengthDelimitedCodec,
}

impl MessageCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_len)
                .new_codec(),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for MessageCodec {
    type Item = WireMessage;
    type Error = MeshError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireMessage>, MeshError> {
        let frame = match self.frames.decode(src)? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let (msg, read) = bincode::serde::decode_from_slice::<WireMessage, _>(
            &frame,
            bincode::config::standard(),
        )
        .map_err(|e| MeshError::Codec(e.to_string()))?;

        if read != frame.len() {
            return Err(MeshError::Codec(format!(
                "trailing bytes in frame: decoded {} of {}",
                read,
                frame.len()
            )));
        }
        Ok(Some(msg))
    }
}

impl Encoder<WireMessage> for MessageCodec {
    type Error = MeshError;

    fn encode(&mut self, item: WireMessage, dst: &mut BytesMut) -> Result<(), MeshError> {
        let payload = bincode::serde::encode_to_vec(&item, bincode::config::standard())
            .map_err(|e| MeshError::Codec(e.to_string()))?;
        self.frames.encode(Bytes::from(payload), dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knnmesh_kernel::{DataPoint, DistanceMetric, Neighbor, PointFilter, PointId, Query, QueryId};

    fn encode(codec: &mut MessageCodec, msg: WireMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_query_survives_the_wire() {
        let mut codec = MessageCodec::default();
        let target = DataPoint::new(PointId(0), vec![0.5, -1.0, 2.0]);
        let filter = PointFilter::allow([PointId(3), PointId(4)]);
        let query = Query::new(QueryId(7), 3, target, DistanceMetric::Cosine, Some(filter)).unwrap();
        let msg = WireMessage::FindKNearest { query };

        let mut buf = encode(&mut codec, msg.clone());
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(msg));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let mut codec = MessageCodec::default();
        let msg = WireMessage::QueryReply {
            query_id: QueryId(1),
            neighbors: vec![Neighbor::new(PointId(1), 0.25)],
            skipped: 0,
        };
        let full = encode(&mut codec, msg.clone());

        let mut buf = BytesMut::from(&full[..full.len() - 1]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&full[full.len() - 1..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(msg));
    }

    #[test]
    fn test_back_to_back_frames_decode_in_order() {
        let mut codec = MessageCodec::default();
        let mut buf = encode(&mut codec, WireMessage::RemovePoint { id: PointId(9) });
        buf.extend_from_slice(&encode(&mut codec, WireMessage::Shutdown));

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(WireMessage::RemovePoint { id: PointId(9) }));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(WireMessage::Shutdown));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversize_frame_is_rejected() {
        let mut big = MessageCodec::new(1024 * 1024);
        let point = DataPoint::new(PointId(1), vec![1.0; 1000]);
        let mut buf = encode(&mut big, WireMessage::AddPoint { point });

        let mut small = MessageCodec::new(64);
        assert!(small.decode(&mut buf).is_err());
    }

    #[test]
    fn test_garbage_payload_is_a_codec_error() {
        let mut codec = MessageCodec::default();
        let mut buf = BytesMut::new();
        LengthDelimitedCodec::new()
            .encode(Bytes::from_static(&[0xff, 0xff, 0xff]), &mut buf)
            .unwrap();
        assert!(matches!(codec.decode(&mut buf), Err(MeshError::Codec(_))));
    }
}

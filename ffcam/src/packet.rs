use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// A compressed packet copied out of the encoder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedPacket {
    data: Bytes,
    pts: Option<i64>,
    dts: Option<i64>,
    is_key: bool,
}

impl EncodedPacket {
    pub fn new(data: impl Into<Bytes>, pts: Option<i64>, dts: Option<i64>, is_key: bool) -> Self {
        Self {
            data: data.into(),
            pts,
            dts,
            is_key,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn dts(&self) -> Option<i64> {
        self.dts
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }
}

impl From<&ffmpeg_next::codec::packet::Packet> for EncodedPacket {
    fn from(packet: &ffmpeg_next::codec::packet::Packet) -> Self {
        Self {
            data: packet
                .data()
                .map(Bytes::copy_from_slice)
                .unwrap_or_default(),
            pts: packet.pts(),
            dts: packet.dts(),
            is_key: packet.is_key(),
        }
    }
}

impl Display for EncodedPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "EncodedPacket size: {}, pts: {:?}, dts: {:?}, is_key: {}",
            self.data.len(),
            self.pts,
            self.dts,
            self.is_key
        )
    }
}

use nom::{
    bytes::complete::tag,
    combinator::eof,
    number::complete::{be_f32, be_f64, be_i32},
    Finish, IResult,
};

use crate::{sample::ConvertedSample, FeedResult};

/// X-Plane `VEH1` datagram: place one externally driven vehicle at a position and attitude.
///
/// The packet is a 4 byte ASCII tag, a zero byte, then the fields below in order, each encoded
/// big-endian at its fixed width. Nothing depends on the host's struct layout or byte order.
///
/// | Offset | Size | Field        |
/// |--------|------|--------------|
/// | 0      | 4    | `VEH1`       |
/// | 4      | 1    | `0`          |
/// | 5      | 4    | vehicle id   |
/// | 9      | 8    | latitude     |
/// | 17     | 8    | longitude    |
/// | 25     | 8    | elevation, m |
/// | 33     | 4    | heading      |
/// | 37     | 4    | pitch        |
/// | 41     | 4    | roll         |
/// | 45     | 4    | gear         |
/// | 49     | 4    | flap         |
/// | 53     | 4    | vectoring    |
///
/// Receivers built against the legacy in-memory layout may expect padding after the vehicle id;
/// check the target host before relying on byte-identical packets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Veh1 {
    pub vehicle_id: i32,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    pub heading: f32,
    pub pitch: f32,
    pub roll: f32,
    pub gear: f32,
    pub flap: f32,
    pub vectoring: f32,
}

pub const MAGIC: [u8; 4] = *b"VEH1";
pub const PACKET_LEN: usize = 57;

impl From<&ConvertedSample> for Veh1 {
    /// Attitude and configuration fields are not tracked and are always zero.
    fn from(s: &ConvertedSample) -> Self {
        Self {
            vehicle_id: s.vehicle_id,
            latitude: s.latitude,
            longitude: s.longitude,
            elevation_m: s.altitude_m,
            heading: s.heading,
            ..Default::default()
        }
    }
}

impl Veh1 {
    pub fn sample(&self) -> ConvertedSample {
        ConvertedSample {
            vehicle_id: self.vehicle_id,
            latitude: self.latitude,
            longitude: self.longitude,
            altitude_m: self.elevation_m,
            heading: self.heading,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&MAGIC);
        put(&[0]);
        put(&self.vehicle_id.to_be_bytes());
        put(&self.latitude.to_be_bytes());
        put(&self.longitude.to_be_bytes());
        put(&self.elevation_m.to_be_bytes());
        put(&self.heading.to_be_bytes());
        put(&self.pitch.to_be_bytes());
        put(&self.roll.to_be_bytes());
        put(&self.gear.to_be_bytes());
        put(&self.flap.to_be_bytes());
        put(&self.vectoring.to_be_bytes());
        debug_assert_eq!(at, PACKET_LEN);
        out
    }
}

/// Decode one complete `VEH1` datagram. Trailing bytes are an error.
pub fn parse(bytes: &[u8]) -> FeedResult<Veh1> {
    let nom_res = nom_parse(bytes);
    nom_res.finish().map(|(_, msg)| msg).map_err(|e| e.into())
}

fn nom_parse(bytes: &[u8]) -> IResult<&[u8], Veh1> {
    let (rest, _) = tag(MAGIC)(bytes)?;
    let (rest, _) = tag([0u8])(rest)?;
    let (rest, vehicle_id) = be_i32(rest)?;
    let (rest, latitude) = be_f64(rest)?;
    let (rest, longitude) = be_f64(rest)?;
    let (rest, elevation_m) = be_f64(rest)?;
    let (rest, heading) = be_f32(rest)?;
    let (rest, pitch) = be_f32(rest)?;
    let (rest, roll) = be_f32(rest)?;
    let (rest, gear) = be_f32(rest)?;
    let (rest, flap) = be_f32(rest)?;
    let (rest, vectoring) = be_f32(rest)?;
    let (rest, _) = eof(rest)?;
    Ok((
        rest,
        Veh1 {
            vehicle_id,
            latitude,
            longitude,
            elevation_m,
            heading,
            pitch,
            roll,
            gear,
            flap,
            vectoring,
        },
    ))
}

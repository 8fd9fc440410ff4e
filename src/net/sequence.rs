/// Half of the 32 bit sequence space; differences at or past this are "older"
const HALF_RANGE: u32 = 0x8000_0000;

/// Whether `seq` comes strictly after `reference` on the circular 32 bit
/// sequence space.
pub fn is_newer(seq: u32, reference: u32) -> bool {
    let diff = seq.wrapping_sub(reference);
    diff != 0 && diff < HALF_RANGE
}

/// The low 16 bits of a sequence number, as carried on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireSequence(u16);

impl From<u16> for WireSequence {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<WireSequence> for u16 {
    fn from(value: WireSequence) -> Self {
        value.0
    }
}

impl WireSequence {
    pub fn from_sequence(seq: u32) -> Self {
        Self((seq & 0xFFFF) as u16)
    }

    /// Expands back to the full sequence number closest to `reference`.
    pub fn to_sequence(self, reference: u32) -> u32 {
        let offset = self.0.wrapping_sub(reference as u16) as i16;
        reference.wrapping_add(offset as i32 as u32)
    }
}

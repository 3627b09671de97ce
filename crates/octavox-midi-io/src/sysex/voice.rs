//! Voice parameter indexing.
//!
//! The 155-byte voice image is 6 operator blocks of 21 fields (operators
//! stored 6 down to 1) followed by 29 common fields. Offset 155 is the
//! operator-enable mask, which travels as a parameter change but is not part
//! of the stored image. Field value bounds are kept as data tables so that
//! inbound parameter changes clamp against them instead of scattering
//! literals through the decoder.

/// Fields of one operator block, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpField {
    EgRate1 = 0,
    EgRate2,
    EgRate3,
    EgRate4,
    EgLevel1,
    EgLevel2,
    EgLevel3,
    EgLevel4,
    BreakPoint,
    LeftDepth,
    RightDepth,
    LeftCurve,
    RightCurve,
    RateScale,
    AmpModSense,
    KeyVelocitySense,
    OutputLevel,
    OscMode,
    FreqCoarse,
    FreqFine,
    Detune,
}

/// Common (non-operator) fields, in wire order starting at offset 126.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommonField {
    PitchEgRate1 = 0,
    PitchEgRate2,
    PitchEgRate3,
    PitchEgRate4,
    PitchEgLevel1,
    PitchEgLevel2,
    PitchEgLevel3,
    PitchEgLevel4,
    Algorithm,
    Feedback,
    OscKeySync,
    LfoSpeed,
    LfoDelay,
    LfoPmDepth,
    LfoAmDepth,
    LfoKeySync,
    LfoWave,
    PitchModSense,
    Transpose,
    Name0,
    Name1,
    Name2,
    Name3,
    Name4,
    Name5,
    Name6,
    Name7,
    Name8,
    Name9,
}

pub const OPERATOR_COUNT: usize = 6;
pub const OP_FIELD_COUNT: usize = 21;
pub const COMMON_FIELD_COUNT: usize = 29;

/// Length of a voice image (bulk payload).
pub const VOICE_IMAGE_LEN: usize = OPERATOR_COUNT * OP_FIELD_COUNT + COMMON_FIELD_COUNT;

/// Parameter offset carrying the operator-enable mask.
pub const OPERATOR_MASK_OFFSET: u16 = VOICE_IMAGE_LEN as u16;

/// Upper bound per operator field, indexed by [`OpField`] discriminant.
const OP_FIELD_MAX: [u8; OP_FIELD_COUNT] = [
    99, 99, 99, 99, // EG rates
    99, 99, 99, 99, // EG levels
    99, 99, 99, // break point, left/right depth
    3, 3, // left/right curve
    7, 3, 7, // rate scale, AM sense, velocity sense
    99, 1, 31, 99, 14, // output level, osc mode, coarse, fine, detune
];

/// Upper bound per common field, indexed by [`CommonField`] discriminant.
const COMMON_FIELD_MAX: [u8; COMMON_FIELD_COUNT] = [
    99, 99, 99, 99, // pitch EG rates
    99, 99, 99, 99, // pitch EG levels
    31, 7, 1, // algorithm, feedback, osc key sync
    99, 99, 99, 99, // LFO speed, delay, PMD, AMD
    1, 5, 7, 48, // LFO key sync, wave, pitch mod sense, transpose
    127, 127, 127, 127, 127, 127, 127, 127, 127, 127, // name
];

/// One operator, identified by its panel number (1..=6).
///
/// The wire layout stores operator 6 first, so the stream index and the
/// panel number run in opposite directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operator(u8);

impl Operator {
    pub fn new(number: u8) -> Option<Self> {
        (1..=OPERATOR_COUNT as u8).contains(&number).then_some(Self(number))
    }

    /// Panel number, 1..=6.
    #[inline]
    pub fn number(self) -> u8 {
        self.0
    }

    /// Position of this operator's block in the wire stream (0..=5).
    #[inline]
    pub fn stream_index(self) -> usize {
        OPERATOR_COUNT - self.0 as usize
    }

    fn from_stream_index(index: usize) -> Option<Self> {
        (index < OPERATOR_COUNT).then(|| Self((OPERATOR_COUNT - index) as u8))
    }
}

/// A single voice parameter as a typed 2D index, replacing raw
/// `offset + op * 21` arithmetic at the protocol boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceParam {
    Op { op: Operator, field: OpField },
    Common(CommonField),
}

impl VoiceParam {
    /// Map a wire offset (0..=154) to its typed index.
    pub fn from_offset(offset: u16) -> Option<Self> {
        let offset = offset as usize;
        if offset < OPERATOR_COUNT * OP_FIELD_COUNT {
            let op = Operator::from_stream_index(offset / OP_FIELD_COUNT)?;
            let field = OP_FIELDS[offset % OP_FIELD_COUNT];
            Some(VoiceParam::Op { op, field })
        } else if offset < VOICE_IMAGE_LEN {
            Some(VoiceParam::Common(
                COMMON_FIELDS[offset - OPERATOR_COUNT * OP_FIELD_COUNT],
            ))
        } else {
            None
        }
    }

    /// The wire offset of this parameter.
    pub fn offset(self) -> u16 {
        match self {
            VoiceParam::Op { op, field } => {
                (op.stream_index() * OP_FIELD_COUNT + field as usize) as u16
            }
            VoiceParam::Common(field) => (OPERATOR_COUNT * OP_FIELD_COUNT + field as usize) as u16,
        }
    }

    /// Inclusive upper bound for this field's value.
    pub fn max(self) -> u8 {
        match self {
            VoiceParam::Op { field, .. } => OP_FIELD_MAX[field as usize],
            VoiceParam::Common(field) => COMMON_FIELD_MAX[field as usize],
        }
    }

    /// Clamp an inbound value to this field's bound.
    #[inline]
    pub fn clamp(self, value: u8) -> u8 {
        value.min(self.max())
    }
}

const OP_FIELDS: [OpField; OP_FIELD_COUNT] = [
    OpField::EgRate1,
    OpField::EgRate2,
    OpField::EgRate3,
    OpField::EgRate4,
    OpField::EgLevel1,
    OpField::EgLevel2,
    OpField::EgLevel3,
    OpField::EgLevel4,
    OpField::BreakPoint,
    OpField::LeftDepth,
    OpField::RightDepth,
    OpField::LeftCurve,
    OpField::RightCurve,
    OpField::RateScale,
    OpField::AmpModSense,
    OpField::KeyVelocitySense,
    OpField::OutputLevel,
    OpField::OscMode,
    OpField::FreqCoarse,
    OpField::FreqFine,
    OpField::Detune,
];

const COMMON_FIELDS: [CommonField; COMMON_FIELD_COUNT] = [
    CommonField::PitchEgRate1,
    CommonField::PitchEgRate2,
    CommonField::PitchEgRate3,
    CommonField::PitchEgRate4,
    CommonField::PitchEgLevel1,
    CommonField::PitchEgLevel2,
    CommonField::PitchEgLevel3,
    CommonField::PitchEgLevel4,
    CommonField::Algorithm,
    CommonField::Feedback,
    CommonField::OscKeySync,
    CommonField::LfoSpeed,
    CommonField::LfoDelay,
    CommonField::LfoPmDepth,
    CommonField::LfoAmDepth,
    CommonField::LfoKeySync,
    CommonField::LfoWave,
    CommonField::PitchModSense,
    CommonField::Transpose,
    CommonField::Name0,
    CommonField::Name1,
    CommonField::Name2,
    CommonField::Name3,
    CommonField::Name4,
    CommonField::Name5,
    CommonField::Name6,
    CommonField::Name7,
    CommonField::Name8,
    CommonField::Name9,
];

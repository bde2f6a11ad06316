//! Alignment classes.
//!
//! Alignment is a closed enumeration rather than a raw integer: the
//! heap dispatches on it exhaustively, and a byte alignment outside the
//! supported power-of-two table (4 through 2^27) is rejected before it
//! reaches any heap.

/// Native alignment in bytes for the host word size.
pub const NATIVE_ALIGNMENT: usize = std::mem::size_of::<usize>();

/// Supported alignment classes: native plus every power of two from
/// 2^2 up to 2^27.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlignClass {
    /// Machine-word alignment; the default for `malloc`-style calls.
    Native,
    Bits2,
    Bits3,
    Bits4,
    Bits5,
    Bits6,
    Bits7,
    Bits8,
    Bits9,
    Bits10,
    Bits11,
    Bits12,
    Bits13,
    Bits14,
    Bits15,
    Bits16,
    Bits17,
    Bits18,
    Bits19,
    Bits20,
    Bits21,
    Bits22,
    Bits23,
    Bits24,
    Bits25,
    Bits26,
    Bits27,
}

impl AlignClass {
    /// Every supported class, in increasing alignment order.
    pub const ALL: [AlignClass; 27] = [
        AlignClass::Native,
        AlignClass::Bits2,
        AlignClass::Bits3,
        AlignClass::Bits4,
        AlignClass::Bits5,
        AlignClass::Bits6,
        AlignClass::Bits7,
        AlignClass::Bits8,
        AlignClass::Bits9,
        AlignClass::Bits10,
        AlignClass::Bits11,
        AlignClass::Bits12,
        AlignClass::Bits13,
        AlignClass::Bits14,
        AlignClass::Bits15,
        AlignClass::Bits16,
        AlignClass::Bits17,
        AlignClass::Bits18,
        AlignClass::Bits19,
        AlignClass::Bits20,
        AlignClass::Bits21,
        AlignClass::Bits22,
        AlignClass::Bits23,
        AlignClass::Bits24,
        AlignClass::Bits25,
        AlignClass::Bits26,
        AlignClass::Bits27,
    ];

    /// Maps a raw byte alignment onto a class.
    ///
    /// Only the closed power-of-two table is accepted; anything else
    /// (including zero and non-powers of two) returns `None`.
    #[must_use]
    pub fn from_alignment(alignment: usize) -> Option<Self> {
        if !alignment.is_power_of_two() {
            return None;
        }
        match alignment.trailing_zeros() {
            2 => Some(Self::Bits2),
            3 => Some(Self::Bits3),
            4 => Some(Self::Bits4),
            5 => Some(Self::Bits5),
            6 => Some(Self::Bits6),
            7 => Some(Self::Bits7),
            8 => Some(Self::Bits8),
            9 => Some(Self::Bits9),
            10 => Some(Self::Bits10),
            11 => Some(Self::Bits11),
            12 => Some(Self::Bits12),
            13 => Some(Self::Bits13),
            14 => Some(Self::Bits14),
            15 => Some(Self::Bits15),
            16 => Some(Self::Bits16),
            17 => Some(Self::Bits17),
            18 => Some(Self::Bits18),
            19 => Some(Self::Bits19),
            20 => Some(Self::Bits20),
            21 => Some(Self::Bits21),
            22 => Some(Self::Bits22),
            23 => Some(Self::Bits23),
            24 => Some(Self::Bits24),
            25 => Some(Self::Bits25),
            26 => Some(Self::Bits26),
            27 => Some(Self::Bits27),
            _ => None,
        }
    }

    /// Alignment in bytes.
    #[must_use]
    pub const fn alignment(self) -> usize {
        match self {
            Self::Native => NATIVE_ALIGNMENT,
            Self::Bits2 => 1 << 2,
            Self::Bits3 => 1 << 3,
            Self::Bits4 => 1 << 4,
            Self::Bits5 => 1 << 5,
            Self::Bits6 => 1 << 6,
            Self::Bits7 => 1 << 7,
            Self::Bits8 => 1 << 8,
            Self::Bits9 => 1 << 9,
            Self::Bits10 => 1 << 10,
            Self::Bits11 => 1 << 11,
            Self::Bits12 => 1 << 12,
            Self::Bits13 => 1 << 13,
            Self::Bits14 => 1 << 14,
            Self::Bits15 => 1 << 15,
            Self::Bits16 => 1 << 16,
            Self::Bits17 => 1 << 17,
            Self::Bits18 => 1 << 18,
            Self::Bits19 => 1 << 19,
            Self::Bits20 => 1 << 20,
            Self::Bits21 => 1 << 21,
            Self::Bits22 => 1 << 22,
            Self::Bits23 => 1 << 23,
            Self::Bits24 => 1 << 24,
            Self::Bits25 => 1 << 25,
            Self::Bits26 => 1 << 26,
            Self::Bits27 => 1 << 27,
        }
    }
}

/// Rounds `value` up to the next multiple of `align` (a power of two).
pub(crate) const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

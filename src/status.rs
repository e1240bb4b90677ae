use bitflags::bitflags;

bitflags! {
    /// Non-fatal conditions raised while encoding or decoding an image.
    ///
    /// Flags only accumulate during a call; an empty set
    /// ([`EncodingStatus::SUCCESS`]) means the call completed without warnings.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EncodingStatus: u32 {
        /// The requested effort was outside `[0, 100]` and has been clamped
        const EFFORT_OUT_OF_RANGE             = 0b0000_0001;
        /// The requested block percentage was outside `(0, 100]` and has been clamped
        const BLOCK_PERCENT_OUT_OF_RANGE      = 0b0000_0010;
        /// The source has alpha below 255 but the format carries no alpha
        const SOME_NON_OPAQUE_PIXELS          = 0b0000_0100;
        /// Punch-through source pixels with alpha strictly between 0 and 255
        const SOME_TRANSLUCENT_PIXELS         = 0b0000_1000;
        /// Single channel formats ignore a non-zero green channel
        const SOME_GREEN_VALUES_ARE_NOT_ZERO  = 0b0001_0000;
        /// Single and dual channel formats ignore a non-zero blue channel
        const SOME_BLUE_VALUES_ARE_NOT_ZERO   = 0b0010_0000;
        /// A block could not be decoded and was replaced with opaque black
        const MALFORMED_BLOCK                 = 0b0100_0000;
    }
}

impl EncodingStatus {
    /// The success sentinel: no warning raised.
    pub const SUCCESS: Self = Self::empty();

    pub fn is_success(self) -> bool {
        self.is_empty()
    }
}

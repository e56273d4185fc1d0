use bitflags::bitflags;

bitflags! {
    /// NES joypad button mask in the core's own bit assignment.
    ///
    /// Input operations carry the raw mask value; unknown bits are passed
    /// through to the core untouched (the core owns validation).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct JoypadInput: u32 {
        const A = 0x01;
        const B = 0x02;
        const SELECT = 0x04;
        const START = 0x08;
        const UP = 0x10;
        const DOWN = 0x20;
        const LEFT = 0x40;
        const RIGHT = 0x80;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_bit_assignment() {
        assert_eq!(JoypadInput::A.bits(), 0x01);
        assert_eq!(JoypadInput::B.bits(), 0x02);
        assert_eq!(JoypadInput::SELECT.bits(), 0x04);
        assert_eq!(JoypadInput::START.bits(), 0x08);
        assert_eq!(JoypadInput::UP.bits(), 0x10);
        assert_eq!(JoypadInput::DOWN.bits(), 0x20);
        assert_eq!(JoypadInput::LEFT.bits(), 0x40);
        assert_eq!(JoypadInput::RIGHT.bits(), 0x80);
    }
}

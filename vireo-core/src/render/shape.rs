//! Shape flags: what a vnode is and what its children look like, as a bitmask.

bitflags::bitflags! {
    /// Node and children shape of a [`VNode`](super::VNode).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u16 {
        const ELEMENT            = 0b0000_0001;
        const STATEFUL_COMPONENT = 0b0000_0010;
        const TEXT_CHILDREN      = 0b0000_0100;
        const ARRAY_CHILDREN     = 0b0000_1000;
    }
}

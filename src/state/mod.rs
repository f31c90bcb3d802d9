pub mod panel;
pub mod selection;

pub use panel::Panel;
pub use selection::SelectionSet;

/// Which panel is currently active
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

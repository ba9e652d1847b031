//! Collage colour themes.

use crate::color::Color;

/// Background and foreground pair applied to the collage and its title.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub background: Color,
    pub text: Color,
}

pub const THEMES: [Theme; 5] = [
    Theme {
        name: "Chic Black",
        background: Color::rgb(0x1a, 0x1a, 0x1a),
        text: Color::rgb(0xff, 0xff, 0xff),
    },
    Theme {
        name: "Simple White",
        background: Color::rgb(0xf0, 0xf0, 0xf0),
        text: Color::rgb(0x1a, 0x1a, 0x1a),
    },
    Theme {
        name: "Lovely Pink",
        background: Color::rgb(0xfc, 0xe7, 0xf3),
        text: Color::rgb(0xdb, 0x27, 0x77),
    },
    Theme {
        name: "Dreamy Purple",
        background: Color::rgb(0xed, 0xe9, 0xfe),
        text: Color::rgb(0x7c, 0x3a, 0xed),
    },
    Theme {
        name: "Cool Blue",
        background: Color::rgb(0xe0, 0xf2, 0xfe),
        text: Color::rgb(0x02, 0x84, 0xc7),
    },
];

/// Theme at `index`, wrapping around the list.
pub fn theme(index: usize) -> Theme {
    THEMES[index % THEMES.len()]
}

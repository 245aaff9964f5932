use crate::Float;
use serde::Deserialize;

/// Interpolation kernel shared by deposition and gathering.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShapeOrder {
    /// Cloud-in-cell, two cells per axis.
    #[default]
    Linear,
    /// Triangular-shaped cloud, three cells per axis.
    Quadratic,
}

/// The cells touched by one particle along one axis. Cell `start + i`
/// gets weight `w[i]` for `i < len`.
#[derive(Clone, Copy, Debug)]
pub struct Stencil {
    pub start: isize,
    pub w: [Float; 3],
    pub len: usize,
}

impl Stencil {
    pub fn iter(&self) -> impl Iterator<Item = (isize, Float)> + '_ {
        self.w[..self.len]
            .iter()
            .enumerate()
            .map(move |(i, &w)| (self.start + i as isize, w))
    }
}

impl ShapeOrder {
    /// Stencil for a position given in cell units, where cell `i` is
    /// centred on `u = i`.
    #[inline(always)]
    pub fn stencil(self, u: Float) -> Stencil {
        match self {
            ShapeOrder::Linear => {
                let i = u.floor();
                let d = u - i;
                Stencil {
                    start: i as isize,
                    w: [1.0 - d, d, 0.0],
                    len: 2,
                }
            }
            ShapeOrder::Quadratic => {
                // The weighting scheme prtl is in middle
                // +-----+-----+-----+
                // | w0  | w1  | w2  |
                // +-----+-----+-----+
                let i = (u + 0.5).floor();
                let d = u - i;
                Stencil {
                    start: i as isize - 1,
                    w: [
                        0.5 * (0.5 - d) * (0.5 - d),
                        0.75 - d * d,
                        0.5 * (0.5 + d) * (0.5 + d),
                    ],
                    len: 3,
                }
            }
        }
    }
}

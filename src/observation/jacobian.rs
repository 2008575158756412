use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Local linear mapping from pixel `(row, col)` to sky-plane `(v, u)` coordinates
///
/// $u = \partial u/\partial \mathrm{row}\,(\mathrm{row} - \mathrm{row}_0) + \partial u/\partial
/// \mathrm{col}\,(\mathrm{col} - \mathrm{col}_0)$ and similarly for $v$. The reference pixel
/// `(row0, col0)` maps onto the sky origin and may be fractional.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Jacobian {
    pub row0: f64,
    pub col0: f64,
    pub dvdrow: f64,
    pub dvdcol: f64,
    pub dudrow: f64,
    pub dudcol: f64,
}

impl Jacobian {
    pub fn new(row0: f64, col0: f64, dvdrow: f64, dvdcol: f64, dudrow: f64, dudcol: f64) -> Self {
        Self {
            row0,
            col0,
            dvdrow,
            dvdcol,
            dudrow,
            dudcol,
        }
    }

    /// Square pixels of the given size with rows along $v$ and columns along $u$
    pub fn diagonal(scale: f64, row0: f64, col0: f64) -> Self {
        Self::new(row0, col0, scale, 0.0, 0.0, scale)
    }

    /// Determinant of the $\partial(u, v) / \partial(\mathrm{row}, \mathrm{col})$ matrix
    pub fn det(&self) -> f64 {
        self.dudrow * self.dvdcol - self.dvdrow * self.dudcol
    }

    /// Sky area of a pixel
    pub fn area(&self) -> f64 {
        self.det().abs()
    }

    /// Sky coordinates `(v, u)` of a pixel position
    pub fn vu(&self, row: f64, col: f64) -> (f64, f64) {
        let (drow, dcol) = (row - self.row0, col - self.col0);
        (
            self.dvdrow * drow + self.dvdcol * dcol,
            self.dudrow * drow + self.dudcol * dcol,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal() {
        let jacobian = Jacobian::diagonal(0.25, 10.0, 20.0);
        assert_eq!(jacobian.area(), 0.0625);
        assert_eq!(jacobian.vu(10.0, 20.0), (0.0, 0.0));
        assert_eq!(jacobian.vu(12.0, 16.0), (0.5, -1.0));
    }

    #[test]
    fn serialization() {
        let jacobian = Jacobian::new(1.5, 2.5, 0.26, 0.01, -0.02, 0.27);
        let json = serde_json::to_string(&jacobian).unwrap();
        let deserialized: Jacobian = serde_json::from_str(&json).unwrap();
        assert_eq!(jacobian, deserialized);
    }
}
